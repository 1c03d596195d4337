use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

use crate::types::NormalizedBox;

/// Prepare YOLO training labels for folders of product photographs.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Label every image with one fixed box, picking the class from the filename
    Preset(PresetArgs),
    /// Label images from the detections of a YOLO ONNX model
    Assist(AssistArgs),
    /// Render the preset box on a random input image
    Preview(PreviewArgs),
    /// Draw existing label files onto a random sample of images
    Draw(DrawArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PresetArgs {
    /// Folder containing the input images
    #[arg(short = 'i', long = "input")]
    pub input_dir: PathBuf,

    /// Folder receiving `labels/` and `image_label/`
    #[arg(short = 'o', long = "output")]
    pub output_dir: PathBuf,

    /// Box size preset
    #[arg(long = "size", value_enum, default_value = "six-inch")]
    pub size: BoxPreset,

    /// Custom box `x_center,y_center,width,height`, overrides --size
    #[arg(long = "bbox", value_parser = parse_bbox)]
    pub bbox: Option<NormalizedBox>,

    /// Skip the drawing phase that writes `image_label/`
    #[arg(long = "no_draw")]
    pub no_draw: bool,

    /// Ordered class list; the first name found in a filename wins
    #[arg(long = "classes", use_value_delimiter = true)]
    pub classes: Vec<String>,
}

impl PresetArgs {
    /// The box every matched image is labeled with.
    pub fn bbox(&self) -> NormalizedBox {
        self.bbox.unwrap_or_else(|| self.size.bbox())
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct AssistArgs {
    /// YOLO detection model exported to ONNX
    #[arg(short = 'm', long = "model")]
    pub model: PathBuf,

    /// Folder containing the input images
    #[arg(short = 'i', long = "input")]
    pub input_dir: PathBuf,

    /// Folder receiving `output/`, `report/` and `preview/`
    #[arg(short = 'o', long = "output")]
    pub output_dir: PathBuf,

    /// Minimum detection confidence
    #[arg(long = "conf", default_value_t = 0.5, value_parser = validate_unit)]
    pub confidence: f32,

    /// IoU threshold for non-maximum suppression
    #[arg(long = "iou", default_value_t = 0.7, value_parser = validate_unit)]
    pub iou: f32,

    /// Square model input size in pixels
    #[arg(long = "imgsz", default_value_t = 640)]
    pub input_size: u32,

    /// Write the no-detection report and empty labels (`true`/`false`)
    #[arg(long = "no_detection_report", default_value_t = true, action = clap::ArgAction::Set)]
    pub no_detection_report: bool,

    /// Report images with two or more detections (`true`/`false`)
    #[arg(long = "multi_detection_report", default_value_t = true, action = clap::ArgAction::Set)]
    pub multi_detection_report: bool,

    /// Label every qualifying detection instead of rejecting multi-detection images
    #[arg(long = "allow_multiple")]
    pub allow_multiple: bool,

    /// Fraction of labeled images copied to `preview/`
    #[arg(long = "preview_rate", default_value_t = 0.2, value_parser = validate_unit)]
    pub preview_rate: f32,

    /// Seed for preview sampling
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// TrueType font for box captions; system fonts are tried when absent
    #[arg(long = "font")]
    pub font: Option<PathBuf>,

    /// Ordered class list; filenames are expected to start with `<class>_`
    #[arg(long = "classes", use_value_delimiter = true)]
    pub classes: Vec<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PreviewArgs {
    /// Folder containing the input images
    #[arg(short = 'i', long = "input")]
    pub input_dir: PathBuf,

    /// Where to save the preview image
    #[arg(short = 'o', long = "output", default_value = "preview.png")]
    pub output: PathBuf,

    /// Box size preset
    #[arg(long = "size", value_enum, default_value = "six-inch")]
    pub size: BoxPreset,

    /// Custom box `x_center,y_center,width,height`, overrides --size
    #[arg(long = "bbox", value_parser = parse_bbox)]
    pub bbox: Option<NormalizedBox>,

    /// Seed for choosing the image
    #[arg(long = "seed")]
    pub seed: Option<u64>,
}

impl PreviewArgs {
    pub fn bbox(&self) -> NormalizedBox {
        self.bbox.unwrap_or_else(|| self.size.bbox())
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct DrawArgs {
    /// Folder containing the images
    #[arg(short = 'i', long = "input")]
    pub input_dir: PathBuf,

    /// Folder containing the YOLO label files
    #[arg(short = 'l', long = "labels")]
    pub labels_dir: PathBuf,

    /// Folder receiving the annotated samples
    #[arg(short = 'o', long = "output")]
    pub output_dir: PathBuf,

    /// Fraction of images to sample; at least one image is drawn
    #[arg(long = "fraction", default_value_t = 0.1, value_parser = validate_unit)]
    pub fraction: f32,

    /// Seed for random sampling
    #[arg(long = "seed")]
    pub seed: Option<u64>,
}

/// Fixed boxes measured for the two wafer carrier sizes
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
pub enum BoxPreset {
    /// 6 inch carrier
    #[value(alias = "6")]
    SixInch,
    /// 8 inch carrier
    #[value(alias = "8")]
    EightInch,
}

impl BoxPreset {
    pub fn bbox(self) -> NormalizedBox {
        match self {
            BoxPreset::SixInch => NormalizedBox::new(
                0.49954802858976477,
                0.5574033282796372,
                0.43050458369337075,
                0.6787368486225077,
            ),
            BoxPreset::EightInch => NormalizedBox::new(
                0.4936826531694092,
                0.5458452479416916,
                0.5703962017917926,
                0.8867322545523849,
            ),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BoxPreset::SixInch => "6 inch",
            BoxPreset::EightInch => "8 inch",
        }
    }
}

// Validate that a ratio is between 0.0 and 1.0
fn validate_unit(s: &str) -> Result<f32, String> {
    match f32::from_str(s) {
        Ok(val) if (0.0..=1.0).contains(&val) => Ok(val),
        _ => Err("value must be between 0.0 and 1.0".to_string()),
    }
}

// Parse `x,y,w,h` with every component in 0..=1
fn parse_bbox(s: &str) -> Result<NormalizedBox, String> {
    let values = s
        .split(',')
        .map(|part| f64::from_str(part.trim()).map_err(|e| format!("{}: {}", part, e)))
        .collect::<Result<Vec<_>, _>>()?;
    if values.len() != 4 {
        return Err("expected four comma separated values: x,y,w,h".to_string());
    }
    if values.iter().any(|v| !(0.0..=1.0).contains(v)) {
        return Err("box values must be normalized to 0.0..=1.0".to_string());
    }
    Ok(NormalizedBox::new(values[0], values[1], values[2], values[3]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_unit_bounds() {
        assert!(validate_unit("0.5").is_ok());
        assert!(validate_unit("1.0").is_ok());
        assert!(validate_unit("0.0").is_ok());
        assert!(validate_unit("-0.1").is_err());
        assert!(validate_unit("1.1").is_err());
        assert!(validate_unit("abc").is_err());
    }

    #[test]
    fn parse_bbox_accepts_four_normalized_values() {
        let bbox = parse_bbox("0.5, 0.5,0.25,0.75").unwrap();
        assert_eq!(bbox, NormalizedBox::new(0.5, 0.5, 0.25, 0.75));
        assert!(parse_bbox("0.5,0.5,0.25").is_err());
        assert!(parse_bbox("0.5,0.5,0.25,1.5").is_err());
    }

    #[test]
    fn custom_bbox_overrides_preset() {
        let args = Args::parse_from([
            "autolabel",
            "preset",
            "-i",
            "in",
            "-o",
            "out",
            "--size",
            "8",
            "--bbox",
            "0.1,0.2,0.3,0.4",
        ]);
        let Command::Preset(preset) = args.command else {
            panic!("expected preset command");
        };
        assert_eq!(preset.size, BoxPreset::EightInch);
        assert_eq!(preset.bbox(), NormalizedBox::new(0.1, 0.2, 0.3, 0.4));
    }

    #[test]
    fn assist_defaults() {
        let args = Args::parse_from([
            "autolabel",
            "assist",
            "-m",
            "best.onnx",
            "-i",
            "in",
            "-o",
            "out",
            "--classes",
            "canister,foam",
        ]);
        let Command::Assist(assist) = args.command else {
            panic!("expected assist command");
        };
        assert_eq!(assist.confidence, 0.5);
        assert_eq!(assist.iou, 0.7);
        assert_eq!(assist.input_size, 640);
        assert!(assist.no_detection_report);
        assert!(assist.multi_detection_report);
        assert!(!assist.allow_multiple);
        assert_eq!(assist.classes, vec!["canister", "foam"]);
    }

    #[test]
    fn report_toggles_can_be_disabled() {
        let args = Args::parse_from([
            "autolabel",
            "assist",
            "-m",
            "best.onnx",
            "-i",
            "in",
            "-o",
            "out",
            "--no_detection_report",
            "false",
        ]);
        let Command::Assist(assist) = args.command else {
            panic!("expected assist command");
        };
        assert!(!assist.no_detection_report);
    }
}
