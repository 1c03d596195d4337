use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

use autolabel::config::{AssistArgs, DrawArgs, PresetArgs, PreviewArgs};
use autolabel::conversion::SizeFilter;
use autolabel::draw::load_font;
use autolabel::progress::{cancel_on_ctrl_c, run_with_progress, RunState};
use autolabel::{
    draw_label_samples, plan_assist_run, plan_preset_run, run_assisted_labeling,
    run_preset_labeling, run_preview, Args, AssistJob, ClassList, Command, DetectorConfig,
    OnnxDetector, PresetJob, Result,
};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let result = match args.command {
        Command::Preset(args) => preset(args),
        Command::Assist(args) => assist(args),
        Command::Preview(args) => preview(args),
        Command::Draw(args) => draw(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn preset(args: PresetArgs) -> Result<()> {
    let job = PresetJob {
        input_dir: args.input_dir.clone(),
        output_dir: args.output_dir.clone(),
        bbox: args.bbox(),
        classes: ClassList::from_args(&args.classes),
        draw: !args.no_draw,
    };
    info!(
        "Labeling {} with the {} box",
        job.input_dir.display(),
        if args.bbox.is_some() {
            "custom"
        } else {
            args.size.label()
        }
    );

    let plan = plan_preset_run(&job)?;
    info!("Found {} images", plan.images.len());

    let state = RunState::new();
    cancel_on_ctrl_c(&state);
    let stats = run_with_progress(&state, "Preset", |s| run_preset_labeling(&job, &plan, s));
    stats.print_summary();
    Ok(())
}

fn assist(args: AssistArgs) -> Result<()> {
    let config = DetectorConfig {
        input_size: args.input_size,
        confidence: args.confidence,
        iou: args.iou,
    };
    let mut detector = OnnxDetector::load(&args.model, config)?;

    let job = AssistJob {
        input_dir: args.input_dir,
        output_dir: args.output_dir,
        classes: ClassList::from_args(&args.classes),
        size_filter: SizeFilter::default(),
        no_detection_report: args.no_detection_report,
        multi_detection_report: args.multi_detection_report,
        allow_multiple: args.allow_multiple,
        preview_rate: args.preview_rate,
        seed: args.seed,
        font: load_font(args.font.as_deref())?,
    };
    let plan = plan_assist_run(&job)?;
    info!("Found {} images", plan.images.len());

    let state = RunState::new();
    cancel_on_ctrl_c(&state);
    let stats = run_with_progress(&state, "Assist", |s| {
        run_assisted_labeling(&job, &plan, &mut detector, s)
    })?;
    stats.print_summary();
    Ok(())
}

fn preview(args: PreviewArgs) -> Result<()> {
    run_preview(&args.input_dir, &args.bbox(), args.seed, &args.output)?;
    Ok(())
}

fn draw(args: DrawArgs) -> Result<()> {
    draw_label_samples(
        &args.input_dir,
        &args.labels_dir,
        &args.output_dir,
        args.fraction,
        args.seed,
    )?;
    Ok(())
}
