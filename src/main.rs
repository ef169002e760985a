use std::path::{Path, PathBuf};

use anyhow::anyhow;
use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use tracing::{error, info, warn};

mod config;
mod llm;
mod studio;
mod utils;

use config::{Config, CONFIG};
use llm::GeminiClient;
use studio::export::{default_archiver, export_all, save_shot, write_bundle, BUNDLE_FILE_NAME};
use studio::workflow::Workflow;
use studio::{AspectRatio, Studio, StudioError, StylePreset, UploadedImage};
use utils::logging::init_logging;

#[derive(Parser)]
#[command(
    name = "product-shots",
    version,
    about = "Turn a product photo into AI photoshoot ideas and generated shots"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask the model for shot ideas and print them.
    Analyze {
        /// Product photo (PNG, JPG or WEBP).
        #[arg(long)]
        image: PathBuf,
    },
    /// Analyze, then generate one image per idea and save the results.
    Shoot(ShootArgs),
}

#[derive(Args)]
struct ShootArgs {
    /// Product photo (PNG, JPG or WEBP).
    #[arg(long)]
    image: PathBuf,
    #[arg(long, value_enum, default_value_t = AspectRatio::Square)]
    aspect_ratio: AspectRatio,
    #[arg(long, value_enum, default_value_t = StylePreset::Default)]
    style: StylePreset,
    /// Directory for individual shots; defaults to SHOTS_OUTPUT_DIR.
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// Zip bundle path; defaults to <out-dir>/product-shots.zip.
    #[arg(long, conflicts_with = "no_bundle")]
    bundle: Option<PathBuf>,
    /// Skip writing the zip bundle.
    #[arg(long)]
    no_bundle: bool,
}

fn user_facing(err: StudioError) -> anyhow::Error {
    error!("{err:#}");
    anyhow!(err.user_message())
}

/// Prefers the message the workflow recorded for the failed step.
fn workflow_failure(snapshot: &Workflow, err: StudioError) -> anyhow::Error {
    error!("{err:#}");
    match snapshot.error() {
        Some(message) => anyhow!(message.to_string()),
        None => anyhow!(err.user_message()),
    }
}

fn load_image(path: &Path) -> anyhow::Result<UploadedImage> {
    UploadedImage::from_path(path).map_err(user_facing)
}

fn print_ideas(ideas: &[String]) {
    for (index, idea) in ideas.iter().enumerate() {
        println!("{:>2}. {}", index + 1, idea);
    }
}

async fn run_analyze(image: PathBuf) -> anyhow::Result<()> {
    let studio = Studio::new(GeminiClient::from_config(&CONFIG));
    studio.upload(load_image(&image)?);
    let ideas = studio
        .analyze()
        .await
        .map_err(|err| workflow_failure(&studio.snapshot(), err))?;
    print_ideas(&ideas);
    Ok(())
}

async fn run_shoot(args: ShootArgs) -> anyhow::Result<()> {
    let studio = Studio::new(GeminiClient::from_config(&CONFIG));
    studio.upload(load_image(&args.image)?);
    studio
        .set_aspect_ratio(args.aspect_ratio)
        .map_err(user_facing)?;
    studio.set_style(args.style).map_err(user_facing)?;

    let ideas = studio
        .analyze()
        .await
        .map_err(|err| workflow_failure(&studio.snapshot(), err))?;
    print_ideas(&ideas);
    if ideas.is_empty() {
        warn!("The model returned no shot ideas; nothing to generate");
        return Ok(());
    }

    info!("Generate {} Shots", ideas.len());
    let shots = studio
        .generate()
        .await
        .map_err(|err| workflow_failure(&studio.snapshot(), err))?;
    let snapshot = studio.snapshot();
    let settings = snapshot.settings();
    info!(
        "Workflow {} with {} of {} shots ({}, {} style)",
        snapshot.state(),
        shots.len(),
        snapshot.ideas().len(),
        settings.aspect_ratio,
        settings.style
    );
    if shots.is_empty() {
        warn!("No images were returned for any idea");
        return Ok(());
    }

    let out_dir = args.out_dir.unwrap_or_else(|| CONFIG.output_dir.clone());
    for (position, shot) in shots.iter().enumerate() {
        match save_shot(&out_dir, shot, &ideas, position).await {
            Ok(path) => println!("{}", path.display()),
            Err(err) => warn!("Could not save shot {}: {err}", position + 1),
        }
    }

    if args.no_bundle {
        return Ok(());
    }
    let bundle_path = args
        .bundle
        .unwrap_or_else(|| out_dir.join(BUNDLE_FILE_NAME));
    match export_all(&shots, &ideas, default_archiver().as_ref()) {
        Ok(bundle) => {
            write_bundle(&bundle_path, &bundle)
                .await
                .map_err(user_facing)?;
            println!("{}", bundle_path.display());
        }
        Err(StudioError::ExportUnavailable(reason)) => {
            warn!("Skipping zip bundle: {reason}");
        }
        Err(err) => return Err(user_facing(err)),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let config = Config::init().map_err(|err| anyhow!("Configuration error: {err}"))?;
    let _guards = init_logging();
    for notice in &config.notices {
        warn!("{notice}");
    }
    info!(
        "Product shot studio starting (analysis model: {}, image model: {})",
        config.gemini_analysis_model, config.gemini_image_model
    );

    match cli.command {
        Command::Analyze { image } => run_analyze(image).await,
        Command::Shoot(args) => run_shoot(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn shoot_parses_typed_settings() {
        let cli = Cli::try_parse_from([
            "product-shots",
            "shoot",
            "--image",
            "bottle.png",
            "--aspect-ratio",
            "portrait",
            "--style",
            "vibrant",
        ])
        .unwrap();
        let Command::Shoot(args) = cli.command else {
            panic!("expected shoot");
        };
        assert_eq!(args.aspect_ratio, AspectRatio::Portrait);
        assert_eq!(args.style, StylePreset::Vibrant);
        assert!(!args.no_bundle);
    }

    #[test]
    fn failures_report_the_workflow_message() {
        use studio::error::MISSING_IMAGE_MESSAGE;
        use studio::workflow::WorkflowEvent;

        let mut workflow = Workflow::new();
        let err = workflow.apply(WorkflowEvent::AnalyzeRequested).unwrap_err();
        let reported = workflow_failure(&workflow, err);
        assert_eq!(reported.to_string(), MISSING_IMAGE_MESSAGE);

        let fresh = Workflow::new();
        let reported = workflow_failure(&fresh, StudioError::Superseded { epoch: 3 });
        assert_eq!(
            reported.to_string(),
            StudioError::Superseded { epoch: 3 }.user_message()
        );
    }

    #[test]
    fn unknown_style_is_rejected() {
        assert!(Cli::try_parse_from([
            "product-shots",
            "shoot",
            "--image",
            "bottle.png",
            "--style",
            "sepia",
        ])
        .is_err());
    }
}
