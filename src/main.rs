use clap::Parser;
use humansize::{DECIMAL, format_size};
use std::path::PathBuf;
use std::process;
use std::time::Instant;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};
use upcoming_trailers::{
    ArtifactStatus, Config, ProgressEvent, RunSummary, Settings, ShowOutcome, check_tools,
    default_config_path, run_pipeline,
};

/// Cache trailers for upcoming Sonarr shows and label them through Kometa
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Config file (defaults to config/config.yml, then the user config directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Select trailers without downloading anything
    #[arg(long)]
    dry_run: bool,

    /// Directory the Kometa documents are written to
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

/// Handles progress events and prints formatted output to stdout
fn handle_progress_event(event: ProgressEvent) {
    match event {
        ProgressEvent::Connecting { url } => {
            println!("Connecting to Sonarr at {}...", url);
        }
        ProgressEvent::Connected { base_url } => {
            println!("Connected ({})", base_url);
        }
        ProgressEvent::ResolvingShows => {
            println!("\n=== Resolving Upcoming Shows ===");
        }
        ProgressEvent::ShowsResolved {
            eligible,
            skipped_unmonitored,
        } => {
            if eligible == 0 {
                println!("No upcoming shows found.");
            } else {
                println!("Found {} upcoming show(s)", eligible);
            }
            if skipped_unmonitored > 0 {
                println!("Skipping {} unmonitored show(s)", skipped_unmonitored);
            }
        }
        ProgressEvent::AcquisitionStarted {
            index,
            total,
            title,
        } => {
            if index == 0 {
                println!("\n=== Acquiring Trailers ===");
            }
            println!("[{}/{}] {}", index + 1, total, title);
        }
        ProgressEvent::AcquisitionFinished { outcome, .. } => {
            println!("  {}", describe_outcome(&outcome));
        }
        ProgressEvent::WritingArtifacts { output_dir } => {
            println!("\n=== Writing Kometa Files to {} ===", output_dir.display());
        }
        ProgressEvent::ArtifactFinished(_) | ProgressEvent::Complete => {}
    }
}

fn describe_outcome(outcome: &ShowOutcome) -> String {
    match outcome {
        ShowOutcome::Acquired(asset) => format!(
            "acquired ({}) {}",
            format_size(asset.size_bytes, DECIMAL),
            asset.path.display()
        ),
        ShowOutcome::AlreadyPresent(asset) => {
            format!("already present {}", asset.path.display())
        }
        ShowOutcome::Selected(candidate) => {
            let duration = candidate
                .duration
                .map(|d| format!("{}:{:02}", d.as_secs() / 60, d.as_secs() % 60))
                .unwrap_or_else(|| "?".to_string());
            format!(
                "selected \"{}\" from {} ({}), not downloaded",
                candidate.title, candidate.channel, duration
            )
        }
        ShowOutcome::SkippedUnmonitored => "skipped (unmonitored)".to_string(),
        ShowOutcome::Failed(reason) => format!("failed: {}", reason),
    }
}

fn print_summary(summary: &RunSummary) {
    println!("\n=== Summary ===\n");

    if summary.shows.is_empty() {
        println!("No upcoming shows.");
    }

    for report in &summary.shows {
        println!(
            "{} ({}): {}",
            report.title,
            report.premiere_date,
            describe_outcome(&report.outcome)
        );
    }

    println!();
    for artifact in &summary.artifacts {
        let status = match &artifact.result {
            Ok(ArtifactStatus::Written) => "written".to_string(),
            Ok(ArtifactStatus::Unchanged) => "unchanged".to_string(),
            Err(reason) => format!("failed: {}", reason),
        };
        println!("{}: {}", artifact.path.display(), status);
    }

    let downloaded = summary.downloaded_bytes();
    if downloaded > 0 {
        println!("\nDownloaded {}", format_size(downloaded, DECIMAL));
    }
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("upcoming_trailers={}", default_level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(env_filter)
        .init();
}

fn load_settings(cli: &Cli) -> Result<Settings, upcoming_trailers::ConfigError> {
    let path = cli.config.clone().unwrap_or_else(default_config_path);
    let mut config = Config::load(&path)?;
    config.apply_env(|key| std::env::var(key).ok());

    let mut settings = config.validate()?;
    if cli.dry_run {
        settings.download_trailers = false;
    }
    if let Some(output_dir) = &cli.output_dir {
        settings.output_dir = output_dir.clone();
    }
    settings.debug |= cli.debug;

    Ok(settings)
}

fn main() {
    let cli = Cli::parse();
    let started = Instant::now();

    let settings = match load_settings(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    init_logging(settings.debug);

    if let Err(e) = check_tools(&settings) {
        eprintln!("Error: {}", e);
        process::exit(2);
    }

    if !settings.download_trailers {
        println!("Dry run: trailers are selected but not downloaded.\n");
    }

    match run_pipeline(&settings, handle_progress_event) {
        Ok(summary) => {
            print_summary(&summary);
            println!("\nFinished in {:.1}s", started.elapsed().as_secs_f64());
        }
        Err(e) => {
            eprintln!("\nError: {}", e);
            process::exit(1);
        }
    }
}
