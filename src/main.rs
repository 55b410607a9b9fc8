use anyhow::{Context, bail};
use clap::Parser;
use plexmove::{
    Classification, Cli, Commands, EngineConfig, MoveEngine, MoveOutcome, MovePlan, MoveRequest,
    Overrides, ProgressEvent, ProgressSink, classifier, cleanup,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Progress updates buffered between the copy and the terminal
const PROGRESS_BUFFER: usize = 32;

struct MoveArgs {
    source: PathBuf,
    config: PathBuf,
    overrides: Overrides,
    cleanup: bool,
    sudo: bool,
    dry_run: bool,
    json: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.log_json) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }

    let result = match cli.command {
        Commands::Detect { name, json } => run_detect(&name, json),
        Commands::Move {
            source,
            config,
            overrides,
            cleanup,
            sudo,
            dry_run,
            json,
        } => {
            run_move(MoveArgs {
                source,
                config,
                overrides,
                cleanup,
                sudo,
                dry_run,
                json,
            })
            .await
        }
        Commands::Purge { path, yes } => run_purge(&path, yes),
    };

    if let Err(e) = result {
        tracing::error!("Error: {e:#}");
        process::exit(1);
    }
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(io::stderr))
            .try_init()
    }
    .context("failed to install tracing subscriber")
}

fn run_detect(name: &Path, json: bool) -> anyhow::Result<()> {
    let classification = classifier::classify_path(name);

    if json {
        println!("{}", serde_json::to_string_pretty(&classification)?);
        return Ok(());
    }

    print_classification(&classification);
    if !classification.is_detected() {
        println!("\nCould not tell movie from TV; use `plexmove move --kind movie|tv`");
    }
    Ok(())
}

async fn run_move(args: MoveArgs) -> anyhow::Result<()> {
    tracing::info!("Loading configuration from: {}", args.config.display());
    let config = EngineConfig::from_file(&args.config)
        .with_context(|| format!("cannot load {}", args.config.display()))?;

    let classification = args
        .overrides
        .apply(classifier::classify_path(&args.source));
    if !classification.is_detected() {
        bail!(
            "cannot tell whether {} is a movie or a TV show (title \"{}\"); pass --kind movie|tv",
            args.source.display(),
            classification.title
        );
    }
    print_classification(&classification);

    let request = MoveRequest::new(&args.source, classification)
        .with_cleanup(args.cleanup)
        .with_elevation(args.sudo || config.copy.use_sudo);
    let engine = MoveEngine::from_config(&config);

    if args.dry_run {
        let plan = engine.preview(&request)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&plan)?);
        } else {
            print_plan(&plan);
            println!("\n[DRY-RUN MODE] No files were copied");
        }
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("Received interrupt signal, stopping the copy...");
        handler_token.cancel();
    })
    .context("failed to set Ctrl-C handler")?;

    let (tx, rx) = mpsc::channel(PROGRESS_BUFFER);
    let printer = tokio::spawn(print_progress(rx));

    let result = engine
        .execute(request, ProgressSink::new(tx), cancel)
        .await;

    if let Err(e) = printer.await {
        tracing::debug!("Progress printer stopped: {}", e);
    }
    eprintln!();

    let outcome = result.inspect_err(|e| {
        if e.is_retryable() {
            eprintln!("Source files were left in place; the move can be retried.");
        }
    })?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

fn run_purge(path: &Path, yes: bool) -> anyhow::Result<()> {
    if !yes && !confirm(&format!("Delete {} and everything in it?", path.display()))? {
        println!("Aborted");
        return Ok(());
    }

    cleanup::purge_source(path)?;
    println!("Deleted {}", path.display());
    Ok(())
}

fn confirm(question: &str) -> anyhow::Result<bool> {
    print!("{question} [y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

async fn print_progress(mut rx: mpsc::Receiver<ProgressEvent>) {
    let mut stderr = io::stderr();
    while let Some(event) = rx.recv().await {
        let position = if event.file_count > 0 {
            format!("[{}/{}] ", event.file_index, event.file_count)
        } else {
            String::new()
        };
        // a broken terminal must not stop the copy
        let _ = write!(
            stderr,
            "\r{position}{:>5.1}%  {}  {}  ETA {}    ",
            event.overall_fraction * 100.0,
            event.current_file,
            event.rate,
            event.eta
        );
        let _ = stderr.flush();
    }
}

fn print_classification(classification: &Classification) {
    println!("Kind:       {}", classification.kind);
    println!("Title:      {}", classification.title);
    if let Some(year) = classification.year {
        println!("Year:       {year}");
    }
    if classification.season > 0 {
        println!("Season:     {}", classification.season);
    }
    if classification.episode > 0 {
        println!("Episode:    {}", classification.episode);
    }
    println!("Confidence: {:.2}", classification.confidence);
}

fn print_plan(plan: &MovePlan) {
    println!(
        "\n=== Move Plan ({}, {} file(s), {:.2} GB) ===",
        plan.kind,
        plan.files.len(),
        plan.total_bytes() as f64 / 1_000_000_000.0
    );
    for (source, destination) in plan.pairs() {
        println!("  {} -> {}", source.display(), destination.display());
    }
    for warning in &plan.warnings {
        println!("  warning: {warning}");
    }
}

fn print_outcome(outcome: &MoveOutcome) {
    println!("\nMove complete:");
    println!("  Kind: {}", outcome.media_kind);
    println!("  Files moved: {}", outcome.files_moved);
    println!(
        "  Bytes moved: {} ({:.2} GB)",
        outcome.total_bytes,
        outcome.total_bytes as f64 / 1_000_000_000.0
    );
    println!("  Destination: {}", outcome.destination_root.display());

    for path in outcome
        .moved_video_paths
        .iter()
        .chain(&outcome.moved_subtitle_paths)
    {
        println!("    {}", path.display());
    }

    if !outcome.warnings.is_empty() {
        println!("\nWarnings ({}):", outcome.warnings.len());
        for warning in &outcome.warnings {
            println!("  {warning}");
        }
    }

    if !outcome.remaining_source_entries.is_empty() {
        println!("\nLeft in {}:", outcome.source_dir.display());
        for entry in &outcome.remaining_source_entries {
            println!("  {}", entry.display());
        }
        println!(
            "Run `plexmove purge \"{}\"` to delete them.",
            outcome.source_dir.display()
        );
    }
}
