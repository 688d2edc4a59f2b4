use clap::{Parser, Subcommand};
use gallery_sync::config::{self, SyncConfig};
use gallery_sync::metadata::EmbeddedMetadataReader;
use gallery_sync::orchestrator::{Orchestrator, PublishStatus};
use gallery_sync::output;
use gallery_sync::publish::{GitPublisher, NoopPublisher, Publisher};
use gallery_sync::scan::{self, RenameScope};
use gallery_sync::sync::SyncSettings;
use gallery_sync::watch::DirectoryWatcher;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "gallery-sync")]
#[command(about = "Keep portfolio gallery catalogs in sync with their image folders")]
#[command(long_about = "\
Keep portfolio gallery catalogs in sync with their image folders

Drop images into a gallery folder and gallery-sync renames them to web-safe
names, reads their IPTC/EXIF captions, rewrites the gallery's JSON catalog and
commits + pushes the project so the website redeploys.

Project structure (defaults):

  ./
  ├── gallery-sync.toml            # Optional config (see gen-config)
  ├── assets/images/
  │   ├── encaustic/               # One folder per gallery
  │   │   └── harbor-at-dusk.jpg
  │   └── oil-paintings/
  └── json-files/
      ├── encaustic-slideshow.json # One catalog per gallery
      └── oil-paintings.json

Catalog fields (first available wins):
  title:       IPTC Headline → IPTC Object Name → filename
  medium:      IPTC Credit
  dimensions:  IPTC Source
  description: IPTC Special Instructions → IPTC Caption → EXIF ImageDescription

Run 'gallery-sync gen-config' to generate a documented gallery-sync.toml.")]
#[command(version)]
struct Cli {
    /// Project root (the git repository containing images and catalogs)
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Config file (default: <root>/gallery-sync.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log intended changes without renaming, writing or publishing
    #[arg(long, global = true)]
    dry_run: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Sync once, then watch the galleries and sync on every change (default)
    Watch,
    /// Run one sync pass, print a report and exit
    Sync,
    /// Only normalize file names in every gallery folder
    Rename,
    /// Print a stock gallery-sync.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Watch);

    if let Command::GenConfig = command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    init_tracing(cli.verbose);

    let config = config::load_config(&cli.root, cli.config.as_deref())?;
    let settings = SyncSettings {
        galleries: config.resolve_galleries(&cli.root),
        web_root: config.web_root.clone(),
        dry_run: cli.dry_run,
    };

    match command {
        Command::Watch => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(watch(&cli.root, &config, settings))
        }
        Command::Sync => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(sync_once(&cli.root, &config, settings))
        }
        Command::Rename => {
            rename_all(&cli.root, &settings);
            Ok(())
        }
        Command::GenConfig => Ok(()),
    }
}

/// Respect RUST_LOG if set, otherwise info (or debug with --verbose).
fn init_tracing(verbose: bool) {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if verbose {
            "gallery_sync=debug".to_string()
        } else {
            "gallery_sync=info".to_string()
        }
    });

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

fn orchestrator(root: &Path, config: &SyncConfig, settings: SyncSettings) -> Orchestrator {
    let dry_run = settings.dry_run;
    Orchestrator::new(
        settings,
        Arc::new(EmbeddedMetadataReader),
        publisher(root, config, dry_run),
    )
    .with_retry_stranded(config.publish.retry_stranded)
}

fn publisher(root: &Path, config: &SyncConfig, dry_run: bool) -> Arc<dyn Publisher> {
    let publish = &config.publish;
    if dry_run || !publish.enabled {
        return Arc::new(NoopPublisher {
            message_prefix: publish.message_prefix.clone(),
        });
    }
    Arc::new(GitPublisher {
        remote: publish.remote.clone(),
        branch: publish.branch.clone(),
        timeout: publish.timeout(),
        ..GitPublisher::new(root.to_path_buf(), publish.message_prefix.clone())
    })
}

async fn watch(
    root: &Path,
    config: &SyncConfig,
    settings: SyncSettings,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut orchestrator = orchestrator(root, config, settings);

    info!("initial sync");
    orchestrator.initial_pass().await?;

    let images = config.images_path(root);
    let (watcher, signals) = DirectoryWatcher::spawn(&[images], config.watch.quiescence())?;
    let run = tokio::spawn(orchestrator.run(signals));
    info!("watching for changes, press Ctrl-C to stop");

    tokio::signal::ctrl_c().await?;
    info!("stopping, letting any running sync finish");
    drop(watcher);
    let stats = run.await?;
    info!(
        passes = stats.passes,
        published = stats.published,
        publish_failures = stats.publish_failures,
        "stopped"
    );
    Ok(())
}

async fn sync_once(
    root: &Path,
    config: &SyncConfig,
    settings: SyncSettings,
) -> Result<(), Box<dyn std::error::Error>> {
    let dry_run = settings.dry_run;
    let mut orchestrator = orchestrator(root, config, settings);
    let outcome = orchestrator.initial_pass().await?;

    output::print_pass_report(&outcome.report, root, dry_run);
    match outcome.publish {
        PublishStatus::NotNeeded => {}
        PublishStatus::DryRun { summary } => println!("Would publish: {summary}"),
        PublishStatus::Published(ack) if ack.committed => println!("Published: {}", ack.message),
        PublishStatus::Published(_) => println!("Published (nothing new to commit)"),
        PublishStatus::Failed(e) => println!("Publish failed: {e}"),
    }
    Ok(())
}

fn rename_all(root: &Path, settings: &SyncSettings) {
    let results: Vec<_> = settings
        .galleries
        .iter()
        .map(|g| {
            let records =
                scan::normalize_directory(&g.directory, RenameScope::AllFiles, settings.dry_run)
                    .map_err(|e| e.to_string());
            (g.directory.as_path(), records)
        })
        .collect();
    output::print_rename_report(&results, root, settings.dry_run);
}
