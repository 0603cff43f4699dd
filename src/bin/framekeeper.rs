use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use framekeeper::job::DEFAULT_RENDERER;
use framekeeper::supervise::DEFAULT_MAX_RETRIES;
use framekeeper::{BlenderProcess, OutputNaming, RenderJob, Supervisor, SupervisorOpts};

/// Render a Blender animation; if Blender crashes, restart where it left off.
#[derive(Parser, Debug)]
#[command(name = "framekeeper", version)]
struct Cli {
    /// Blender project file (.blend).
    project_file: PathBuf,

    /// Failed attempts allowed before giving up.
    #[arg(long = "max-retry", default_value_t = DEFAULT_MAX_RETRIES)]
    max_retry: u32,

    /// Continue rendering into this existing output directory.
    #[arg(long, value_name = "OUTPUT_DIR")]
    resume: Option<PathBuf>,

    /// Directory under which new output directories are created.
    #[arg(long, default_value = "renders")]
    render_root: PathBuf,

    /// Blender executable.
    #[arg(long, env = "BLENDER", default_value = DEFAULT_RENDERER)]
    blender: PathBuf,

    /// Minimum seconds between progress heartbeats.
    #[arg(long, default_value_t = 30)]
    heartbeat_secs: u64,

    /// Exit code treated as a clean Blender exit (repeatable).
    #[arg(long = "accept-exit-code", value_name = "CODE", default_values_t = [0])]
    accept_exit_codes: Vec<i32>,

    /// Print the final summary as JSON on stdout.
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let project_file = absolute(&cli.project_file)?;
    let range = framekeeper::discover_frame_range(&cli.blender, &project_file)?;

    let output_dir = match &cli.resume {
        Some(dir) => {
            if !dir.is_dir() {
                tracing::warn!(dir = %dir.display(), "resume directory does not exist yet");
            }
            absolute(dir)?
        }
        None => {
            let dir = OutputNaming::new(absolute(&cli.render_root)?).dir_for(&project_file);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("create output dir '{}'", dir.display()))?;
            dir
        }
    };
    tracing::info!(dir = %output_dir.display(), "rendering frames {}-{}", range.start, range.end);

    let job = RenderJob::new(project_file, output_dir, range).with_renderer(&cli.blender);
    let opts = SupervisorOpts {
        max_retries: cli.max_retry,
        accepted_exit_codes: cli.accept_exit_codes.iter().copied().collect(),
        heartbeat_interval: Duration::from_secs(cli.heartbeat_secs),
    };
    let mut supervisor = Supervisor::new(job, BlenderProcess::new(), opts);
    if cli.resume.is_some() {
        supervisor.resume_from_disk()?;
    }

    let cancel = supervisor.cancel_token();
    if let Err(e) = ctrlc::set_handler(move || cancel.cancel()) {
        tracing::warn!(error = %e, "failed to install Ctrl+C handler");
    }

    let summary = supervisor.run()?;

    if cli.json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        eprintln!(
            "rendered {} frames into {} (exit code {}, {} attempt(s))",
            summary.frames_completed,
            summary.output_dir.display(),
            summary.exit_code,
            summary.attempts
        );
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("resolve path '{}'", path.display()))
}
