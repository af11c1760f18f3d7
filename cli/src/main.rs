//! Job Manager - command-line front end for the job engine.
//!
//! Lists jobs, stages one into the CAD working tree, and checks for and
//! installs application updates. All engine work runs on worker threads; this
//! thread only prints what they send back.

use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use engine::{
    registry::Registration,
    update::{CheckTrigger, UpdateApplier},
    worker::{spawn_download, spawn_transfer, spawn_update_check, TransferGate},
    DownloadOutcome, EngineConfig, JobRegistry, ProgressUpdate, UpdateDescriptor,
};

/// Version of this application
const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// How long a transfer waits for the startup update check before giving up on it
const BACKGROUND_CHECK_GRACE: Duration = Duration::from_secs(1);

/// Job Manager - stage job files from OneDrive into CADCode
#[derive(Parser, Debug)]
#[command(name = "jobmanager")]
#[command(version)]
#[command(about = "Transfer job files between the jobs folder and the CAD working tree")]
struct Args {
    /// Folder holding one subfolder per job
    #[arg(long, value_name = "PATH", env = "JOBMANAGER_JOBS_ROOT", global = true)]
    jobs_root: Option<PathBuf>,

    /// Working tree that receives the staged job
    #[arg(long, value_name = "PATH", env = "JOBMANAGER_DEST_ROOT", global = true)]
    dest_root: Option<PathBuf>,

    /// Location of the update descriptor JSON
    #[arg(long, value_name = "URL", env = "JOBMANAGER_UPDATE_URL", global = true)]
    update_url: Option<String>,

    /// Enable verbose output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the jobs available under the jobs folder
    ///
    /// Custom folders are not remembered between runs; pass them with --from
    /// to list them alongside the jobs folder.
    List {
        /// Custom job folder to include (repeatable)
        #[arg(long, value_name = "DIR")]
        from: Vec<PathBuf>,
    },

    /// Stage a job into the working tree
    Transfer {
        /// Job name under the jobs folder
        #[arg(value_name = "JOB", conflicts_with = "from", required_unless_present = "from")]
        job: Option<String>,

        /// Use this job folder instead (USB stick, Desktop, ...)
        #[arg(long, value_name = "DIR")]
        from: Option<PathBuf>,

        /// Don't back a --from folder up into the jobs folder
        #[arg(long, requires = "from")]
        no_mirror: bool,

        /// Skip the background update check
        #[arg(long)]
        no_update_check: bool,
    },

    /// Check whether a newer version is available
    CheckUpdate,

    /// Download and install the latest version
    Update {
        /// Answer yes to every confirmation
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

/// Renders worker progress on the control thread
struct CliProgress {
    start_time: Instant,
    bar_visible: bool,
}

impl CliProgress {
    fn new() -> Self {
        CliProgress {
            start_time: Instant::now(),
            bar_visible: false,
        }
    }

    fn format_bytes(bytes: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = bytes as f64;
        let mut unit_idx = 0;

        while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
            size /= 1024.0;
            unit_idx += 1;
        }

        format!("{:.2} {}", size, UNITS[unit_idx])
    }

    fn format_duration(elapsed: Duration) -> String {
        let secs = elapsed.as_secs();
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}s", secs)
        }
    }

    fn progress_bar(percent: u8) -> String {
        let percent = percent.min(100) as usize;
        let filled = percent / 5;
        format!("[{}{}] {}%", "=".repeat(filled), " ".repeat(20 - filled), percent)
    }

    fn handle(&mut self, update: ProgressUpdate) {
        match update {
            ProgressUpdate::Message(message) => {
                self.end_bar();
                eprintln!("{}", message);
            }
            ProgressUpdate::Percent(percent) => {
                eprint!("\rDownloading: {}", Self::progress_bar(percent));
                let _ = io::stderr().flush();
                self.bar_visible = true;
            }
        }
    }

    fn end_bar(&mut self) {
        if self.bar_visible {
            eprintln!();
            self.bar_visible = false;
        }
    }

    fn elapsed(&self) -> String {
        Self::format_duration(self.start_time.elapsed())
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "engine=debug,jobmanager=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn build_config(args: &Args) -> EngineConfig {
    let mut config = EngineConfig::from_env(CURRENT_VERSION);
    if let Some(root) = &args.jobs_root {
        config = config.with_default_root(root);
    }
    if let Some(root) = &args.dest_root {
        config = config.with_destination_root(root);
    }
    if let Some(url) = &args.update_url {
        config = config.with_update_url(url);
    }
    debug!(?config, "resolved configuration");
    config
}

/// Parse arguments, run the command and exit with its status
fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let exit_code = match run_cli(&args) {
        Ok(()) => 0,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args) -> Result<(), String> {
    let config = Arc::new(build_config(args));
    let registry = Arc::new(JobRegistry::new());

    match &args.command {
        Command::List { from } => run_list(&config, &registry, from, &mut io::stdout()),
        Command::Transfer {
            job,
            from,
            no_mirror,
            no_update_check,
        } => run_transfer(
            config,
            registry,
            job.as_deref(),
            from.as_ref(),
            !no_mirror,
            !no_update_check,
        ),
        Command::CheckUpdate => run_check_update(config).map(|_| ()),
        Command::Update { yes } => run_update(config, *yes, &mut io::stdin().lock()),
    }
}

fn run_list(
    config: &EngineConfig,
    registry: &JobRegistry,
    folders: &[PathBuf],
    out: &mut dyn Write,
) -> Result<(), String> {
    for folder in folders {
        registry
            .register_folder(folder, false)
            .map_err(|e| e.to_string())?;
    }

    let listing = registry.list_jobs(&config.default_root);

    for job in &listing.jobs {
        let line = if job.is_ad_hoc() {
            format!("[custom] {}", job.name)
        } else {
            job.name.clone()
        };
        writeln!(out, "{}", line).map_err(|e| e.to_string())?;
    }

    if let Some(err) = listing.root_error {
        return Err(format!(
            "Jobs folder not found: {} ({})",
            config.default_root.display(),
            err
        ));
    }

    eprintln!(
        "Found {} job(s) ({} custom)",
        listing.jobs.len(),
        listing.ad_hoc_count
    );
    Ok(())
}

fn run_transfer(
    config: Arc<EngineConfig>,
    registry: Arc<JobRegistry>,
    job: Option<&str>,
    from: Option<&PathBuf>,
    mirror: bool,
    background_check: bool,
) -> Result<(), String> {
    let job_name = match (from, job) {
        (Some(folder), _) => {
            let registration = registry
                .register_folder(folder, mirror)
                .map_err(|e| e.to_string())?;
            match &registration {
                Registration::Added(job) => eprintln!("Added custom job: {}", job.name),
                Registration::Updated(job) => eprintln!("Updated custom source for: {}", job.name),
            }
            registration.job().name.clone()
        }
        (None, Some(name)) => name.to_string(),
        (None, None) => return Err("Specify a job name or --from <DIR>".to_string()),
    };

    let update_check = background_check
        .then(|| spawn_update_check(Arc::clone(&config), CheckTrigger::Background));

    let gate = TransferGate::new();
    let mut progress = CliProgress::new();
    let result = spawn_transfer(registry, config, &gate, job_name)
        .wait(|update| progress.handle(update))
        .ok_or_else(|| "Transfer worker stopped unexpectedly".to_string())?;

    if let Some(check) = update_check {
        // Background checks never report failures
        if let Ok(outcome) = check.result().recv_timeout(BACKGROUND_CHECK_GRACE) {
            if let Some(descriptor) = outcome.available() {
                eprintln!(
                    "Version {} is available. Run `jobmanager update` to install it.",
                    descriptor.version
                );
            }
        }
    }

    match result.error() {
        None => {
            eprintln!("Elapsed: {}", progress.elapsed());
            Ok(())
        }
        Some(err) => Err(format!("Error during transfer: {}", err)),
    }
}

fn run_check_update(config: Arc<EngineConfig>) -> Result<Option<UpdateDescriptor>, String> {
    eprintln!("Checking for updates...");
    let outcome = spawn_update_check(config.clone(), CheckTrigger::Manual)
        .wait(|_| {})
        .ok_or_else(|| "Update check stopped unexpectedly".to_string())?;

    if let Some(err) = outcome.reportable_error() {
        return Err(format!("Could not check for updates: {}", err));
    }

    match outcome.available() {
        Some(descriptor) => {
            println!("Version {} is available!", descriptor.version);
            println!();
            println!("Release notes:");
            println!("{}", descriptor.release_notes_or_default());
            Ok(Some(descriptor.clone()))
        }
        None => {
            println!("Job Manager v{} is up to date.", config.current_version);
            Ok(None)
        }
    }
}

/// Ask a yes/no question on stderr; anything but y/yes is a no
fn confirm(prompt: &str, assume_yes: bool, input: &mut dyn BufRead) -> bool {
    if assume_yes {
        return true;
    }
    eprint!("{} [y/N] ", prompt);
    let _ = io::stderr().flush();

    let mut answer = String::new();
    if input.read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn run_update(config: Arc<EngineConfig>, assume_yes: bool, input: &mut dyn BufRead) -> Result<(), String> {
    let descriptor = match run_check_update(Arc::clone(&config))? {
        Some(descriptor) => descriptor,
        None => return Ok(()),
    };

    if !confirm("Would you like to download and install it?", assume_yes, input) {
        return Ok(());
    }

    let mut progress = CliProgress::new();
    let result = spawn_download(descriptor.download_url.clone(), config.update_file_path())
        .wait(|update| progress.handle(update))
        .ok_or_else(|| "Download stopped unexpectedly".to_string())?;
    progress.end_bar();

    let update_file = match result.outcome {
        DownloadOutcome::Success(path) => path,
        DownloadOutcome::Failure(err) => return Err(format!("Failed to download update: {}", err)),
    };
    eprintln!(
        "Update downloaded successfully ({}).",
        CliProgress::format_bytes(result.bytes_written)
    );

    if !confirm("The application will now restart to apply the update. Continue?", assume_yes, input) {
        eprintln!("Update saved to {}", update_file.display());
        return Ok(());
    }

    let applier = UpdateApplier::for_current_exe(&update_file, &config.work_dir)
        .map_err(|e| format!("Failed to apply update: {}", e))?;
    match applier.apply() {
        Ok(never) => match never {},
        Err(e) => Err(format!("Failed to apply update: {}", e)),
    }
}
