use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use console::Term;

use auntie::{
    BbcProgrammes, Config, GetIplayer, MetadataCache, MetadataSource, NoMetadata, Orchestrator,
    ProgressDisplay, RunReport, logging, wait_for_interrupt,
};

/// auntie - download multiple BBC iPlayer programmes in parallel
#[derive(Parser, Debug)]
#[command(name = "auntie")]
#[command(version)]
#[command(about = "Download multiple BBC iPlayer programmes in parallel", long_about = None)]
struct Cli {
    /// One or more programme, series or brand PIDs or URLs to download
    #[arg(value_name = "PID", required = true)]
    pids: Vec<String>,

    /// Enable verbose debug logging of get_iplayer interactions
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Keep the temporary download subdirectory instead of deleting it
    #[arg(short = 'n', long = "no-clean")]
    no_clean: bool,

    /// Rename completed video files to the Plex naming convention
    #[arg(short = 'p', long = "plex")]
    plex: bool,

    /// Maximum number of parallel download workers (default: CPU count)
    #[arg(short = 't', long = "threads")]
    threads: Option<usize>,

    /// JSON configuration file
    #[arg(long = "config", value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Cli {
    fn load_config(&self) -> auntie::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(threads) = self.threads {
            config.max_workers = threads.max(1);
        }
        if self.no_clean {
            config.clean_scratch = false;
        }
        if self.plex {
            config.plex_rename = true;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Hides the terminal cursor until restored or dropped
struct CursorGuard {
    term: Term,
    hidden: bool,
}

impl CursorGuard {
    fn hide() -> Self {
        let term = Term::stdout();
        let hidden = term.is_term() && term.hide_cursor().is_ok();
        Self { term, hidden }
    }

    fn restore(&mut self) {
        if !self.hidden {
            return;
        }
        self.hidden = false;
        let _ = self.term.show_cursor();
    }
}

impl Drop for CursorGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

fn print_report(report: &RunReport) {
    let mut stdout = std::io::stdout().lock();
    if !report.summary.is_empty() {
        let _ = write!(stdout, "\r");
    }
    for line in report.summary.iter().chain(report.messages().iter()) {
        let _ = writeln!(stdout, "{line}");
    }
    let _ = stdout.flush();
}

fn metadata_source(config: &Config) -> Arc<dyn MetadataSource> {
    if !config.metadata.enabled {
        return Arc::new(NoMetadata);
    }
    match BbcProgrammes::new(&config.metadata) {
        Ok(source) => Arc::new(source),
        Err(e) => {
            tracing::warn!(error = %e, "metadata lookups disabled");
            Arc::new(NoMetadata)
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("auntie: {e}");
            return ExitCode::FAILURE;
        }
    };

    let display = Arc::new(ProgressDisplay::new(&config));
    if let Err(e) = logging::init(Arc::clone(&display), cli.debug) {
        eprintln!("auntie: {e}");
    }

    let metadata = Arc::new(MetadataCache::new(metadata_source(&config)));
    let invocation = Arc::new(GetIplayer::new(&config.tools));
    let orchestrator = Orchestrator::new(config, display, invocation, metadata);

    let jobs = orchestrator.expand(&cli.pids).await;
    if jobs.is_empty() {
        eprintln!("auntie: no programme identifiers to download");
        return ExitCode::FAILURE;
    }
    orchestrator.register(&jobs).await;

    let mut cursor = CursorGuard::hide();
    let report = orchestrator.run(jobs, wait_for_interrupt()).await;
    cursor.restore();

    print_report(&report);
    ExitCode::from(u8::try_from(report.exit_code()).unwrap_or(1))
}
