//! Test configuration helpers

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use auntie::job::spawn_attached;
use auntie::{
    CommandSpec, Config, GetIplayer, MetadataCache, MetadataSource, NoMetadata, Orchestrator,
    ProgressDisplay,
};

/// Config for running jobs in `work_dir` with the display hidden and pipes
/// instead of a pseudo-terminal
pub fn test_config(work_dir: &Path) -> Config {
    let mut config = Config::default();
    config.work_dir = work_dir.to_path_buf();
    config.max_workers = 2;
    config.use_pty = false;
    config.poll_interval = Duration::from_millis(20);
    config.terminate_on_interrupt = true;
    config.display.hidden = true;
    config.metadata.enabled = false;
    config
}

/// Production-like config: the tool runs on a pseudo-terminal and is left
/// running on interrupt
///
/// `None` when this environment cannot allocate pseudo-terminals.
pub fn terminal_config(work_dir: &Path) -> Option<Config> {
    let smoke = CommandSpec::new("sh", vec!["-c".to_string(), "true".to_string()]);
    spawn_attached(&smoke, work_dir, true, "sh").ok()?;

    let mut config = test_config(work_dir);
    config.use_pty = true;
    config.terminate_on_interrupt = false;
    Some(config)
}

/// Orchestrator driving the tool at `tool` with offline metadata
pub fn offline_orchestrator(config: Config, tool: &Path) -> Orchestrator {
    orchestrator_with(config, tool, Arc::new(NoMetadata))
}

/// Orchestrator driving the tool at `tool` with the given metadata source
pub fn orchestrator_with(
    config: Config,
    tool: &Path,
    source: Arc<dyn MetadataSource>,
) -> Orchestrator {
    let display = Arc::new(ProgressDisplay::new(&config));
    Orchestrator::new(
        config,
        display,
        Arc::new(GetIplayer::with_entrypoint(tool)),
        Arc::new(MetadataCache::new(source)),
    )
}

/// Names of leftover scratch directories in `dir`
pub fn scratch_dirs(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .expect("read work dir")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with(".auntie"))
        .collect()
}
