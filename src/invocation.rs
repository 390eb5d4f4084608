//! Building the external get_iplayer command line
//!
//! The job runner only needs a program and an argument vector; [`Invocation`]
//! is the seam that supplies them. [`GetIplayer`] is the production
//! implementation and resolves the entrypoint once, at construction.

use std::path::{Path, PathBuf};

use crate::config::ToolsConfig;
use crate::types::JobId;

/// Environment variable that overrides entrypoint discovery
pub const ENTRYPOINT_ENV: &str = "GET_IPLAYER_COMMAND";

/// Executable name searched for on PATH
pub const DEFAULT_PROGRAM: &str = "get_iplayer";

/// Arguments passed to every download before `--output` and `--pid`
const DOWNLOAD_ARGS: [&str; 7] = [
    "--get",
    "--subtitles",
    "--subs-embed",
    "--force",
    "--overwrite",
    "--tv-quality=fhd,hd,sd",
    "--log-progress",
];

/// A fully built command: program plus arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Command from a program and its arguments
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Shell-quoted rendering for logs
    pub fn display(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.as_str());
        parts.extend(self.args.iter().map(String::as_str));
        format_command(&parts)
    }
}

/// Supplies the command that downloads one identifier into a directory
pub trait Invocation: Send + Sync {
    /// Program name used in diagnostics
    fn program_name(&self) -> &str;

    /// Command that downloads `id` into `output_dir`
    fn download_command(&self, id: &JobId, output_dir: &Path) -> CommandSpec;

    /// Command that lists the episodes of a brand or series, if supported
    fn expansion_command(&self, _pid: &str) -> Option<CommandSpec> {
        None
    }
}

/// get_iplayer, located via config, environment or PATH
#[derive(Debug, Clone)]
pub struct GetIplayer {
    /// Program and any leading wrapper arguments (e.g. `cmd.exe /c`)
    prefix: Vec<String>,
}

impl GetIplayer {
    /// Resolve the entrypoint from `tools` and the environment
    pub fn new(tools: &ToolsConfig) -> Self {
        let entrypoint = resolve_entrypoint(tools, std::env::var(ENTRYPOINT_ENV).ok());
        Self::with_entrypoint(entrypoint)
    }

    /// Use an explicit entrypoint, wrapping batch files on Windows
    pub fn with_entrypoint(entrypoint: impl Into<PathBuf>) -> Self {
        let entrypoint = entrypoint.into().to_string_lossy().into_owned();
        Self {
            prefix: wrap_entrypoint(entrypoint),
        }
    }

    /// Program and wrapper arguments that start every command
    pub fn prefix(&self) -> &[String] {
        &self.prefix
    }

    fn split_prefix(&self) -> (String, Vec<String>) {
        match self.prefix.split_first() {
            Some((program, rest)) => (program.clone(), rest.to_vec()),
            None => (DEFAULT_PROGRAM.to_string(), Vec::new()),
        }
    }
}

impl Invocation for GetIplayer {
    fn program_name(&self) -> &str {
        DEFAULT_PROGRAM
    }

    fn download_command(&self, id: &JobId, output_dir: &Path) -> CommandSpec {
        let (program, mut args) = self.split_prefix();
        args.extend(DOWNLOAD_ARGS.iter().map(|a| a.to_string()));
        args.push("--output".to_string());
        args.push(output_dir.to_string_lossy().into_owned());
        args.push(format!("--pid={}", id.as_str()));
        CommandSpec::new(program, args)
    }

    fn expansion_command(&self, pid: &str) -> Option<CommandSpec> {
        let (program, mut args) = self.split_prefix();
        args.push(format!("--pid={pid}"));
        args.push("--pid-recursive-list".to_string());
        Some(CommandSpec::new(program, args))
    }
}

/// Pick the entrypoint: config path, then `env_override`, then PATH, then the bare name
pub fn resolve_entrypoint(tools: &ToolsConfig, env_override: Option<String>) -> PathBuf {
    if let Some(path) = &tools.get_iplayer_path {
        tracing::debug!(?path, "using configured get_iplayer path");
        return path.clone();
    }
    if let Some(value) = env_override.filter(|v| !v.trim().is_empty()) {
        tracing::debug!(entrypoint = %value, "using get_iplayer entrypoint from {}", ENTRYPOINT_ENV);
        return PathBuf::from(value);
    }
    if tools.search_path {
        for candidate in candidate_names() {
            if let Ok(found) = which::which(candidate) {
                tracing::debug!(path = ?found, "found get_iplayer on PATH");
                return found;
            }
        }
    }
    #[cfg(windows)]
    for base in ["ProgramFiles", "ProgramFiles(x86)"] {
        if let Some(dir) = std::env::var_os(base) {
            let candidate = PathBuf::from(dir).join("get_iplayer").join("get_iplayer.cmd");
            if candidate.exists() {
                return candidate;
            }
        }
    }
    tracing::debug!("falling back to bare get_iplayer entrypoint");
    PathBuf::from(candidate_names()[0])
}

#[cfg(windows)]
fn candidate_names() -> &'static [&'static str] {
    &[
        "get_iplayer.cmd",
        "get_iplayer.bat",
        "get_iplayer.exe",
        "get_iplayer",
    ]
}

#[cfg(not(windows))]
fn candidate_names() -> &'static [&'static str] {
    &["get_iplayer"]
}

#[cfg(windows)]
fn wrap_entrypoint(entrypoint: String) -> Vec<String> {
    let lowered = entrypoint.to_lowercase();
    if lowered.ends_with(".cmd") || lowered.ends_with(".bat") {
        let comspec = std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string());
        return vec![comspec, "/c".to_string(), entrypoint];
    }
    vec![entrypoint]
}

#[cfg(not(windows))]
fn wrap_entrypoint(entrypoint: String) -> Vec<String> {
    vec![entrypoint]
}

fn is_shell_safe(part: &str) -> bool {
    !part.is_empty()
        && part
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./_-".contains(c))
}

/// Join `parts` into a POSIX-shell-quoted command line
pub fn format_command<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|part| {
            let part = part.as_ref();
            if is_shell_safe(part) {
                part.to_string()
            } else {
                format!("'{}'", part.replace('\'', r#"'"'"'"#))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_command_arguments() {
        let invocation = GetIplayer::with_entrypoint("/opt/get_iplayer");
        let spec = invocation.download_command(&JobId::from("b0abcdef"), Path::new("/tmp/.auntie-x"));
        assert_eq!(spec.program, "/opt/get_iplayer");
        assert_eq!(
            spec.args,
            vec![
                "--get",
                "--subtitles",
                "--subs-embed",
                "--force",
                "--overwrite",
                "--tv-quality=fhd,hd,sd",
                "--log-progress",
                "--output",
                "/tmp/.auntie-x",
                "--pid=b0abcdef",
            ]
        );
    }

    #[test]
    fn test_expansion_command_arguments() {
        let invocation = GetIplayer::with_entrypoint("/opt/get_iplayer");
        let spec = invocation.expansion_command("b04vs4r9").unwrap();
        assert_eq!(spec.program, "/opt/get_iplayer");
        assert_eq!(spec.args, vec!["--pid=b04vs4r9", "--pid-recursive-list"]);
    }

    #[test]
    fn test_configured_path_wins() {
        let tools = ToolsConfig {
            get_iplayer_path: Some(PathBuf::from("/custom/get_iplayer")),
            search_path: true,
        };
        let resolved = resolve_entrypoint(&tools, Some("/env/get_iplayer".to_string()));
        assert_eq!(resolved, PathBuf::from("/custom/get_iplayer"));
    }

    #[test]
    fn test_env_override_beats_path_search() {
        let tools = ToolsConfig::default();
        let resolved = resolve_entrypoint(&tools, Some("/env/get_iplayer".to_string()));
        assert_eq!(resolved, PathBuf::from("/env/get_iplayer"));
    }

    #[test]
    fn test_fallback_to_bare_name() {
        let tools = ToolsConfig {
            get_iplayer_path: None,
            search_path: false,
        };
        let resolved = resolve_entrypoint(&tools, Some("  ".to_string()));
        assert_eq!(resolved, PathBuf::from(candidate_names()[0]));
    }

    #[test]
    fn test_format_command_quotes() {
        assert_eq!(format_command(&["get_iplayer", "--pid=abc"]), "get_iplayer --pid=abc");
        assert_eq!(format_command(&["a b", ""]), "'a b' ''");
        assert_eq!(format_command(&["it's"]), r#"'it'"'"'s'"#);
    }

    #[test]
    fn test_command_spec_display() {
        let spec = CommandSpec::new("tool", vec!["--output".into(), "/tmp/my dir".into()]);
        assert_eq!(spec.display(), "tool --output '/tmp/my dir'");
    }
}
