//! External dependency probing.
//!
//! The store server and an audio player are plain executables on `PATH`.
//! `doctor` prints the install hints and offers to run the package manager
//! after asking; the MCP server only logs what is missing.

use std::path::PathBuf;
use std::process::Command;

use crate::speech::player_candidates;

/// Result of looking a dependency up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyStatus {
    Present {
        path: PathBuf,
        version: Option<String>,
    },
    Missing,
}

impl DependencyStatus {
    pub const fn is_present(&self) -> bool {
        matches!(self, Self::Present { .. })
    }
}

/// A system dependency and its current status.
#[derive(Debug, Clone)]
pub struct Dependency {
    pub name: String,
    pub description: String,
    pub status: DependencyStatus,
    pub install_hint: Option<String>,
    /// Package-manager invocation that installs it, where one is known.
    pub install_command: Option<Vec<String>>,
}

impl Dependency {
    fn detect(name: &str, description: &str, version_flag: &str) -> Self {
        let status = match which::which(name) {
            Ok(path) => DependencyStatus::Present {
                version: command_version(&path, version_flag),
                path,
            },
            Err(_) => DependencyStatus::Missing,
        };
        Self {
            name: name.to_string(),
            description: description.to_string(),
            status,
            install_hint: None,
            install_command: None,
        }
    }

    /// Attach install instructions for `package` on this OS.
    #[must_use]
    pub fn with_package(mut self, package: &str) -> Self {
        self.install_command = install_command(std::env::consts::OS, package);
        self.install_hint = install_hint(package);
        self
    }
}

/// First line of `<program> <flag>`, from stdout or else stderr.
fn command_version(program: &std::path::Path, flag: &str) -> Option<String> {
    let output = Command::new(program).arg(flag).output().ok()?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let text = if stdout.trim().is_empty() { stderr } else { stdout };
    text.lines()
        .next()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
}

/// Package-manager command installing `package` on `os` (as in
/// [`std::env::consts::OS`]). `None` where there is no package manager to
/// drive.
pub fn install_command(os: &str, package: &str) -> Option<Vec<String>> {
    let args: Vec<&str> = match os {
        "macos" => vec!["brew", "install", package],
        "linux" => {
            let apt_name = if package == "redis" { "redis-server" } else { package };
            vec!["sudo", "apt", "install", "-y", apt_name]
        }
        _ => return None,
    };
    Some(args.into_iter().map(str::to_string).collect())
}

fn install_hint(package: &str) -> Option<String> {
    if let Some(command) = install_command(std::env::consts::OS, package) {
        return Some(command.join(" "));
    }
    match package {
        "redis" => Some("https://redis.io/download".to_string()),
        "ffmpeg" => Some("https://ffmpeg.org/download.html".to_string()),
        _ => None,
    }
}

/// The coordination store server.
pub fn store_server() -> Dependency {
    Dependency::detect("redis-server", "Coordination store", "--version")
        .with_package("redis")
}

/// The preferred audio player.
pub fn ffplay() -> Dependency {
    let name = player_candidates()[0];
    Dependency::detect(name, "Streaming audio player", "-version").with_package("ffmpeg")
}

/// Alternative streaming player.
pub fn mpv() -> Dependency {
    let name = if cfg!(target_os = "windows") { "mpv.exe" } else { "mpv" };
    Dependency::detect(name, "Alternative audio player", "--version")
        .with_package("mpv")
}

/// Names of the dependencies a server needs but cannot find.
///
/// Any supported player will do, so ffplay is only reported when no
/// candidate is available at all.
pub fn missing_dependencies() -> Vec<String> {
    let mut missing = Vec::new();
    if which::which("redis-server").is_err() {
        missing.push("redis-server".to_string());
    }
    if crate::speech::available_players().is_empty() {
        missing.push("ffplay (ffmpeg)".to_string());
    }
    missing
}
