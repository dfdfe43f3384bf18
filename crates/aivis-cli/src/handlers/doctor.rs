//! `doctor`: check what speech needs and say how to fix what is missing.

use aivis_core::{AppConfig, ConfigOverrides};
use aivis_runtime::speech::available_players;
use aivis_runtime::system::{self, Dependency, DependencyStatus};
use aivis_store::RedisStore;
use tokio::process::Command;

use crate::bootstrap;
use crate::error::CliError;
use crate::utils::input;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// One line of the doctor table.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Check {
    name: String,
    ok: bool,
    detail: String,
    hint: Option<String>,
    install: Option<Vec<String>>,
}

impl Check {
    fn from_dependency(dep: Dependency) -> Self {
        let (ok, detail) = match &dep.status {
            DependencyStatus::Present { path, version } => (
                true,
                version
                    .clone()
                    .unwrap_or_else(|| path.display().to_string()),
            ),
            DependencyStatus::Missing => (false, format!("{} not found", dep.description)),
        };
        Self {
            name: dep.name,
            ok,
            detail,
            hint: dep.install_hint,
            install: dep.install_command,
        }
    }

    fn row(&self) -> String {
        let status = if self.ok {
            format!("{GREEN}✓ ok{RESET}")
        } else {
            format!("{RED}✗ missing{RESET}")
        };
        format!("{:<14} {:<20} {}", self.name, status, self.detail)
    }
}

fn api_key_check(config: &AppConfig) -> Check {
    Check {
        name: "API key".to_string(),
        ok: config.has_api_key(),
        detail: if config.has_api_key() {
            "configured".to_string()
        } else {
            "not set".to_string()
        },
        hint: Some("run `aivis-mcp init` or set AIVIS_API_KEY".to_string()),
        install: None,
    }
}

/// ffplay, or mpv when ffplay is absent.
fn player_check() -> Check {
    let ffplay = system::ffplay();
    if ffplay.status.is_present() {
        return Check::from_dependency(ffplay);
    }
    let mpv = system::mpv();
    if mpv.status.is_present() {
        return Check::from_dependency(mpv);
    }
    let mut check = Check::from_dependency(ffplay);
    if let Some(player) = available_players().into_iter().next() {
        check.ok = true;
        check.detail = format!("{player} (buffered playback)");
    }
    check
}

async fn store_check(config: &AppConfig) -> Check {
    let (ok, detail) = match RedisStore::open(&config.redis_url).await {
        Ok(_) => (true, config.redis_url.clone()),
        Err(e) => (false, e.to_string()),
    };
    Check {
        name: "Redis".to_string(),
        ok,
        detail,
        hint: Some("start redis-server, or run any speak command to auto-start it".to_string()),
        install: None,
    }
}

/// Failing checks that come with a package-manager command.
fn install_offers(checks: &[Check]) -> Vec<(&str, &[String])> {
    checks
        .iter()
        .filter(|c| !c.ok)
        .filter_map(|c| match c.install.as_deref() {
            Some(command) if !command.is_empty() => Some((c.name.as_str(), command)),
            _ => None,
        })
        .collect()
}

/// Run the package manager with inherited stdio so sudo can prompt.
async fn install(name: &str, command: &[String]) {
    let Some((program, args)) = command.split_first() else {
        return;
    };
    match Command::new(program).args(args).status().await {
        Ok(status) if status.success() => println!("{GREEN}✓{RESET} installed {name}"),
        Ok(status) => println!("{RED}✗{RESET} {} exited with {status}", command.join(" ")),
        Err(e) => println!("{RED}✗{RESET} could not run {program}: {e}"),
    }
}

async fn offer_installs(checks: &[Check]) -> Result<(), CliError> {
    for (name, command) in install_offers(checks) {
        let question = format!("Install {name} now? ({})", command.join(" "));
        if input::confirm(&question)? {
            install(name, command).await;
        }
    }
    Ok(())
}

fn summary(checks: &[Check]) -> String {
    let passed = checks.iter().filter(|c| c.ok).count();
    format!("{passed}/{} OK", checks.len())
}

pub async fn execute(overrides: &ConfigOverrides) -> Result<(), CliError> {
    let config = bootstrap::resolve_config(overrides);
    let checks = vec![
        api_key_check(&config),
        Check::from_dependency(system::store_server()),
        player_check(),
        store_check(&config).await,
    ];

    println!("{BOLD}aivis-mcp doctor{RESET}");
    println!("{}", "-".repeat(50));
    for check in &checks {
        println!("{}", check.row());
    }

    let failing: Vec<&Check> = checks.iter().filter(|c| !c.ok).collect();
    if !failing.is_empty() {
        println!();
        println!("{BOLD}To fix:{RESET}");
        for check in failing {
            if let Some(hint) = &check.hint {
                println!("  {}: {hint}", check.name);
            }
        }
    }
    println!();
    println!("{}", summary(&checks));

    offer_installs(&checks).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn dependency(status: DependencyStatus) -> Dependency {
        Dependency {
            name: "redis-server".to_string(),
            description: "Coordination store".to_string(),
            status,
            install_hint: Some("brew install redis".to_string()),
            install_command: Some(vec![
                "brew".to_string(),
                "install".to_string(),
                "redis".to_string(),
            ]),
        }
    }

    #[test]
    fn present_dependency_shows_its_version() {
        let check = Check::from_dependency(dependency(DependencyStatus::Present {
            path: PathBuf::from("/usr/bin/redis-server"),
            version: Some("Redis server v=7.2.4".to_string()),
        }));
        assert!(check.ok);
        assert_eq!(check.detail, "Redis server v=7.2.4");
        assert!(check.row().contains("ok"));
    }

    #[test]
    fn missing_dependency_keeps_its_hint() {
        let check = Check::from_dependency(dependency(DependencyStatus::Missing));
        assert!(!check.ok);
        assert_eq!(check.hint.as_deref(), Some("brew install redis"));
        assert!(check.row().contains("missing"));
    }

    #[test]
    fn api_key_and_summary() {
        let config = AppConfig::default();
        let missing = api_key_check(&config);
        assert!(!missing.ok);

        let configured = api_key_check(&AppConfig {
            api_key: "k".to_string(),
            ..AppConfig::default()
        });
        assert!(configured.ok);
        assert_eq!(summary(&[missing, configured]), "1/2 OK");
    }

    #[test]
    fn only_failing_checks_with_a_command_are_offered() {
        let missing = Check::from_dependency(dependency(DependencyStatus::Missing));
        let present = Check::from_dependency(dependency(DependencyStatus::Present {
            path: PathBuf::from("/usr/bin/redis-server"),
            version: None,
        }));
        let no_key = api_key_check(&AppConfig::default());

        let checks = [missing, present, no_key];
        let offers = install_offers(&checks);
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].0, "redis-server");
        assert_eq!(offers[0].1, ["brew", "install", "redis"]);
    }
}
