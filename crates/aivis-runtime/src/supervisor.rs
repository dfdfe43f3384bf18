//! Producer-side worker supervision.
//!
//! A producer checks whether the worker lease exists and, if not, spawns a
//! detached worker process. It never contends for the lease itself; if
//! several producers spawn at once the workers race and the losers exit.
//! Spawning is fire-and-forget apart from a short settle delay; `health` is
//! how to confirm a worker actually came up.

use std::io;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;

use aivis_coord::{CoordError, Coordinator};
use thiserror::Error;
use tracing::{debug, info};

/// Environment marker set on spawned workers.
pub const WORKER_MODE_ENV: &str = "AIVIS_WORKER_MODE";

/// Subcommand selecting the worker role.
pub const WORKER_ARG: &str = "worker";

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Coord(#[from] CoordError),

    #[error("Failed to spawn worker: {0}")]
    Spawn(#[from] io::Error),
}

/// What [`WorkerSupervisor::ensure_worker`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    AlreadyRunning,
    Spawned,
}

/// Starts a worker somewhere. The process launcher is the only production
/// implementation.
pub trait WorkerLauncher: Send + Sync {
    fn launch(&self) -> io::Result<()>;
}

/// Re-invokes an executable with the worker role, detached from our stdio
/// and process group.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<String>,
    env: Vec<(String, String)>,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: vec![WORKER_ARG.to_string()],
            env: vec![(WORKER_MODE_ENV.to_string(), "1".to_string())],
        }
    }

    /// Launcher for the running executable.
    pub fn current_exe() -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }

    /// Extra environment for the child, e.g. a store URL given as a flag.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }
        cmd
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(&self) -> io::Result<()> {
        let mut child = self.command().spawn()?;
        debug!(pid = child.id(), program = %self.program.display(), "Spawned worker process");
        // Reap it whenever it exits so a long-lived server leaves no zombies.
        std::thread::spawn(move || {
            let _ = child.wait();
        });
        Ok(())
    }
}

pub struct WorkerSupervisor {
    coord: Coordinator,
    launcher: Arc<dyn WorkerLauncher>,
}

impl std::fmt::Debug for WorkerSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerSupervisor")
            .field("coord", &self.coord)
            .finish_non_exhaustive()
    }
}

impl WorkerSupervisor {
    pub fn new(coord: Coordinator, launcher: Arc<dyn WorkerLauncher>) -> Self {
        Self { coord, launcher }
    }

    /// Spawn a worker unless the lease key is present.
    pub async fn ensure_worker(&self) -> Result<EnsureOutcome, SupervisorError> {
        if self.coord.worker_present().await? {
            return Ok(EnsureOutcome::AlreadyRunning);
        }
        self.spawn_worker().await?;
        Ok(EnsureOutcome::Spawned)
    }

    /// Spawn unconditionally, then wait the settle delay.
    pub async fn spawn_worker(&self) -> Result<(), SupervisorError> {
        self.launcher.launch()?;
        info!("Worker process launched");
        tokio::time::sleep(self.coord.timings().spawn_settle).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use aivis_core::{CoordinationTimings, KeySpace, KvStore};
    use aivis_store::MemoryStore;

    #[derive(Default)]
    struct CountingLauncher {
        launches: AtomicUsize,
    }

    impl WorkerLauncher for CountingLauncher {
        fn launch(&self) -> io::Result<()> {
            self.launches.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn supervisor() -> (Coordinator, Arc<CountingLauncher>, WorkerSupervisor) {
        let store: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
        let timings = CoordinationTimings {
            spawn_settle: Duration::from_millis(1),
            ..CoordinationTimings::default()
        };
        let coord = Coordinator::new(store, KeySpace::new("sup"), timings);
        let launcher = Arc::new(CountingLauncher::default());
        let sup = WorkerSupervisor::new(coord.clone(), Arc::clone(&launcher) as Arc<dyn WorkerLauncher>);
        (coord, launcher, sup)
    }

    #[tokio::test]
    async fn spawns_when_no_lease_is_present() {
        let (_, launcher, sup) = supervisor();
        assert_eq!(sup.ensure_worker().await.unwrap(), EnsureOutcome::Spawned);
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn leaves_a_live_worker_alone() {
        let (coord, launcher, sup) = supervisor();
        assert!(coord.worker_lease("someone").try_acquire().await.unwrap());

        assert_eq!(sup.ensure_worker().await.unwrap(), EnsureOutcome::AlreadyRunning);
        assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
        // The presence check must not have touched the lease.
        assert_eq!(
            coord.status().await.unwrap().worker_holder.as_deref(),
            Some("someone")
        );
    }

    #[test]
    fn launcher_marks_the_worker_role() {
        let launcher = ProcessLauncher::new("/usr/bin/aivis-mcp").env("REDIS_URL", "redis://h:1");
        let cmd = launcher.command();

        let args: Vec<_> = cmd.get_args().collect();
        assert_eq!(args, [WORKER_ARG]);
        let envs: Vec<_> = cmd
            .get_envs()
            .filter_map(|(k, v)| Some((k.to_str()?, v?.to_str()?)))
            .collect();
        assert!(envs.contains(&(WORKER_MODE_ENV, "1")));
        assert!(envs.contains(&("REDIS_URL", "redis://h:1")));
    }
}
