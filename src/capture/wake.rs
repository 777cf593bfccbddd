//! Keep-awake while recording
//!
//! The recorder holds a `KeepAwakeGuard` for as long as a session records.
//! Dropping the guard releases the inhibition, so teardown on any path
//! (stop, error, recorder dropped) gives the lock back.

use std::process::{Child, Command, Stdio};

/// Scoped keep-awake acquisition; released on drop
pub struct KeepAwakeGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl KeepAwakeGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn noop() -> Self {
        Self { release: None }
    }
}

impl Drop for KeepAwakeGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

pub trait KeepAwake: Send + Sync {
    fn acquire(&self) -> KeepAwakeGuard;
}

/// Does nothing; for headless runs and tests
pub struct NoopKeepAwake;

impl KeepAwake for NoopKeepAwake {
    fn acquire(&self) -> KeepAwakeGuard {
        KeepAwakeGuard::noop()
    }
}

/// Holds an OS sleep inhibitor process for the guard's lifetime
pub struct InhibitorKeepAwake;

impl InhibitorKeepAwake {
    fn spawn_inhibitor() -> std::io::Result<Child> {
        let mut command = if cfg!(target_os = "macos") {
            let mut c = Command::new("caffeinate");
            c.arg("-di");
            c
        } else {
            let mut c = Command::new("systemd-inhibit");
            c.args([
                "--what=idle:sleep",
                "--who=secure-camera",
                "--why=Recording in progress",
                "sleep",
                "infinity",
            ]);
            c
        };
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
    }
}

impl KeepAwake for InhibitorKeepAwake {
    fn acquire(&self) -> KeepAwakeGuard {
        match Self::spawn_inhibitor() {
            Ok(mut child) => {
                tracing::debug!("Keep-awake acquired (pid {})", child.id());
                KeepAwakeGuard::new(move || {
                    let _ = child.kill();
                    let _ = child.wait();
                    tracing::debug!("Keep-awake released");
                })
            }
            Err(e) => {
                tracing::warn!("Could not inhibit sleep, recording anyway: {}", e);
                KeepAwakeGuard::noop()
            }
        }
    }
}
