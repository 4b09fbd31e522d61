//! Single-instance pid lock
//!
//! Only one run per harvester name may be live at a time. The lock is a
//! `<name>.pid` file created with `create_new`; it is removed on drop.

use anyhow::{bail, Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Held pid lock, released when dropped
#[derive(Debug)]
pub struct PidLock {
    path: PathBuf,
}

impl PidLock {
    /// Acquire the lock `<dir>/<name>.pid`
    ///
    /// A lock file left behind by a process that no longer exists is
    /// reclaimed on Linux; elsewhere the stale file must be removed by hand.
    pub fn acquire(dir: &Path, name: &str) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create lock directory: {}", dir.display()))?;

        let path = dir.join(format!("{}.pid", sanitize(name)));

        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    write!(file, "{}", std::process::id())
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    tracing::debug!(path = %path.display(), "Acquired pid lock");
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&path) {
                        tracing::warn!(path = %path.display(), "Removing stale pid lock");
                        let _ = fs::remove_file(&path);
                        continue;
                    }
                    bail!(
                        "Harvester `{name}` is already running (lock {})",
                        path.display()
                    );
                }
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to create {}", path.display()));
                }
            }
        }

        bail!("Could not acquire pid lock {}", path.display())
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to release pid lock");
        }
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

fn is_stale(path: &Path) -> bool {
    let Ok(contents) = fs::read_to_string(path) else {
        return false;
    };
    let Ok(pid) = contents.trim().parse::<u32>() else {
        return false;
    };

    cfg!(target_os = "linux") && !Path::new("/proc").join(pid.to_string()).exists()
}
