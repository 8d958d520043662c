//! Lock file management for mutually exclusive schedule updates.
//!
//! Every command that writes to the Timer Backend or the sink (a timer fire,
//! `enable`, `disable`, `reconcile`) holds an exclusive lock on
//! `$XDG_RUNTIME_DIR/sunshift.lock` while it runs, so two diff-and-apply
//! passes never interleave. Unlike a long-running daemon lock, a busy lock is
//! waited on for a bounded time: the holder is another short-lived command.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::constants::*;

/// Holds the lock until dropped.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // The file stays in place; deleting it would race with a waiting process
        let _ = FileExt::unlock(&self.file);
    }
}

/// Default lock file location.
pub fn lock_path() -> PathBuf {
    let runtime_dir = std::env::var_os("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir);
    runtime_dir.join(LOCK_FILE_NAME)
}

/// Acquire the default lock, waiting up to [`LOCK_TIMEOUT_MS`].
pub fn acquire_lock() -> Result<LockGuard> {
    acquire_lock_at(&lock_path(), Duration::from_millis(LOCK_TIMEOUT_MS))
}

/// Acquire an exclusive lock on `path`, retrying until `timeout` elapses.
pub fn acquire_lock_at(path: &Path, timeout: Duration) -> Result<LockGuard> {
    // Open without truncating so a waiting process can still read the holder's PID
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("Failed to open lock file {}", path.display()))?;

    let started = Instant::now();
    let retry = Duration::from_millis(LOCK_RETRY_INTERVAL_MS);
    let mut announced = false;

    loop {
        match file.try_lock_exclusive() {
            Ok(()) => break,
            Err(e) if started.elapsed() >= timeout => {
                let holder = std::fs::read_to_string(path)
                    .ok()
                    .and_then(|content| content.trim().parse::<u32>().ok());
                return Err(match holder {
                    Some(pid) => anyhow::anyhow!(
                        "another sunshift command (PID {pid}) is still updating the schedule"
                    ),
                    None => anyhow::anyhow!("could not lock {}: {e}", path.display()),
                });
            }
            Err(_) => {
                if !announced {
                    log_debug!("Waiting for lock {}", path.display());
                    announced = true;
                }
                std::thread::sleep(retry.min(timeout));
            }
        }
    }

    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    writeln!(&file, "{}", std::process::id())?;
    file.flush()?;

    Ok(LockGuard {
        file,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_lock_excludes_second_holder_until_dropped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sunshift.lock");

        let guard = acquire_lock_at(&path, Duration::from_millis(50)).unwrap();
        let content = std::fs::read_to_string(guard.path()).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());

        let err = acquire_lock_at(&path, Duration::from_millis(150)).unwrap_err();
        assert!(err.to_string().contains(&std::process::id().to_string()));

        drop(guard);
        assert!(acquire_lock_at(&path, Duration::from_millis(50)).is_ok());
    }
}
