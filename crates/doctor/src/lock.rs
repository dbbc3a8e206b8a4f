use crate::LockError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use town_layout::MAYOR_DIR;

pub const FIX_LOCK_FILE: &str = ".doctor.lock";

pub fn fix_lock_path(town_root: &Path) -> PathBuf {
    town_root.join(MAYOR_DIR).join(FIX_LOCK_FILE)
}

/// Exclusive advisory lock held for the duration of a `--fix` pass.
#[derive(Debug)]
pub struct FixLock {
    file: File,
    path: PathBuf,
}

impl FixLock {
    /// Take the lock without waiting; a concurrent fix pass yields [`LockError::Busy`].
    pub fn acquire(town_root: &Path) -> Result<FixLock, LockError> {
        let path = fix_lock_path(town_root);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        if file.try_lock_exclusive().is_err() {
            return Err(LockError::Busy(path));
        }
        log::debug!("Acquired fix lock {}", path.display());
        Ok(FixLock { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FixLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
