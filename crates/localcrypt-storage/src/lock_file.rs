use std::{
    fs::{self, File, OpenOptions},
    io,
    path::Path,
};

use fs4::fs_std::FileExt;

/// Exclusive advisory lock on a file, shared by every process that opens the
/// same path. Released when dropped.
pub(crate) struct LockFile {
    _file: File,
}

impl LockFile {
    /// Block until the lock at `path` is ours, creating the file and its
    /// parent directories if needed.
    pub(crate) fn acquire(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.lock_exclusive()?;
        Ok(Self { _file: file })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            mpsc, Arc,
        },
        thread,
        time::Duration,
    };

    use super::*;

    #[test]
    fn creates_missing_parent_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("keyring.lock");
        let _lock = LockFile::acquire(&path).expect("acquire");
        assert!(path.exists());
    }

    #[test]
    fn second_holder_waits_for_the_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("keyring.lock");
        let first = LockFile::acquire(&path).expect("first acquire");
        let released = Arc::new(AtomicBool::new(false));

        let (tx, rx) = mpsc::channel();
        let waiter = {
            let path = path.clone();
            let released = Arc::clone(&released);
            thread::spawn(move || {
                // separate open, as another process would have
                let _second = LockFile::acquire(&path).expect("second acquire");
                tx.send(released.load(Ordering::SeqCst)).expect("send");
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
        released.store(true, Ordering::SeqCst);
        drop(first);

        let saw_release = rx.recv_timeout(Duration::from_secs(10)).expect("second holder");
        assert!(saw_release);
        waiter.join().expect("thread");
    }
}
