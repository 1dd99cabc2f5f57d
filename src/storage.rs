//! Durable backend for the vault file.

use anyhow::{Context, Result};
use getrandom::fill;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// A durable location for the serialized vault mapping.
///
/// The whole mapping is written out on every mutation; a missing file simply
/// means an empty vault, so startup never fails on first use.
#[derive(Clone)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Returns `true` if the vault file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the vault file, or `None` if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Any I/O failure other than the file being absent is fatal and
    /// surfaced to the caller.
    pub fn load(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(&self.path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", self.path.display())),
        }
    }

    /// Saves data to the vault file using an atomic write.
    ///
    /// Crash-safety: data goes to a randomly named temp file in the same
    /// directory, is fsynced, atomically replaces the old file, and the
    /// parent directory is fsynced so the rename itself is persisted. A crash
    /// mid-save leaves either the old or the new file, never a partial one.
    ///
    /// Creates parent directories if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, data: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.random_tmp_path()?;

        // fail if the temp name is somehow taken
        let mut tmp_file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)
            .context("failed to create temporary file")?;

        tmp_file.write_all(data)?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        if let Err(e) = self.atomic_replace(&tmp_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        if let Some(parent) = self.path.parent() {
            let dir = File::open(parent)?;
            dir.sync_all()?;
        }

        Ok(())
    }

    /// Returns the path of the vault file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Unique sibling path `filename.tmp.<randomhex>`, named from CSPRNG
    /// bytes so concurrent saves cannot collide on the temp name.
    fn random_tmp_path(&self) -> Result<PathBuf> {
        let mut buf = [0u8; 8];
        fill(&mut buf)?;

        let rand_string = buf.iter().map(|b| format!("{:02x}", b)).collect::<String>();

        let file_name = self.path.file_name().unwrap().to_string_lossy();

        Ok(self
            .path
            .with_file_name(format!("{}.tmp.{}", file_name, rand_string)))
    }

    /// Atomically replaces the vault file with the temporary file.
    ///
    /// Uses Windows `ReplaceFileW` with `REPLACEFILE_WRITE_THROUGH` so the
    /// replacement is atomic and persisted.
    #[cfg(target_os = "windows")]
    fn atomic_replace(&self, tmp_path: &Path) -> Result<()> {
        use std::ffi::OsStr;
        use std::os::windows::ffi::OsStrExt;
        use windows_sys::Win32::Storage::FileSystem::{REPLACEFILE_WRITE_THROUGH, ReplaceFileW};

        fn to_wide(s: &OsStr) -> Vec<u16> {
            s.encode_wide().chain(std::iter::once(0)).collect()
        }

        let target_w = to_wide(self.path.as_os_str());
        let tmp_w = to_wide(tmp_path.as_os_str());

        // SAFETY:
        // - Strings are valid UTF-16 and null-terminated
        // - Pointers remain valid during the call
        // - Windows does not retain the pointers after return
        let result = unsafe {
            ReplaceFileW(
                target_w.as_ptr(),
                tmp_w.as_ptr(),
                std::ptr::null(),
                REPLACEFILE_WRITE_THROUGH,
                std::ptr::null(),
                std::ptr::null(),
            )
        };

        if result == 0 {
            let err = std::io::Error::last_os_error();
            return Err(err).context("atomic replace failed");
        }

        Ok(())
    }

    /// Atomically replaces the vault file with the temporary file.
    ///
    /// On Unix, `rename()` is atomic when both paths are on the same
    /// filesystem, and the temp file is always a sibling of the target.
    #[cfg(not(target_os = "windows"))]
    fn atomic_replace(&self, tmp_path: &Path) -> Result<()> {
        fs::rename(tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn load_returns_written_data() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("vault.json"));

        storage.save(b"hello world").unwrap();

        let data = storage.load().unwrap();
        assert_eq!(data.as_deref(), Some(b"hello world".as_slice()));
    }

    #[test]
    fn load_of_missing_file_is_not_an_error() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("missing.json"));

        assert!(storage.load().unwrap().is_none());
    }

    #[test]
    fn exists_reflects_saves() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("vault.json"));

        assert!(!storage.exists());
        storage.save(b"data").unwrap();
        assert!(storage.exists());
    }

    #[test]
    fn tmp_names_are_unique_siblings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vault.json");
        let storage = Storage::new(path.clone());

        let a = storage.random_tmp_path().unwrap();
        let b = storage.random_tmp_path().unwrap();

        assert_ne!(a, b);
        assert_ne!(a, path);
        assert_eq!(a.parent(), path.parent());
    }

    #[test]
    fn save_replaces_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("vault.json");
        let storage = Storage::new(path.clone());

        storage.save(b"first").unwrap();
        storage.save(b"second").unwrap();

        assert_eq!(fs::read(path).unwrap(), b"second");
    }

    #[test]
    fn tmp_file_is_removed_after_success() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("vault.json"));

        storage.save(b"data").unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0], "vault.json");
    }

    #[test]
    fn parent_directory_is_created() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("vault.json");

        let storage = Storage::new(nested.clone());
        storage.save(b"data").unwrap();

        assert!(nested.exists());
    }

    #[test]
    fn save_handles_large_payloads() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path().join("vault.json"));

        let large = vec![42u8; 100_000];
        storage.save(&large).unwrap();

        assert_eq!(storage.load().unwrap().unwrap(), large);
    }
}
