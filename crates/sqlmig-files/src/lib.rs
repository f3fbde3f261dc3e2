//! Filesystem pieces for sqlmig: a directory of migration files and an
//! advisory lock serializing runners.
//!
//! ```text
//! migrations/
//!   001_init.sql
//!   002_add_users.sql
//!   README.md              # ignored, not .sql
//! app.db
//! app.db.lock              # held while a run is in progress
//! ```

use fs2::FileExt;
use sqlmig_core::{Error, MigrationSource};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Migration files read from one directory.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl MigrationSource for DirectorySource {
    fn location(&self) -> String {
        self.root.display().to_string()
    }

    /// Regular files in the directory, sorted by name. Subdirectories and
    /// names that are not valid UTF-8 are left out.
    fn list(&self) -> Result<Vec<String>, Error> {
        let dir_error = |source| Error::DirectoryRead {
            path: self.location(),
            source,
        };

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(dir_error)? {
            let entry = entry.map_err(dir_error)?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(name) => log::warn!("skipping non UTF-8 file name {:?}", name),
            }
        }
        names.sort();
        Ok(names)
    }

    fn read(&self, name: &str) -> Result<String, Error> {
        fs::read_to_string(self.root.join(name)).map_err(|source| Error::FileRead {
            file: name.to_string(),
            source,
        })
    }
}

/// Exclusive advisory lock held for the duration of a migration run.
///
/// Released when dropped.
pub struct MigrationLock {
    file: File,
    path: PathBuf,
}

impl MigrationLock {
    /// Lock file path used for a database at `db_path`: `<db_path>.lock`.
    pub fn path_for<P: AsRef<Path>>(db_path: P) -> PathBuf {
        let mut path = db_path.as_ref().as_os_str().to_owned();
        path.push(".lock");
        PathBuf::from(path)
    }

    /// Block until the lock at `path` is acquired.
    pub fn acquire<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let (file, path) = Self::open(path.as_ref())?;
        file.lock_exclusive()?;
        log::debug!("acquired migration lock {}", path.display());
        Ok(Self { file, path })
    }

    /// Acquire the lock if nobody holds it; `None` if another process does.
    pub fn try_acquire<P: AsRef<Path>>(path: P) -> io::Result<Option<Self>> {
        let (file, path) = Self::open(path.as_ref())?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file, path })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(path: &Path) -> io::Result<(File, PathBuf)> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok((file, path.to_path_buf()))
    }
}

impl Drop for MigrationLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}
