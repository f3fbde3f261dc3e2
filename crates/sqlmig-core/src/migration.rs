//! Migration naming and the source trait migration files are read through.

use std::cmp::Ordering;
use std::io;

use serde::Serialize;

use crate::error::Error;

const SQL_SUFFIX: &str = ".sql";

/// A discovered `<migrationID>_<freeform>.sql` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFile {
    pub name: String,
    pub id: String,
}

impl MigrationFile {
    /// Build from a file name, or `None` if it has no usable migration ID.
    pub fn from_name(name: &str) -> Option<Self> {
        let id = parse_migration_id(name)?;
        Some(Self {
            name: name.to_string(),
            id: id.to_string(),
        })
    }
}

/// The token before the first `_` of a `.sql` file name.
///
/// Returns `None` for names without the `.sql` suffix, without `_`, or with
/// an empty ID.
pub fn parse_migration_id(name: &str) -> Option<&str> {
    let stem = name.strip_suffix(SQL_SUFFIX)?;
    let (id, _) = stem.split_once('_')?;
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

pub(crate) fn is_sql_file(name: &str) -> bool {
    name.ends_with(SQL_SUFFIX)
}

/// Order migration IDs: numerically when both are all ASCII digits,
/// lexicographically otherwise.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit());
    if numeric(a) && numeric(b) {
        let a_digits = a.trim_start_matches('0');
        let b_digits = b.trim_start_matches('0');
        a_digits
            .len()
            .cmp(&b_digits.len())
            .then_with(|| a_digits.cmp(b_digits))
    } else {
        a.cmp(b)
    }
}

/// Where migration files come from.
pub trait MigrationSource {
    /// Location used in log lines and errors.
    fn location(&self) -> String;

    /// Names of all entries, in listing order. Non-`.sql` names are ignored
    /// by the runner.
    fn list(&self) -> Result<Vec<String>, Error>;

    /// Full text of the named file.
    fn read(&self, name: &str) -> Result<String, Error>;
}

impl<S: MigrationSource + ?Sized> MigrationSource for &S {
    fn location(&self) -> String {
        (**self).location()
    }

    fn list(&self) -> Result<Vec<String>, Error> {
        (**self).list()
    }

    fn read(&self, name: &str) -> Result<String, Error> {
        (**self).read(name)
    }
}

/// Migrations held in memory, e.g. embedded with `include_str!`.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    files: Vec<(String, String)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, builder style.
    pub fn with(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.add(name, text);
        self
    }

    /// Add a file, replacing any file with the same name.
    pub fn add(&mut self, name: impl Into<String>, text: impl Into<String>) {
        let name = name.into();
        let text = text.into();
        match self.files.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = text,
            None => self.files.push((name, text)),
        }
    }
}

impl MigrationSource for MemorySource {
    fn location(&self) -> String {
        "<memory>".to_string()
    }

    fn list(&self) -> Result<Vec<String>, Error> {
        Ok(self.files.iter().map(|(name, _)| name.clone()).collect())
    }

    fn read(&self, name: &str) -> Result<String, Error> {
        self.files
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, text)| text.clone())
            .ok_or_else(|| Error::FileRead {
                file: name.to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such embedded migration"),
            })
    }
}
