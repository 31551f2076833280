use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::PersistenceError;

pub mod portfolio;
pub mod quotes;
pub mod rates;

mod naive_date_format {
    use chrono::NaiveDate;
    use serde::{self, Deserialize, Deserializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Replaces `path` with `contents` as a whole, through a temporary file in
/// the same directory.
fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), PersistenceError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| PersistenceError::io(dir, e))?;

    let mut file = NamedTempFile::new_in(dir).map_err(|e| PersistenceError::io(dir, e))?;
    file.write_all(contents)
        .map_err(|e| PersistenceError::io(file.path(), e))?;
    file.persist(path).map_err(|e| PersistenceError::Replace {
        path: path.to_path_buf(),
        source: e,
    })?;

    log::info!("Wrote {:?}", path);
    Ok(())
}

/// Reads `path`, `None` when it does not exist.
fn read_if_exists(path: &Path) -> Result<Option<String>, PersistenceError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PersistenceError::io(path, e)),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_write_atomically_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("file.json");

        write_atomically(&path, b"a much longer first version").unwrap();
        write_atomically(&path, b"short").unwrap();

        assert_eq!(Some("short".to_string()), read_if_exists(&path).unwrap());
    }

    #[test]
    fn test_read_if_exists_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(None, read_if_exists(&dir.path().join("missing")).unwrap());
    }
}
