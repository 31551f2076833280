use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use super::{read_if_exists, write_atomically};
use crate::error::PersistenceError;
use crate::fx::RateTable;

/// One JSON file of rates versus USD per calendar day.
pub struct RateCache {
    dir: PathBuf,
}

impl RateCache {
    pub fn new(dir: &Path) -> RateCache {
        RateCache {
            dir: dir.to_path_buf(),
        }
    }

    pub fn in_data_dir(data_dir: &Path) -> RateCache {
        RateCache::new(&data_dir.join("exchange_rates"))
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.json", date.format("%Y-%m-%d")))
    }

    pub fn load(&self, date: NaiveDate) -> Result<Option<RateTable>, PersistenceError> {
        let path = self.path_for(date);
        let Some(contents) = read_if_exists(&path)? else {
            return Ok(None);
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| PersistenceError::json(&path, e))
    }

    pub fn store(&self, date: NaiveDate, table: &RateTable) -> Result<(), PersistenceError> {
        let path = self.path_for(date);
        let contents =
            serde_json::to_string(table).map_err(|e| PersistenceError::json(&path, e))?;
        write_atomically(&path, contents.as_bytes())
    }
}
