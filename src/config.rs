use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::fx;
use crate::valuation::PricingMethod;

pub const DEFAULT_CONFIG_PATH: &str = "forfeitcalc.yaml";

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    quotes_dir: Option<PathBuf>,
    rates_file: Option<PathBuf>,
    base_currency: Option<String>,
    method: Option<PricingMethod>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Holds `portfolios.json` and the daily exchange rate cache
    pub data_dir: PathBuf,
    pub quotes_dir: PathBuf,
    pub rates_file: PathBuf,
    pub base_currency: String,
    pub method: PricingMethod,
}

impl Config {
    /// Loads the config at `path`. A missing file gives the defaults unless
    /// `required` is set.
    pub fn load(path: &Path, required: bool) -> Result<Config, ConfigError> {
        let file = match fs::read_to_string(path) {
            Ok(contents) => parse(path, &contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !required => {
                log::debug!("No config at {:?}, using defaults", path);
                ConfigFile::default()
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        Config::from_file(file)
    }

    fn from_file(file: ConfigFile) -> Result<Config, ConfigError> {
        let data_dir = file.data_dir.unwrap_or_else(|| PathBuf::from("data"));
        let base_currency = file
            .base_currency
            .map(|currency| currency.to_uppercase())
            .unwrap_or_else(|| fx::NUMERAIRE.to_string());

        if !fx::is_supported(&base_currency) {
            return Err(ConfigError::UnsupportedCurrency(base_currency));
        }

        Ok(Config {
            quotes_dir: file.quotes_dir.unwrap_or_else(|| data_dir.join("quotes")),
            rates_file: file
                .rates_file
                .unwrap_or_else(|| data_dir.join("rates.yaml")),
            data_dir,
            base_currency,
            method: file.method.unwrap_or(PricingMethod::Latest),
        })
    }
}

fn parse(path: &Path, contents: &str) -> Result<ConfigFile, ConfigError> {
    // An empty document deserializes as unit, not as a map
    if contents.trim().is_empty() {
        return Ok(ConfigFile::default());
    }

    serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join(DEFAULT_CONFIG_PATH), false).unwrap();

        assert_eq!(PathBuf::from("data"), config.data_dir);
        assert_eq!(PathBuf::from("data/quotes"), config.quotes_dir);
        assert_eq!(PathBuf::from("data/rates.yaml"), config.rates_file);
        assert_eq!("USD", config.base_currency);
        assert_eq!(PricingMethod::Latest, config.method);
    }

    #[test]
    fn test_missing_required_config() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load(&dir.path().join("other.yaml"), true),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_load_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_PATH);
        fs::write(
            &path,
            "data_dir: /srv/forfeit\nbase_currency: eur\nmethod: moving_average\n",
        )
        .unwrap();

        let config = Config::load(&path, true).unwrap();
        assert_eq!(PathBuf::from("/srv/forfeit/quotes"), config.quotes_dir);
        assert_eq!("EUR", config.base_currency);
        assert_eq!(PricingMethod::MovingAverage, config.method);
    }

    #[test]
    fn test_rejects_bad_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_PATH);

        fs::write(&path, "base_currency: XYZ\n").unwrap();
        assert!(matches!(
            Config::load(&path, true),
            Err(ConfigError::UnsupportedCurrency(_))
        ));

        fs::write(&path, "colour: blue\n").unwrap();
        assert!(matches!(
            Config::load(&path, true),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_CONFIG_PATH);
        fs::write(&path, "\n").unwrap();

        assert_eq!("USD", Config::load(&path, true).unwrap().base_currency);
    }
}
