use std::collections::BTreeMap;
use std::path::Path;

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

use super::naive_date_format;
use super::read_if_exists;
use crate::error::PersistenceError;
use crate::model::price::{PricePoint, PriceSeries};
use crate::provider::Quote;

#[derive(Debug, Deserialize)]
struct ClosePrice {
    #[serde(with = "naive_date_format")]
    date: NaiveDate,
    price: f64,
}

impl ClosePrice {
    pub fn to_model(&self) -> PricePoint {
        PricePoint::new(self.date.and_time(NaiveTime::MIN).and_utc(), self.price)
    }
}

/// Quote data for one ticker as kept in `<TICKER>.yaml`.
#[derive(Debug, Deserialize)]
pub struct QuoteFile {
    #[serde(default)]
    pub ticker: Option<String>,
    #[serde(default)]
    pub isin: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    prices: Vec<ClosePrice>,
}

impl QuoteFile {
    /// The latest price is the last close of the history.
    pub fn to_quote(&self, ticker: &str) -> Quote {
        let historical_prices =
            PriceSeries::new(self.prices.iter().map(|p| p.to_model()).collect());
        let latest_price = historical_prices.latest().ok().map(|point| point.price);

        Quote {
            ticker: self.ticker.clone().unwrap_or_else(|| ticker.to_string()),
            isin: self.isin.clone(),
            name: self.name.clone(),
            currency: self.currency.clone(),
            latest_price,
            historical_prices,
        }
    }
}

fn parse_yaml<T: serde::de::DeserializeOwned>(
    path: &Path,
    contents: &str,
) -> Result<T, PersistenceError> {
    serde_yaml::from_str(contents).map_err(|e| PersistenceError::Yaml {
        path: path.to_path_buf(),
        source: e,
    })
}

pub fn load_quote_file(path: &Path) -> Result<Option<QuoteFile>, PersistenceError> {
    match read_if_exists(path)? {
        Some(contents) => parse_yaml(path, &contents).map(Some),
        None => Ok(None),
    }
}

/// A flat mapping from currency code to rate versus USD.
pub fn load_rates_file(path: &Path) -> Result<Option<BTreeMap<String, f64>>, PersistenceError> {
    match read_if_exists(path)? {
        Some(contents) => parse_yaml(path, &contents).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use chrono::{TimeZone, Utc};

    use super::*;

    #[test]
    fn test_load_quote_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("WMT.yaml");
        fs::write(
            &path,
            "name: Walmart\n\
             currency: USD\n\
             prices:\n\
             - date: 2024-09-03\n  price: 151.0\n\
             - date: 2024-09-02\n  price: 149.5\n",
        )
        .unwrap();

        let quote = load_quote_file(&path).unwrap().unwrap().to_quote("WMT");
        assert_eq!("WMT", quote.ticker);
        assert_eq!(Some("Walmart".to_string()), quote.name);
        assert_eq!(Some(151.0), quote.latest_price);
        assert_eq!(
            Utc.with_ymd_and_hms(2024, 9, 2, 0, 0, 0).unwrap(),
            quote.historical_prices.points()[0].timestamp
        );
    }

    #[test]
    fn test_load_quote_file_rejects_bad_dates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("WMT.yaml");
        fs::write(&path, "prices:\n- date: 09/03/2024\n  price: 151.0\n").unwrap();

        assert!(matches!(
            load_quote_file(&path),
            Err(PersistenceError::Yaml { .. })
        ));
    }

    #[test]
    fn test_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let quotes = dir.path().join("NONE.yaml");
        let rates = dir.path().join("rates.yaml");
        assert!(load_quote_file(&quotes).unwrap().is_none());
        assert!(load_rates_file(&rates).unwrap().is_none());
    }
}
