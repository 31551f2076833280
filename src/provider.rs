use std::fs;
use std::path::{Path, PathBuf};

use crate::dto::quotes::{load_quote_file, load_rates_file};
use crate::error::{PersistenceError, ProviderError};
use crate::model::equity::Equity;
use crate::model::price::PriceSeries;

/// Identity and prices of one equity as returned by a quote provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub ticker: String,
    pub isin: Option<String>,
    pub name: Option<String>,
    pub currency: Option<String>,
    pub latest_price: Option<f64>,
    pub historical_prices: PriceSeries,
}

impl Quote {
    /// A new equity with no vesting events yet.
    pub fn into_equity(self) -> Equity {
        Equity {
            ticker: self.ticker,
            isin: self.isin,
            name: self.name,
            currency: self.currency,
            latest_price: self.latest_price,
            historical_prices: self.historical_prices,
            vesting_events: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub label: String,
    pub ticker: String,
}

pub trait QuoteProvider {
    fn quote(&self, ticker: &str) -> Result<Quote, ProviderError>;

    /// Candidates ranked best first. No match is an empty list.
    fn search(&self, term: &str) -> Result<Vec<SearchHit>, ProviderError>;
}

pub trait RateProvider {
    /// Latest rate of `currency` versus USD.
    fn latest_rate(&self, currency: &str) -> Result<f64, ProviderError>;
}

/// Quotes kept as one `<TICKER>.yaml` file per equity in a directory.
pub struct YamlQuoteProvider {
    dir: PathBuf,
}

impl YamlQuoteProvider {
    pub fn new(dir: PathBuf) -> YamlQuoteProvider {
        YamlQuoteProvider { dir }
    }

    fn tickers(&self) -> Result<Vec<String>, ProviderError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PersistenceError::io(&self.dir, e).into()),
        };

        let mut tickers = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| PersistenceError::io(&self.dir, e))?
                .path();
            if path.extension().is_some_and(|ext| ext == "yaml") {
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    tickers.push(stem.to_string());
                }
            }
        }
        tickers.sort();
        Ok(tickers)
    }
}

fn search_rank(term: &str, ticker: &str, name: &str) -> Option<u8> {
    let term = term.to_lowercase();
    let ticker = ticker.to_lowercase();

    if ticker == term {
        Some(0)
    } else if ticker.starts_with(&term) {
        Some(1)
    } else if ticker.contains(&term) || name.to_lowercase().contains(&term) {
        Some(2)
    } else {
        None
    }
}

impl QuoteProvider for YamlQuoteProvider {
    fn quote(&self, ticker: &str) -> Result<Quote, ProviderError> {
        let path = self.dir.join(format!("{}.yaml", ticker));
        match load_quote_file(&path)? {
            Some(file) => Ok(file.to_quote(ticker)),
            None => Err(ProviderError::UnknownTicker(ticker.to_string())),
        }
    }

    fn search(&self, term: &str) -> Result<Vec<SearchHit>, ProviderError> {
        let term = term.trim();
        if term.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits = Vec::new();
        for ticker in self.tickers()? {
            let quote = match self.quote(&ticker) {
                Ok(quote) => quote,
                Err(e) => {
                    log::warn!("Error {} with search for {}", e, ticker);
                    continue;
                }
            };

            let name = quote.name.as_deref().unwrap_or(&quote.ticker);
            if let Some(rank) = search_rank(term, &quote.ticker, name) {
                hits.push((
                    rank,
                    SearchHit {
                        label: format!("{} ({})", name, quote.ticker),
                        ticker: quote.ticker.clone(),
                    },
                ));
            }
        }

        hits.sort_by(|(a, a_hit), (b, b_hit)| {
            a.cmp(b).then_with(|| a_hit.ticker.cmp(&b_hit.ticker))
        });
        Ok(hits.into_iter().map(|(_, hit)| hit).collect())
    }
}

/// Rates versus USD kept as a flat YAML mapping. The file is read on every
/// lookup so one unreadable lookup does not affect the others.
pub struct YamlRateProvider {
    path: PathBuf,
}

impl YamlRateProvider {
    pub fn new(path: PathBuf) -> YamlRateProvider {
        YamlRateProvider { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RateProvider for YamlRateProvider {
    fn latest_rate(&self, currency: &str) -> Result<f64, ProviderError> {
        let rates = load_rates_file(&self.path)?.unwrap_or_default();
        let rate = rates
            .get(currency)
            .copied()
            .ok_or_else(|| ProviderError::UnknownCurrency(currency.to_string()))?;

        if !rate.is_finite() || rate <= 0.0 {
            return Err(ProviderError::InvalidRate {
                currency: currency.to_string(),
                rate,
            });
        }

        Ok(rate)
    }
}
