use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{read_if_exists, write_atomically};
use crate::error::PersistenceError;
use crate::model;
use crate::model::portfolio::PortfolioDraft;
use crate::model::price::{PricePoint, PriceSeries};

const PORTFOLIOS_FILE: &str = "portfolios.json";

#[derive(Debug, Serialize, Deserialize)]
struct VestingEvent {
    #[serde(with = "chrono::serde::ts_seconds")]
    vesting_date: DateTime<Utc>,
    shares_vested: f64,
}

impl VestingEvent {
    fn to_model(&self) -> Result<model::equity::VestingEvent, String> {
        if !self.shares_vested.is_finite() || self.shares_vested < 0.0 {
            return Err(format!(
                "{} shares vesting on {}",
                self.shares_vested, self.vesting_date
            ));
        }

        Ok(model::equity::VestingEvent::new(self.vesting_date, self.shares_vested))
    }

    fn from_model(event: &model::equity::VestingEvent) -> VestingEvent {
        VestingEvent {
            vesting_date: event.vesting_date,
            shares_vested: event.shares_vested,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Equity {
    #[serde(default)]
    isin: Option<String>,
    ticker: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    latest_price: Option<f64>,
    /// Close prices keyed by epoch seconds
    #[serde(default)]
    historical_prices: BTreeMap<i64, f64>,
    #[serde(default)]
    vesting_events: Vec<VestingEvent>,
}

impl Equity {
    fn to_model(&self) -> Result<model::equity::Equity, String> {
        let points = self
            .historical_prices
            .iter()
            .map(|(seconds, price)| match DateTime::from_timestamp(*seconds, 0) {
                Some(timestamp) => Ok(PricePoint::new(timestamp, *price)),
                None => Err(format!("{} has a price at timestamp {}", self.ticker, seconds)),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let vesting_events = self
            .vesting_events
            .iter()
            .map(VestingEvent::to_model)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|reason| format!("{} has {}", self.ticker, reason))?;

        Ok(model::equity::Equity {
            ticker: self.ticker.clone(),
            isin: self.isin.clone(),
            name: self.name.clone(),
            currency: self.currency.clone(),
            latest_price: self.latest_price,
            historical_prices: PriceSeries::new(points),
            vesting_events,
        })
    }

    fn from_model(equity: &model::equity::Equity) -> Equity {
        Equity {
            isin: equity.isin.clone(),
            ticker: equity.ticker.clone(),
            name: equity.name.clone(),
            currency: equity.currency.clone(),
            latest_price: equity.latest_price,
            historical_prices: equity
                .historical_prices
                .points()
                .iter()
                .map(|point| (point.timestamp.timestamp(), point.price))
                .collect(),
            vesting_events: equity
                .vesting_events
                .iter()
                .map(VestingEvent::from_model)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Portfolio {
    name: String,
    #[serde(default)]
    equities: BTreeMap<String, Equity>,
}

impl Portfolio {
    fn to_model(&self, key: &str) -> Result<model::portfolio::Portfolio, String> {
        if self.name != key {
            return Err(format!("portfolio {:?} is stored under {:?}", self.name, key));
        }

        let mut portfolio = model::portfolio::Portfolio::new(self.name.clone());
        for (ticker, equity) in &self.equities {
            if equity.ticker != *ticker {
                return Err(format!(
                    "equity {} is stored under {} in {}",
                    equity.ticker, ticker, self.name
                ));
            }
            let equity = equity.to_model()?;
            portfolio.equities.insert(ticker.clone(), equity);
        }
        Ok(portfolio)
    }

    fn from_model(portfolio: &model::portfolio::Portfolio) -> Portfolio {
        Portfolio {
            name: portfolio.name.clone(),
            equities: portfolio
                .equities
                .iter()
                .map(|(ticker, equity)| (ticker.clone(), Equity::from_model(equity)))
                .collect(),
        }
    }
}

/// The collection of named portfolios, persisted as one JSON file that is
/// replaced whole on every save.
pub struct PortfolioStore {
    path: PathBuf,
}

impl PortfolioStore {
    pub fn new(path: PathBuf) -> PortfolioStore {
        PortfolioStore { path }
    }

    pub fn in_dir(data_dir: &Path) -> PortfolioStore {
        PortfolioStore::new(data_dir.join(PORTFOLIOS_FILE))
    }

    pub fn load_all(
        &self,
    ) -> Result<BTreeMap<String, model::portfolio::Portfolio>, PersistenceError> {
        let Some(contents) = read_if_exists(&self.path)? else {
            return Ok(BTreeMap::new());
        };

        let portfolios: BTreeMap<String, Portfolio> =
            serde_json::from_str(&contents).map_err(|e| PersistenceError::json(&self.path, e))?;

        portfolios
            .iter()
            .map(|(name, portfolio)| {
                portfolio
                    .to_model(name)
                    .map(|portfolio| (name.clone(), portfolio))
                    .map_err(|reason| PersistenceError::invalid(&self.path, reason))
            })
            .collect()
    }

    pub fn save_all(
        &self,
        portfolios: &BTreeMap<String, model::portfolio::Portfolio>,
    ) -> Result<(), PersistenceError> {
        let portfolios: BTreeMap<&String, Portfolio> = portfolios
            .iter()
            .map(|(name, portfolio)| (name, Portfolio::from_model(portfolio)))
            .collect();

        let contents = serde_json::to_string_pretty(&portfolios)
            .map_err(|e| PersistenceError::json(&self.path, e))?;
        write_atomically(&self.path, contents.as_bytes())
    }

    pub fn names(&self) -> Result<Vec<String>, PersistenceError> {
        Ok(self.load_all()?.into_keys().collect())
    }

    pub fn load(
        &self,
        name: &str,
    ) -> Result<Option<model::portfolio::Portfolio>, PersistenceError> {
        Ok(self.load_all()?.remove(name))
    }

    /// Opens the named portfolio for editing, or starts a new one when no
    /// portfolio has that name.
    pub fn open_draft(&self, name: &str) -> Result<PortfolioDraft, PersistenceError> {
        Ok(match self.load(name)? {
            Some(portfolio) => PortfolioDraft::editing(portfolio),
            None => PortfolioDraft::new(name.to_string()),
        })
    }

    pub fn commit(&self, draft: PortfolioDraft) -> Result<(), PersistenceError> {
        let mut portfolios = self.load_all()?;
        let portfolio = draft.into_portfolio();
        portfolios.insert(portfolio.name.clone(), portfolio);
        self.save_all(&portfolios)
    }

    /// Returns whether a portfolio was deleted.
    pub fn delete(&self, name: &str) -> Result<bool, PersistenceError> {
        let mut portfolios = self.load_all()?;
        if portfolios.remove(name).is_none() {
            return Ok(false);
        }

        self.save_all(&portfolios)?;
        Ok(true)
    }
}
