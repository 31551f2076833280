use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dto::rates::RateCache;
use crate::error::PersistenceError;
use crate::provider::RateProvider;

/// Currency every rate is expressed against.
pub const NUMERAIRE: &str = "USD";

/// Currencies a report can be produced in.
pub const SUPPORTED_CURRENCIES: [&str; 14] = [
    "USD", "EUR", "GBP", "JPY", "AUD", "CAD", "CHF", "CNY", "NZD", "SGD", "HKD", "INR", "MXN",
    "ZAR",
];

pub fn is_supported(currency: &str) -> bool {
    SUPPORTED_CURRENCIES.contains(&currency)
}

/// Rates versus USD, keyed by currency code. USD is always present at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct RateTable {
    rates: BTreeMap<String, f64>,
}

impl RateTable {
    pub fn new(mut rates: BTreeMap<String, f64>) -> RateTable {
        rates.insert(NUMERAIRE.to_string(), 1.0);
        RateTable { rates }
    }

    pub fn rates(&self) -> &BTreeMap<String, f64> {
        &self.rates
    }

    pub fn rate(&self, currency: &str) -> Option<f64> {
        if currency == NUMERAIRE {
            return Some(1.0);
        }

        self.rates
            .get(currency)
            .copied()
            .filter(|rate| rate.is_finite() && *rate > 0.0)
    }

    /// Missing rates count as 1 so conversion never fails.
    fn rate_or_one(&self, currency: &str) -> f64 {
        self.rate(currency).unwrap_or_else(|| {
            log::debug!("No exchange rate for {}, using 1", currency);
            1.0
        })
    }

    pub fn convert(&self, amount: f64, from_currency: &str, to_currency: &str) -> f64 {
        if from_currency == to_currency {
            amount
        } else if to_currency == NUMERAIRE {
            amount / self.rate_or_one(from_currency)
        } else if from_currency == NUMERAIRE {
            amount * self.rate_or_one(to_currency)
        } else {
            (amount / self.rate_or_one(from_currency)) * self.rate_or_one(to_currency)
        }
    }
}

impl Default for RateTable {
    fn default() -> Self {
        RateTable::new(BTreeMap::new())
    }
}

impl From<BTreeMap<String, f64>> for RateTable {
    fn from(rates: BTreeMap<String, f64>) -> Self {
        RateTable::new(rates)
    }
}

impl From<RateTable> for BTreeMap<String, f64> {
    fn from(table: RateTable) -> Self {
        table.rates
    }
}

pub fn convert(amount: f64, rates: &RateTable, from_currency: &str, to_currency: &str) -> f64 {
    rates.convert(amount, from_currency, to_currency)
}

/// Returns the rate table for `today`. A cached table for the day is returned
/// as-is; otherwise each non-USD currency is fetched from the provider,
/// failures are logged and left out, and the result is cached.
pub fn fetch_rates<'a>(
    cache: &RateCache,
    provider: &dyn RateProvider,
    currencies: impl IntoIterator<Item = &'a str>,
    today: NaiveDate,
) -> Result<RateTable, PersistenceError> {
    if let Some(table) = cache.load(today)? {
        log::info!("Using cached exchange rates for {}", today);
        return Ok(table);
    }

    let mut rates = BTreeMap::new();
    for currency in currencies {
        if currency == NUMERAIRE || rates.contains_key(currency) {
            continue;
        }

        match provider.latest_rate(currency) {
            Ok(rate) => {
                rates.insert(currency.to_string(), rate);
            }
            Err(e) => {
                log::warn!("Error fetching exchange rate for {}: {}", currency, e);
            }
        }
    }

    let table = RateTable::new(rates);
    cache.store(today, &table)?;
    Ok(table)
}
