use chrono::{DateTime, Utc};

use super::price::PriceSeries;

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct VestingEvent {
    pub vesting_date: DateTime<Utc>,
    pub shares_vested: f64,
}

impl VestingEvent {
    pub fn new(vesting_date: DateTime<Utc>, shares_vested: f64) -> VestingEvent {
        VestingEvent {
            vesting_date,
            shares_vested,
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct Equity {
    pub ticker: String,
    pub isin: Option<String>,
    pub name: Option<String>,
    pub currency: Option<String>,
    pub latest_price: Option<f64>,
    pub historical_prices: PriceSeries,
    pub vesting_events: Vec<VestingEvent>,
}

impl Equity {
    pub fn new(ticker: String) -> Equity {
        Equity {
            ticker,
            isin: None,
            name: None,
            currency: None,
            latest_price: None,
            historical_prices: PriceSeries::default(),
            vesting_events: Vec::new(),
        }
    }

    /// Name for display, falling back to the ticker.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.ticker)
    }

    /// Currency the prices are quoted in. Equities without one are treated
    /// as USD.
    pub fn currency_or_usd(&self) -> &str {
        self.currency.as_deref().unwrap_or(crate::fx::NUMERAIRE)
    }

    pub fn add_vesting_event(&mut self, event: VestingEvent) {
        self.vesting_events.push(event);
    }

    /// Removes every event vesting at `vesting_date`, returning how many were
    /// removed.
    pub fn remove_vesting_events_on(&mut self, vesting_date: DateTime<Utc>) -> usize {
        let before = self.vesting_events.len();
        self.vesting_events
            .retain(|event| event.vesting_date != vesting_date);
        before - self.vesting_events.len()
    }

    pub fn total_shares_vested(&self) -> f64 {
        self.vesting_events
            .iter()
            .map(|event| event.shares_vested)
            .sum()
    }

    /// Replaces the price history and the latest price wholesale.
    pub fn replace_prices(&mut self, latest_price: Option<f64>, historical_prices: PriceSeries) {
        self.latest_price = latest_price;
        self.historical_prices = historical_prices;
    }
}
