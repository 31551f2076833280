use std::path::Path;

use chrono::{DateTime, Utc};

use super::{csv_error, csv_writer};
use crate::error::PersistenceError;
use crate::fx::{convert, RateTable};
use crate::model::equity::Equity;
use crate::model::price::WINDOW_SIZE;

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPoint {
    pub date: DateTime<Utc>,
    pub price: f64,
    pub moving_average: Option<f64>,
}

/// Price history of one equity in `base_currency`, alongside its trailing
/// moving average.
pub struct PriceHistory {
    pub ticker: String,
    pub base_currency: String,
    pub points: Vec<HistoryPoint>,
}

impl PriceHistory {
    pub fn new(equity: &Equity, rates: &RateTable, base_currency: &str) -> PriceHistory {
        let currency = equity.currency_or_usd();
        let to_base = |amount: f64| convert(amount, rates, currency, base_currency);

        let points = equity
            .historical_prices
            .points()
            .iter()
            .zip(equity.historical_prices.rolling_mean(WINDOW_SIZE))
            .map(|(point, (_, moving_average))| HistoryPoint {
                date: point.timestamp,
                price: to_base(point.price),
                moving_average: moving_average.map(to_base),
            })
            .collect();

        PriceHistory {
            ticker: equity.ticker.clone(),
            base_currency: base_currency.to_string(),
            points,
        }
    }

    pub fn write_csv<W: std::io::Write>(&self, writer: &mut csv::Writer<W>) -> csv::Result<()> {
        writer.write_record([
            "Date".to_string(),
            "Ticker".to_string(),
            format!("Price ({})", self.base_currency),
            format!("Moving Average ({})", self.base_currency),
        ])?;

        for point in &self.points {
            writer.write_record([
                point.date.format("%Y-%m-%d").to_string(),
                self.ticker.clone(),
                format!("{:.4}", point.price),
                point
                    .moving_average
                    .map(|value| format!("{:.4}", value))
                    .unwrap_or_default(),
            ])?;
        }

        writer.flush()?;
        Ok(())
    }

    pub fn print_to_file(&self, destination: &Path) -> Result<(), PersistenceError> {
        let mut writer = csv_writer(destination)?;
        self.write_csv(&mut writer).map_err(csv_error(destination))
    }
}
