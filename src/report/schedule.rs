use std::path::Path;

use chrono::{DateTime, Utc};

use super::monthly::{daily_payouts, monthly_payouts, DailyPayout, MonthlyPayout};
use super::{csv_error, csv_writer, format_currency};
use crate::error::PersistenceError;
use crate::fx::{convert, RateTable};
use crate::model::portfolio::Portfolio;
use crate::valuation::{value_of, PricingMethod};

#[derive(Debug, Clone, PartialEq)]
pub struct PayoutRow {
    pub equity_name: String,
    pub ticker: String,
    pub vesting_date: DateTime<Utc>,
    pub shares_vested: f64,
    /// Value in the report's base currency.
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportOptions {
    pub method: PricingMethod,
    pub base_currency: String,
    /// Percentage taken off every payout, 0 to 100.
    pub discount_percent: f64,
}

impl ReportOptions {
    pub fn new(method: PricingMethod, base_currency: &str) -> ReportOptions {
        ReportOptions {
            method,
            base_currency: base_currency.to_string(),
            discount_percent: 0.0,
        }
    }

    fn discount_factor(&self) -> f64 {
        1.0 - self.discount_percent.clamp(0.0, 100.0) / 100.0
    }
}

/// Every valued vesting event of a portfolio in one base currency, with the
/// daily and monthly aggregations. Events without a value are left out.
#[derive(Debug, Clone, PartialEq)]
pub struct PayoutSchedule {
    pub portfolio_name: String,
    pub method: PricingMethod,
    pub base_currency: String,
    pub rows: Vec<PayoutRow>,
    pub daily: Vec<DailyPayout>,
    pub monthly: Vec<MonthlyPayout>,
    /// `None` when no event could be valued.
    pub total: Option<f64>,
}

impl PayoutSchedule {
    pub fn new(
        portfolio: &Portfolio,
        rates: &RateTable,
        options: &ReportOptions,
    ) -> PayoutSchedule {
        let discount_factor = options.discount_factor();

        let mut rows: Vec<PayoutRow> = Vec::new();
        for equity in portfolio.equities.values() {
            for event in &equity.vesting_events {
                let Some(native) = value_of(equity, event, options.method) else {
                    log::debug!(
                        "No {} value for {} vesting on {}",
                        options.method,
                        equity.ticker,
                        event.vesting_date
                    );
                    continue;
                };

                let value = convert(
                    native,
                    rates,
                    equity.currency_or_usd(),
                    &options.base_currency,
                ) * discount_factor;

                rows.push(PayoutRow {
                    equity_name: equity.display_name().to_string(),
                    ticker: equity.ticker.clone(),
                    vesting_date: event.vesting_date,
                    shares_vested: event.shares_vested,
                    value,
                });
            }
        }

        rows.sort_by(|a, b| a.vesting_date.cmp(&b.vesting_date));

        let total = if rows.is_empty() {
            None
        } else {
            Some(rows.iter().map(|row| row.value).sum())
        };

        PayoutSchedule {
            portfolio_name: portfolio.name.clone(),
            method: options.method,
            base_currency: options.base_currency.clone(),
            daily: daily_payouts(&rows),
            monthly: monthly_payouts(&rows),
            rows,
            total,
        }
    }

    pub fn summary(&self) -> String {
        let total = match self.total {
            Some(total) => format!("{} {}", format_currency(total), self.base_currency),
            None => "unavailable".to_string(),
        };

        format!(
            "Total portfolio value using '{}' method in {}: {}",
            self.method, self.base_currency, total
        )
    }

    pub fn write_csv<W: std::io::Write>(&self, writer: &mut csv::Writer<W>) -> csv::Result<()> {
        writer.write_record([
            "Equity".to_string(),
            "Ticker".to_string(),
            "Vesting Date".to_string(),
            "Shares Vested".to_string(),
            format!("Value ({})", self.base_currency),
        ])?;

        for row in &self.rows {
            writer.write_record([
                row.equity_name.clone(),
                row.ticker.clone(),
                row.vesting_date.format("%Y-%m-%d %H:%M:%S").to_string(),
                row.shares_vested.to_string(),
                format!("{:.2}", row.value),
            ])?;
        }

        writer.flush()?;
        Ok(())
    }

    pub fn write_monthly_csv<W: std::io::Write>(
        &self,
        writer: &mut csv::Writer<W>,
    ) -> csv::Result<()> {
        writer.write_record([
            "Month".to_string(),
            format!("Value ({})", self.base_currency),
            format!("Cumulative Payout ({})", self.base_currency),
        ])?;

        for month in &self.monthly {
            writer.write_record([
                month.month.to_string(),
                format!("{:.2}", month.amount),
                format!("{:.2}", month.cumulative),
            ])?;
        }

        writer.flush()?;
        Ok(())
    }

    pub fn print_to_file(&self, destination: &Path) -> Result<(), PersistenceError> {
        let mut writer = csv_writer(destination)?;
        self.write_csv(&mut writer).map_err(csv_error(destination))
    }

    pub fn print_monthly_to_file(&self, destination: &Path) -> Result<(), PersistenceError> {
        let mut writer = csv_writer(destination)?;
        self.write_monthly_csv(&mut writer)
            .map_err(csv_error(destination))
    }
}
