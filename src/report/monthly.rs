use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, Utc};

use super::schedule::PayoutRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Month {
    pub year: i32,
    pub month: u32,
}

impl Month {
    pub fn of(date: &DateTime<Utc>) -> Month {
        Month {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyPayout {
    pub date: DateTime<Utc>,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyPayout {
    pub month: Month,
    pub amount: f64,
    pub cumulative: f64,
}

/// Amount paid per exact vesting date, in date order.
pub fn daily_payouts(rows: &[PayoutRow]) -> Vec<DailyPayout> {
    let mut by_date: BTreeMap<DateTime<Utc>, f64> = BTreeMap::new();
    for row in rows {
        *by_date.entry(row.vesting_date).or_default() += row.value;
    }

    by_date
        .into_iter()
        .map(|(date, amount)| DailyPayout { date, amount })
        .collect()
}

/// Amount paid per calendar month with the running total, in month order.
pub fn monthly_payouts(rows: &[PayoutRow]) -> Vec<MonthlyPayout> {
    let mut by_month: BTreeMap<Month, f64> = BTreeMap::new();
    for row in rows {
        *by_month.entry(Month::of(&row.vesting_date)).or_default() += row.value;
    }

    let mut cumulative = 0.0;
    by_month
        .into_iter()
        .map(|(month, amount)| {
            cumulative += amount;
            MonthlyPayout {
                month,
                amount,
                cumulative,
            }
        })
        .collect()
}
