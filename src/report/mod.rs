use std::fs::File;
use std::path::Path;

use crate::error::PersistenceError;

pub mod history;
pub mod monthly;
pub mod schedule;

/// Two decimals with thousands separators, e.g. `1,234.50`.
pub fn format_currency(value: f64) -> String {
    let cents = (value * 100.0).round() as i64;
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();

    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    format!("{}{}.{:02}", sign, grouped, cents % 100)
}

/// Opens `path` for a CSV export.
fn csv_writer(path: &Path) -> Result<csv::Writer<File>, PersistenceError> {
    csv::Writer::from_path(path).map_err(csv_error(path))
}

fn csv_error(path: &Path) -> impl Fn(csv::Error) -> PersistenceError + '_ {
    move |e| PersistenceError::Csv {
        path: path.to_path_buf(),
        source: e,
    }
}
