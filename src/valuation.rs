use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::equity::{Equity, VestingEvent};
use crate::model::portfolio::Portfolio;
use crate::model::price::WINDOW_SIZE;

/// How the per-share price of a vesting event is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingMethod {
    /// Current market value: the latest known price.
    Latest,
    /// Smoothed recent value: mean of the last 180 observations.
    Average,
    /// Value at vesting: the 180-observation moving average just before the
    /// vesting date.
    #[serde(alias = "moving-average")]
    MovingAverage,
}

impl PricingMethod {
    pub fn name(&self) -> &'static str {
        match self {
            PricingMethod::Latest => "latest",
            PricingMethod::Average => "average",
            PricingMethod::MovingAverage => "moving_average",
        }
    }

    /// Per-share price used for `event`, in the equity's native currency.
    fn price_for(&self, equity: &Equity, event: &VestingEvent) -> Option<f64> {
        match self {
            PricingMethod::Latest => equity.latest_price.filter(|price| *price > 0.0),
            PricingMethod::Average => equity.historical_prices.trailing_average(WINDOW_SIZE).ok(),
            PricingMethod::MovingAverage => equity
                .historical_prices
                .moving_average_at(event.vesting_date, WINDOW_SIZE),
        }
    }
}

impl fmt::Display for PricingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for PricingMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "latest" => Ok(PricingMethod::Latest),
            "average" => Ok(PricingMethod::Average),
            "moving_average" | "moving-average" => Ok(PricingMethod::MovingAverage),
            _ => Err(ConfigError::UnknownMethod(s.to_string())),
        }
    }
}

/// Value of one vesting event in the equity's native currency, `None` when
/// the method has no price to offer.
pub fn value_of(equity: &Equity, event: &VestingEvent, method: PricingMethod) -> Option<f64> {
    method
        .price_for(equity, event)
        .map(|price| event.shares_vested * price)
}

/// Sum of every available event value in the portfolio, in native
/// currencies. `None` when no event produced a value at all.
pub fn value_portfolio(portfolio: &Portfolio, method: PricingMethod) -> Option<f64> {
    portfolio
        .equities
        .values()
        .flat_map(|equity| {
            equity
                .vesting_events
                .iter()
                .filter_map(move |event| value_of(equity, event, method))
        })
        .fold(None, |total, value| Some(total.unwrap_or(0.0) + value))
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::*;
    use crate::model::price::{PricePoint, PriceSeries};

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    fn equity_with_history(days: i64, price: impl Fn(i64) -> f64) -> Equity {
        let mut equity = Equity::new("WMT".to_string());
        let points = (0..days)
            .map(|n| PricePoint::new(day(n), price(n)))
            .collect();
        equity.historical_prices = PriceSeries::new(points);
        equity.latest_price = equity.historical_prices.latest().ok().map(|p| p.price);
        equity
    }

    #[test]
    fn test_parse_method() {
        assert_eq!(PricingMethod::Latest, "latest".parse().unwrap());
        assert_eq!(PricingMethod::Average, "Average".parse().unwrap());
        assert_eq!(
            PricingMethod::MovingAverage,
            "moving_average".parse().unwrap()
        );
        assert_eq!(
            PricingMethod::MovingAverage,
            "moving-average".parse().unwrap()
        );
        assert!("median".parse::<PricingMethod>().is_err());
        assert_eq!("moving_average", PricingMethod::MovingAverage.to_string());
    }

    #[test]
    fn test_latest() {
        let mut equity = Equity::new("WMT".to_string());
        let event = VestingEvent::new(day(0), 10.0);

        assert_eq!(None, value_of(&equity, &event, PricingMethod::Latest));

        equity.latest_price = Some(150.0);
        assert_eq!(
            Some(1500.0),
            value_of(&equity, &event, PricingMethod::Latest)
        );
    }

    #[test]
    fn test_average() {
        let event = VestingEvent::new(day(0), 2.0);

        let equity = equity_with_history(200, |n| if n < 20 { 1000.0 } else { 10.0 });
        assert_relative_eq!(
            20.0,
            value_of(&equity, &event, PricingMethod::Average).unwrap()
        );

        let empty = Equity::new("WMT".to_string());
        assert_eq!(None, value_of(&empty, &event, PricingMethod::Average));
    }

    #[test]
    fn test_moving_average() {
        let equity = equity_with_history(400, |n| n as f64);

        // Window covers days 120..=299
        let event = VestingEvent::new(day(300), 1.0);
        assert_relative_eq!(
            209.5,
            value_of(&equity, &event, PricingMethod::MovingAverage).unwrap()
        );

        let early = VestingEvent::new(day(100), 1.0);
        assert_eq!(
            None,
            value_of(&equity, &early, PricingMethod::MovingAverage)
        );
    }

    #[test]
    fn test_zero_shares_is_a_value() {
        let mut equity = Equity::new("WMT".to_string());
        equity.latest_price = Some(150.0);
        let event = VestingEvent::new(day(0), 0.0);

        assert_eq!(Some(0.0), value_of(&equity, &event, PricingMethod::Latest));
    }

    #[test]
    fn test_value_portfolio_skips_unavailable() {
        let mut portfolio = Portfolio::new("Jane".to_string());

        let mut priced = Equity::new("WMT".to_string());
        priced.latest_price = Some(150.0);
        priced.add_vesting_event(VestingEvent::new(day(0), 10.0));
        priced.add_vesting_event(VestingEvent::new(day(30), 5.0));

        let mut unpriced = Equity::new("AAPL".to_string());
        unpriced.add_vesting_event(VestingEvent::new(day(0), 100.0));

        portfolio.equities.insert(priced.ticker.clone(), priced);
        portfolio.equities.insert(unpriced.ticker.clone(), unpriced);

        assert_eq!(
            Some(2250.0),
            value_portfolio(&portfolio, PricingMethod::Latest)
        );
    }

    #[test]
    fn test_value_portfolio_unavailable_without_contributions() {
        let mut portfolio = Portfolio::new("Jane".to_string());
        assert_eq!(None, value_portfolio(&portfolio, PricingMethod::Latest));

        let mut equity = Equity::new("WMT".to_string());
        equity.add_vesting_event(VestingEvent::new(day(0), 10.0));
        portfolio.equities.insert(equity.ticker.clone(), equity);
        assert_eq!(None, value_portfolio(&portfolio, PricingMethod::Average));
    }
}
