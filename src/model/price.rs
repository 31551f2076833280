use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::PriceError;

/// Number of observations in the trailing windows used for pricing. Counts
/// entries in the series, not calendar days.
pub const WINDOW_SIZE: usize = 180;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

impl PricePoint {
    pub fn new(timestamp: DateTime<Utc>, price: f64) -> PricePoint {
        PricePoint { timestamp, price }
    }
}

/// Closing prices of one equity in its native currency, sorted ascending by
/// timestamp with unique timestamps and strictly positive prices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(points: Vec<PricePoint>) -> PriceSeries {
        // Later duplicates replace earlier ones
        let mut by_time: BTreeMap<DateTime<Utc>, f64> = BTreeMap::new();
        for point in points {
            if point.price.is_finite() && point.price > 0.0 {
                by_time.insert(point.timestamp, point.price);
            } else {
                log::warn!(
                    "Dropping invalid price {} at {}",
                    point.price,
                    point.timestamp
                );
            }
        }

        let points = by_time
            .into_iter()
            .map(|(timestamp, price)| PricePoint::new(timestamp, price))
            .collect();

        PriceSeries { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn latest(&self) -> Result<&PricePoint, PriceError> {
        self.points.last().ok_or(PriceError::NoPriceData)
    }

    /// Mean of the last `window` prices, or of all of them when the series is
    /// shorter than the window.
    pub fn trailing_average(&self, window: usize) -> Result<f64, PriceError> {
        if self.points.is_empty() {
            return Err(PriceError::NoPriceData);
        }

        let start = self.points.len().saturating_sub(window.max(1));
        Ok(mean(&self.points[start..]))
    }

    /// The trailing `window`-observation mean at every point of the series.
    /// `None` until enough observations have accumulated.
    pub fn rolling_mean(&self, window: usize) -> Vec<(DateTime<Utc>, Option<f64>)> {
        let window = window.max(1);
        let mut sum = 0.0;

        self.points
            .iter()
            .enumerate()
            .map(|(i, point)| {
                sum += point.price;
                if i >= window {
                    sum -= self.points[i - window].price;
                }

                let value = if i + 1 >= window {
                    Some(sum / window as f64)
                } else {
                    None
                };
                (point.timestamp, value)
            })
            .collect()
    }

    /// The trailing `window`-observation mean evaluated at the last point
    /// strictly before `date`. `None` when there is no such point or when it
    /// has fewer than `window` observations at or before it.
    pub fn moving_average_at(&self, date: DateTime<Utc>, window: usize) -> Option<f64> {
        let window = window.max(1);

        // Number of points strictly before `date`
        let qualifying = self.points.partition_point(|point| point.timestamp < date);
        if qualifying == 0 || qualifying < window {
            return None;
        }

        Some(mean(&self.points[qualifying - window..qualifying]))
    }

    /// Absolute and percentage change between the two most recent prices.
    pub fn daily_change(&self) -> Option<(f64, f64)> {
        match self.points.as_slice() {
            [.., previous, last] => {
                let change = last.price - previous.price;
                Some((change, change / previous.price * 100.0))
            }
            _ => None,
        }
    }
}

fn mean(points: &[PricePoint]) -> f64 {
    let total: f64 = points.iter().map(|point| point.price).sum();
    total / points.len() as f64
}

#[cfg(test)]
mod test {
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};

    use super::*;

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    fn series(prices: &[f64]) -> PriceSeries {
        PriceSeries::new(
            prices
                .iter()
                .enumerate()
                .map(|(i, price)| PricePoint::new(day(i as i64), *price))
                .collect(),
        )
    }

    #[test]
    fn test_new_sorts_and_drops_invalid_prices() {
        let series = PriceSeries::new(vec![
            PricePoint::new(day(2), 12.0),
            PricePoint::new(day(0), 10.0),
            PricePoint::new(day(1), 0.0),
            PricePoint::new(day(3), -1.0),
            PricePoint::new(day(4), f64::NAN),
        ]);

        let timestamps: Vec<_> = series.points().iter().map(|p| p.timestamp).collect();
        assert_eq!(vec![day(0), day(2)], timestamps);
    }

    #[test]
    fn test_new_keeps_one_point_per_timestamp() {
        let series = PriceSeries::new(vec![
            PricePoint::new(day(0), 10.0),
            PricePoint::new(day(0), 11.0),
        ]);

        assert_eq!(1, series.len());
        assert_eq!(11.0, series.latest().unwrap().price);
    }

    #[test]
    fn test_latest() {
        assert_eq!(
            Err(PriceError::NoPriceData),
            PriceSeries::default().latest()
        );
        assert_eq!(3.0, series(&[1.0, 2.0, 3.0]).latest().unwrap().price);
    }

    #[test]
    fn test_trailing_average_uses_all_points_when_short() {
        let series = series(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        assert_relative_eq!(30.0, series.trailing_average(WINDOW_SIZE).unwrap());
    }

    #[test]
    fn test_trailing_average_uses_last_window_points() {
        let series = series(&[100.0, 1.0, 2.0, 3.0]);
        assert_relative_eq!(2.0, series.trailing_average(3).unwrap());
    }

    #[test]
    fn test_trailing_average_empty() {
        assert_eq!(
            Err(PriceError::NoPriceData),
            PriceSeries::default().trailing_average(WINDOW_SIZE)
        );
    }

    #[test]
    fn test_rolling_mean() {
        let rolling = series(&[1.0, 2.0, 3.0, 4.0]).rolling_mean(2);
        let values: Vec<_> = rolling.into_iter().map(|(_, value)| value).collect();
        assert_eq!(vec![None, Some(1.5), Some(2.5), Some(3.5)], values);
    }

    #[test]
    fn test_moving_average_at_uses_points_strictly_before_date() {
        let series = series(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        // Day 4 is excluded, evaluation point is day 3
        assert_relative_eq!(3.0, series.moving_average_at(day(4), 3).unwrap());
        assert_relative_eq!(4.0, series.moving_average_at(day(30), 3).unwrap());
    }

    #[test]
    fn test_moving_average_at_insufficient_history() {
        let series = series(&[1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(None, series.moving_average_at(day(0), 3));
        assert_eq!(None, series.moving_average_at(day(2), 3));
        for n in -5..40 {
            assert_eq!(None, series.moving_average_at(day(n), WINDOW_SIZE));
        }
    }

    #[test]
    fn test_moving_average_at_matches_rolling_mean() {
        let prices: Vec<f64> = (1..=400).map(|n| 50.0 + (n % 17) as f64).collect();
        let series = series(&prices);
        let rolling = series.rolling_mean(WINDOW_SIZE);

        let expected = rolling[299].1.unwrap();
        let actual = series.moving_average_at(day(300), WINDOW_SIZE).unwrap();
        assert_relative_eq!(expected, actual, epsilon = 1e-9);
    }

    #[test]
    fn test_moving_average_at_is_deterministic() {
        let prices: Vec<f64> = (1..=200).map(|n| n as f64).collect();
        let series = series(&prices);

        let first = series.moving_average_at(day(190), WINDOW_SIZE);
        let second = series.moving_average_at(day(190), WINDOW_SIZE);
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn test_daily_change() {
        assert_eq!(None, series(&[10.0]).daily_change());

        let (change, percent) = series(&[8.0, 10.0, 12.0]).daily_change().unwrap();
        assert_relative_eq!(2.0, change);
        assert_relative_eq!(20.0, percent);
    }
}
