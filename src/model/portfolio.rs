use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::equity::{Equity, VestingEvent};
use crate::provider::QuoteProvider;

#[derive(Clone, PartialEq, Debug)]
pub struct Portfolio {
    pub name: String,
    pub equities: BTreeMap<String, Equity>,
}

impl Portfolio {
    pub fn new(name: String) -> Portfolio {
        Portfolio {
            name,
            equities: BTreeMap::new(),
        }
    }

    pub fn vesting_event_count(&self) -> usize {
        self.equities
            .values()
            .map(|equity| equity.vesting_events.len())
            .sum()
    }

    /// Distinct currencies of the equities, USD standing in for missing ones.
    pub fn currencies(&self) -> Vec<String> {
        let mut currencies: Vec<String> = self
            .equities
            .values()
            .map(|equity| equity.currency_or_usd().to_string())
            .collect();
        currencies.sort();
        currencies.dedup();
        currencies
    }
}

/// A portfolio being edited. Mutations go through the draft and only reach
/// storage when the draft is committed.
#[derive(Debug)]
pub struct PortfolioDraft {
    portfolio: Portfolio,
    is_new: bool,
}

impl PortfolioDraft {
    pub fn new(name: String) -> PortfolioDraft {
        PortfolioDraft {
            portfolio: Portfolio::new(name),
            is_new: true,
        }
    }

    pub fn editing(portfolio: Portfolio) -> PortfolioDraft {
        PortfolioDraft {
            portfolio,
            is_new: false,
        }
    }

    /// Whether the portfolio did not exist in storage when the draft was
    /// opened.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn into_portfolio(self) -> Portfolio {
        self.portfolio
    }

    /// Adds the equity unless its ticker is already present. Returns whether
    /// it was added.
    pub fn add_equity(&mut self, equity: Equity) -> bool {
        if self.portfolio.equities.contains_key(&equity.ticker) {
            return false;
        }

        self.portfolio
            .equities
            .insert(equity.ticker.clone(), equity);
        true
    }

    pub fn remove_equity(&mut self, ticker: &str) -> Option<Equity> {
        self.portfolio.equities.remove(ticker)
    }

    /// Returns false when the ticker is not part of the portfolio.
    pub fn add_vesting_event(&mut self, ticker: &str, event: VestingEvent) -> bool {
        match self.portfolio.equities.get_mut(ticker) {
            Some(equity) => {
                equity.add_vesting_event(event);
                true
            }
            None => false,
        }
    }

    /// Removes the events of `ticker` vesting at `vesting_date`. `None` when
    /// the ticker is not part of the portfolio.
    pub fn remove_vesting_event(
        &mut self,
        ticker: &str,
        vesting_date: DateTime<Utc>,
    ) -> Option<usize> {
        self.portfolio
            .equities
            .get_mut(ticker)
            .map(|equity| equity.remove_vesting_events_on(vesting_date))
    }

    /// Replaces the prices of every equity from the provider. A ticker that
    /// fails to fetch keeps its previous prices. Returns how many refreshed.
    pub fn refresh_prices(&mut self, provider: &dyn QuoteProvider) -> usize {
        let mut refreshed = 0;

        for equity in self.portfolio.equities.values_mut() {
            match provider.quote(&equity.ticker) {
                Ok(quote) => {
                    equity.replace_prices(quote.latest_price, quote.historical_prices);
                    refreshed += 1;
                }
                Err(e) => {
                    log::warn!("Failed to refresh prices for {}: {}", equity.ticker, e);
                }
            }
        }

        refreshed
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;
    use crate::error::ProviderError;
    use crate::model::price::{PricePoint, PriceSeries};
    use crate::provider::{Quote, SearchHit};

    struct FakeQuotes;

    impl QuoteProvider for FakeQuotes {
        fn quote(&self, ticker: &str) -> Result<Quote, ProviderError> {
            if ticker == "BAD" {
                return Err(ProviderError::UnknownTicker(ticker.to_string()));
            }

            let date = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
            Ok(Quote {
                ticker: ticker.to_string(),
                isin: None,
                name: None,
                currency: Some("USD".to_string()),
                latest_price: Some(42.0),
                historical_prices: PriceSeries::new(vec![PricePoint::new(date, 42.0)]),
            })
        }

        fn search(&self, _term: &str) -> Result<Vec<SearchHit>, ProviderError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_add_equity_ignores_duplicate_ticker() {
        let mut draft = PortfolioDraft::new("Jane".to_string());

        let mut first = Equity::new("WMT".to_string());
        first.latest_price = Some(1.0);
        assert!(draft.add_equity(first));
        assert!(!draft.add_equity(Equity::new("WMT".to_string())));

        assert_eq!(Some(1.0), draft.portfolio().equities["WMT"].latest_price);
    }

    #[test]
    fn test_vesting_events_require_known_ticker() {
        let date = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut draft = PortfolioDraft::new("Jane".to_string());
        draft.add_equity(Equity::new("WMT".to_string()));

        assert!(draft.add_vesting_event("WMT", VestingEvent::new(date, 10.0)));
        assert!(!draft.add_vesting_event("AAPL", VestingEvent::new(date, 10.0)));
        assert_eq!(1, draft.portfolio().vesting_event_count());

        assert_eq!(None, draft.remove_vesting_event("AAPL", date));
        assert_eq!(Some(1), draft.remove_vesting_event("WMT", date));
        assert_eq!(0, draft.portfolio().vesting_event_count());
    }

    #[test]
    fn test_refresh_prices_skips_failing_tickers() {
        let mut draft = PortfolioDraft::new("Jane".to_string());
        draft.add_equity(Equity::new("BAD".to_string()));
        draft.add_equity(Equity::new("WMT".to_string()));

        assert_eq!(1, draft.refresh_prices(&FakeQuotes));

        let portfolio = draft.into_portfolio();
        assert_eq!(None, portfolio.equities["BAD"].latest_price);
        assert_eq!(Some(42.0), portfolio.equities["WMT"].latest_price);
        assert_eq!(1, portfolio.equities["WMT"].historical_prices.len());
    }

    #[test]
    fn test_currencies_are_distinct() {
        let mut portfolio = Portfolio::new("Jane".to_string());
        for (ticker, currency) in [("A", Some("EUR")), ("B", None), ("C", Some("EUR"))] {
            let mut equity = Equity::new(ticker.to_string());
            equity.currency = currency.map(str::to_string);
            portfolio.equities.insert(ticker.to_string(), equity);
        }

        assert_eq!(
            vec!["EUR".to_string(), "USD".to_string()],
            portfolio.currencies()
        );
    }
}
