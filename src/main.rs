use std::io;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use clap::{Parser, Subcommand};

mod config;
mod dto;
mod error;
mod fx;
mod model;
mod provider;
mod report;
mod valuation;

use config::Config;
use dto::portfolio::PortfolioStore;
use dto::rates::RateCache;
use model::equity::{Equity, VestingEvent};
use model::portfolio::{Portfolio, PortfolioDraft};
use provider::{QuoteProvider, YamlQuoteProvider, YamlRateProvider};
use report::format_currency;
use report::history::PriceHistory;
use report::schedule::{PayoutSchedule, ReportOptions};
use valuation::PricingMethod;

#[derive(Parser)]
#[command(about = "Price equity compensation forfeited when changing employer")]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Configuration file
    #[arg(long = "config")]
    config: Option<PathBuf>,

    /// Log debug output
    #[arg(long = "verbose", short = 'v')]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Manage portfolios
    #[clap(subcommand)]
    Portfolio(PortfolioCommand),

    /// Manage the equities of a portfolio
    #[clap(subcommand)]
    Equity(EquityCommand),

    /// Manage the vesting events of an equity
    #[clap(subcommand)]
    Vest(VestCommand),

    /// Search equities by ticker or name
    Search { term: String },

    /// Refetch the prices of every equity in a portfolio
    Refresh { portfolio: String },

    /// Generate the payout schedule of a portfolio
    Report(ReportArgs),

    /// Export the price history of an equity in a base currency
    History(HistoryArgs),
}

#[derive(Subcommand)]
enum PortfolioCommand {
    /// List saved portfolios
    List,
    /// Show the equities and vesting events of a portfolio
    Show { name: String },
    /// Create a portfolio, or open it if the name is taken
    Create { name: String },
    /// Delete a portfolio
    Delete { name: String },
}

#[derive(Subcommand)]
enum EquityCommand {
    /// Add an equity by ticker
    Add { portfolio: String, ticker: String },
    /// Remove an equity and its vesting events
    Remove { portfolio: String, ticker: String },
}

#[derive(Subcommand)]
enum VestCommand {
    /// Add a vesting event
    Add {
        portfolio: String,
        ticker: String,
        /// Vesting date (YYYY-MM-DD)
        #[arg(long = "date", value_parser = parse_vesting_date)]
        date: DateTime<Utc>,
        /// Number of shares vesting
        #[arg(long = "shares", value_parser = parse_shares)]
        shares: f64,
    },
    /// Remove the vesting events on a date
    Remove {
        portfolio: String,
        ticker: String,
        /// Vesting date (YYYY-MM-DD)
        #[arg(long = "date", value_parser = parse_vesting_date)]
        date: DateTime<Utc>,
    },
}

#[derive(Parser)]
struct ReportArgs {
    portfolio: String,

    /// latest, average or moving_average
    #[arg(long = "method")]
    method: Option<PricingMethod>,

    /// Currency of the report
    #[arg(long = "base-currency", value_parser = parse_currency)]
    base_currency: Option<String>,

    /// Percentage taken off every payout
    #[arg(long = "discount", default_value = "0", value_parser = parse_discount)]
    discount: f64,

    /// Destination file name for the payout schedule
    #[arg(long = "destination")]
    destination: Option<PathBuf>,

    /// Destination file name for the monthly payouts
    #[arg(long = "monthly-destination")]
    monthly_destination: Option<PathBuf>,
}

#[derive(Parser)]
struct HistoryArgs {
    portfolio: String,
    ticker: String,

    /// Currency of the prices
    #[arg(long = "base-currency", value_parser = parse_currency)]
    base_currency: Option<String>,

    /// Destination file name
    #[arg(long = "destination", default_value = "history.csv")]
    destination: PathBuf,
}

fn parse_vesting_date(s: &str) -> Result<DateTime<Utc>, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

fn parse_shares(s: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(shares) if shares.is_finite() && shares >= 0.0 => Ok(shares),
        _ => Err("expected a non-negative number of shares".to_string()),
    }
}

fn parse_discount(s: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(discount) if (0.0..=100.0).contains(&discount) => Ok(discount),
        _ => Err("expected a percentage between 0 and 100".to_string()),
    }
}

fn parse_currency(s: &str) -> Result<String, String> {
    let currency = s.to_uppercase();
    if fx::is_supported(&currency) {
        Ok(currency)
    } else {
        Err(format!(
            "supported currencies are {}",
            fx::SUPPORTED_CURRENCIES.join(", ")
        ))
    }
}

struct Workspace {
    config: Config,
    store: PortfolioStore,
}

impl Workspace {
    fn quotes(&self) -> YamlQuoteProvider {
        YamlQuoteProvider::new(self.config.quotes_dir.clone())
    }

    fn existing_portfolio(&self, name: &str) -> anyhow::Result<Portfolio> {
        if let Some(portfolio) = self.store.load(name)? {
            return Ok(portfolio);
        }

        let names = self.store.names()?;
        if names.is_empty() {
            bail!("No portfolio named '{}', none saved yet", name);
        }
        bail!(
            "No portfolio named '{}', saved portfolios: {}",
            name,
            names.join(", ")
        )
    }

    /// Opens a saved portfolio for editing. Only `portfolio create` starts new ones.
    fn existing_draft(&self, name: &str) -> anyhow::Result<PortfolioDraft> {
        Ok(PortfolioDraft::editing(self.existing_portfolio(name)?))
    }

    /// Today's rates for every currency of the portfolio plus `base_currency`.
    fn rates_for(
        &self,
        portfolio: &Portfolio,
        base_currency: &str,
    ) -> anyhow::Result<fx::RateTable> {
        let cache = RateCache::in_data_dir(&self.config.data_dir);
        let provider = YamlRateProvider::new(self.config.rates_file.clone());
        log::debug!("Fetching exchange rates from {:?}", provider.path());

        let mut currencies = portfolio.currencies();
        currencies.push(base_currency.to_string());

        let today = Utc::now().date_naive();
        let rates = fx::fetch_rates(
            &cache,
            &provider,
            currencies.iter().map(String::as_str),
            today,
        )
        .context("Unable to load exchange rates")?;
        log::debug!("Exchange rates for {}: {:?}", today, rates.rates());
        Ok(rates)
    }
}

fn run_portfolio_command(command: PortfolioCommand, workspace: &Workspace) -> anyhow::Result<()> {
    match command {
        PortfolioCommand::List => {
            for portfolio in workspace.store.load_all()?.values() {
                println!(
                    "{} ({} equities, {} vesting events)",
                    portfolio.name,
                    portfolio.equities.len(),
                    portfolio.vesting_event_count()
                );
            }
        }
        PortfolioCommand::Show { name } => {
            let portfolio = workspace.existing_portfolio(&name)?;
            print_portfolio(&portfolio, workspace.config.method);
        }
        PortfolioCommand::Create { name } => {
            let draft = workspace.store.open_draft(&name)?;
            if draft.is_new() {
                workspace.store.commit(draft)?;
                println!("Portfolio '{}' created", name);
            } else {
                println!("Portfolio '{}' already exists, editing it", name);
                print_portfolio(draft.portfolio(), workspace.config.method);
            }
        }
        PortfolioCommand::Delete { name } => {
            if workspace.store.delete(&name)? {
                println!("Portfolio '{}' deleted", name);
            } else {
                bail!("No portfolio named '{}'", name);
            }
        }
    }

    Ok(())
}

fn run_equity_command(command: EquityCommand, workspace: &Workspace) -> anyhow::Result<()> {
    match command {
        EquityCommand::Add { portfolio, ticker } => {
            let mut draft = workspace.existing_draft(&portfolio)?;

            let equity = match workspace.quotes().quote(&ticker) {
                Ok(quote) => quote.into_equity(),
                Err(e) => {
                    log::warn!("Failed to fetch quote for {}: {}", ticker, e);
                    println!("No price data for {}, adding it without prices", ticker);
                    Equity::new(ticker.clone())
                }
            };

            if draft.add_equity(equity) {
                workspace.store.commit(draft)?;
                println!("Added {} to '{}'", ticker, portfolio);
            } else {
                println!("{} is already part of '{}'", ticker, portfolio);
            }
        }
        EquityCommand::Remove { portfolio, ticker } => {
            let mut draft = workspace.existing_draft(&portfolio)?;
            if draft.remove_equity(&ticker).is_none() {
                bail!("{} is not part of '{}'", ticker, portfolio);
            }
            workspace.store.commit(draft)?;
            println!("Removed {} from '{}'", ticker, portfolio);
        }
    }

    Ok(())
}

fn run_vest_command(command: VestCommand, workspace: &Workspace) -> anyhow::Result<()> {
    match command {
        VestCommand::Add {
            portfolio,
            ticker,
            date,
            shares,
        } => {
            let mut draft = workspace.existing_draft(&portfolio)?;
            if !draft.add_vesting_event(&ticker, VestingEvent::new(date, shares)) {
                bail!("{} is not part of '{}'", ticker, portfolio);
            }
            workspace.store.commit(draft)?;
            println!(
                "{} shares of {} vesting on {}",
                shares,
                ticker,
                date.date_naive()
            );
        }
        VestCommand::Remove {
            portfolio,
            ticker,
            date,
        } => {
            let mut draft = workspace.existing_draft(&portfolio)?;
            match draft.remove_vesting_event(&ticker, date) {
                None => bail!("{} is not part of '{}'", ticker, portfolio),
                Some(0) => println!("No vesting events of {} on {}", ticker, date.date_naive()),
                Some(removed) => {
                    workspace.store.commit(draft)?;
                    println!("Removed {} vesting events of {}", removed, ticker);
                }
            }
        }
    }

    Ok(())
}

fn run_report(args: ReportArgs, workspace: &Workspace) -> anyhow::Result<()> {
    let portfolio = workspace.existing_portfolio(&args.portfolio)?;
    let base_currency = args
        .base_currency
        .unwrap_or_else(|| workspace.config.base_currency.clone());

    let mut options = ReportOptions::new(
        args.method.unwrap_or(workspace.config.method),
        &base_currency,
    );
    options.discount_percent = args.discount;

    let rates = workspace.rates_for(&portfolio, &base_currency)?;
    let schedule = PayoutSchedule::new(&portfolio, &rates, &options);
    println!("Payout schedule of '{}'", schedule.portfolio_name);

    match &args.destination {
        Some(destination) => {
            schedule.print_to_file(destination)?;
            println!("Wrote payout schedule to {:?}", destination);
        }
        None => {
            let mut writer = csv::Writer::from_writer(io::stdout());
            schedule.write_csv(&mut writer)?;
        }
    }

    if let Some(destination) = &args.monthly_destination {
        schedule.print_monthly_to_file(destination)?;
        println!("Wrote monthly payouts to {:?}", destination);
    }

    println!();
    println!("Vesting Date,Amount Paid ({})", base_currency);
    for payout in &schedule.daily {
        println!("{},{:.2}", payout.date.date_naive(), payout.amount);
    }

    println!();
    println!("Month,Value ({0}),Cumulative Payout ({0})", base_currency);
    for payout in &schedule.monthly {
        println!(
            "{},{:.2},{:.2}",
            payout.month, payout.amount, payout.cumulative
        );
    }

    println!();
    println!("{}", schedule.summary());

    Ok(())
}

fn run_history(args: HistoryArgs, workspace: &Workspace) -> anyhow::Result<()> {
    let portfolio = workspace.existing_portfolio(&args.portfolio)?;
    let equity = portfolio
        .equities
        .get(&args.ticker)
        .with_context(|| format!("{} is not part of '{}'", args.ticker, args.portfolio))?;
    let base_currency = args
        .base_currency
        .unwrap_or_else(|| workspace.config.base_currency.clone());

    let rates = workspace.rates_for(&portfolio, &base_currency)?;
    let history = PriceHistory::new(equity, &rates, &base_currency);
    history.print_to_file(&args.destination)?;

    println!(
        "Wrote price history of {} to {:?}",
        args.ticker, args.destination
    );
    Ok(())
}

fn run_command(command: Command, workspace: &Workspace) -> anyhow::Result<()> {
    match command {
        Command::Portfolio(command) => run_portfolio_command(command, workspace),
        Command::Equity(command) => run_equity_command(command, workspace),
        Command::Vest(command) => run_vest_command(command, workspace),
        Command::Search { term } => {
            let hits = workspace.quotes().search(&term).unwrap_or_else(|e| {
                log::warn!("Search for {:?} failed: {}", term, e);
                Vec::new()
            });

            if hits.is_empty() {
                println!("No match for {:?}", term);
            }
            for hit in hits {
                println!("{}\t{}", hit.ticker, hit.label);
            }
            Ok(())
        }
        Command::Refresh { portfolio } => {
            let mut draft = workspace.existing_draft(&portfolio)?;
            let total = draft.portfolio().equities.len();
            let refreshed = draft.refresh_prices(&workspace.quotes());
            workspace.store.commit(draft)?;
            println!(
                "Refreshed prices of {} out of {} equities",
                refreshed, total
            );
            Ok(())
        }
        Command::Report(args) => run_report(args, workspace),
        Command::History(args) => run_history(args, workspace),
    }
}

fn print_portfolio(portfolio: &Portfolio, method: PricingMethod) {
    println!("Portfolio: {}", portfolio.name);

    // Native values only add up when every equity shares a currency
    if let [currency] = portfolio.currencies().as_slice() {
        match valuation::value_portfolio(portfolio, method) {
            Some(value) => println!(
                "Value ({}): {} {}",
                method,
                format_currency(value),
                currency
            ),
            None => println!("Value ({}): unavailable", method),
        }
    }

    for equity in portfolio.equities.values() {
        let price = equity
            .latest_price
            .map(format_currency)
            .unwrap_or_else(|| "-".to_string());
        let change = equity
            .historical_prices
            .daily_change()
            .map(|(change, percent)| format!("{:+.2} ({:+.2}%)", change, percent))
            .unwrap_or_default();

        println!(
            "- {} ({}) {} {} {}",
            equity.display_name(),
            equity.ticker,
            price,
            equity.currency_or_usd(),
            change
        );
        if equity.historical_prices.is_empty() {
            println!("    no price history");
        } else {
            println!("    {} historical prices", equity.historical_prices.len());
        }
        for event in &equity.vesting_events {
            println!(
                "    {} {} shares",
                event.vesting_date.date_naive(),
                event.shares_vested
            );
        }
        if !equity.vesting_events.is_empty() {
            println!("    {} shares in total", equity.total_shares_vested());
        }
    }
}

fn load_context(config_path: Option<&Path>) -> anyhow::Result<Workspace> {
    let config = match config_path {
        Some(path) => Config::load(path, true)?,
        None => Config::load(Path::new(config::DEFAULT_CONFIG_PATH), false)?,
    };
    let store = PortfolioStore::in_dir(&config.data_dir);

    Ok(Workspace { config, store })
}

fn main() {
    let args = Cli::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let result = load_context(args.config.as_deref())
        .and_then(|workspace| run_command(args.command, &workspace));

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
