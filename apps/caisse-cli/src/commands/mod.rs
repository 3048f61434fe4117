//! # Command Handlers
//!
//! One module per command group. Each handler turns parsed arguments into
//! ledger calls and returns the JSON value to print.
//!
//! ## Command Organization
//! ```text
//! commands/
//! ├── mod.rs       ◄─── You are here (context, dispatch, amount parsing)
//! ├── register.rs  ◄─── register add/show/list
//! ├── session.rs   ◄─── session open/close/reopen/show/list/history
//! ├── movement.rs  ◄─── movement record/list
//! ├── balance.rs   ◄─── balance show/verify
//! └── report.rs    ◄─── report summary/discrepancy/institutions/rollup
//! ```

pub mod balance;
pub mod movement;
pub mod register;
pub mod report;
pub mod session;

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use caisse_core::validation::collect_amounts;
use caisse_core::{Currency, CurrencyAmount, CurrencyBalance, CurrencyCatalog, LedgerError, Money};
use caisse_db::Database;

use crate::cli::{AmountArg, Command};
use crate::config::AppConfig;
use crate::error::CliError;

/// Everything a handler needs.
#[derive(Debug, Clone)]
pub struct Context {
    pub db: Database,
    pub config: AppConfig,
}

impl Context {
    pub fn new(db: Database, config: AppConfig) -> Self {
        Context { db, config }
    }

    pub fn catalog(&self) -> &CurrencyCatalog {
        self.db.catalog()
    }
}

/// Routes a parsed command to its handler.
pub async fn dispatch(ctx: &Context, command: Command) -> Result<Value, CliError> {
    match command {
        Command::Register(cmd) => register::run(ctx, cmd).await,
        Command::Session(cmd) => session::run(ctx, cmd).await,
        Command::Movement(cmd) => movement::run(ctx, cmd).await,
        Command::Balance(cmd) => balance::run(ctx, cmd).await,
        Command::Report(cmd) => report::run(ctx, cmd).await,
    }
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<Value, CliError> {
    Ok(serde_json::to_value(value)?)
}

/// Resolves `CUR=decimal` pairs against the catalog; a repeated currency is refused.
pub(crate) fn resolve_amounts(
    catalog: &CurrencyCatalog,
    field: &str,
    args: &[AmountArg],
) -> Result<BTreeMap<Currency, Money>, CliError> {
    let pairs = args
        .iter()
        .map(|arg| resolve_amount(catalog, arg))
        .collect::<Result<Vec<_>, LedgerError>>()?;
    Ok(collect_amounts(field, pairs)?)
}

pub(crate) fn resolve_amount(
    catalog: &CurrencyCatalog,
    arg: &AmountArg,
) -> Result<(Currency, Money), LedgerError> {
    let currency = catalog.resolve(&arg.currency)?;
    let amount = catalog.parse_amount(currency, &arg.amount)?;
    Ok((currency, amount))
}

/// A balance line with decimal text next to the minor units.
#[derive(Debug, Clone, Serialize)]
pub struct BalanceView {
    pub currency: Currency,
    pub opening: String,
    pub current: String,
    pub opening_minor: i64,
    pub current_minor: i64,
}

impl BalanceView {
    pub(crate) fn build(
        catalog: &CurrencyCatalog,
        balance: &CurrencyBalance,
    ) -> Result<Self, LedgerError> {
        Ok(BalanceView {
            currency: balance.currency,
            opening: catalog.format(&CurrencyAmount::new(balance.currency, balance.opening()))?,
            current: catalog.format(&CurrencyAmount::new(balance.currency, balance.current()))?,
            opening_minor: balance.opening_minor,
            current_minor: balance.current_minor,
        })
    }

    pub(crate) fn build_all(
        catalog: &CurrencyCatalog,
        balances: &[CurrencyBalance],
    ) -> Result<Vec<Self>, LedgerError> {
        balances
            .iter()
            .map(|balance| BalanceView::build(catalog, balance))
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cli::Cli;
    use caisse_core::ErrorKind;
    use caisse_db::DbConfig;
    use clap::Parser;

    use crate::error::ErrorCode;

    pub(crate) async fn context() -> Context {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Context::new(db, AppConfig::default())
    }

    pub(crate) async fn exec(ctx: &Context, args: &[&str]) -> Result<Value, CliError> {
        let argv = std::iter::once("caisse").chain(args.iter().copied());
        let cli = Cli::try_parse_from(argv).unwrap();
        dispatch(ctx, cli.command).await
    }

    #[test]
    fn test_resolve_amounts() {
        let catalog = CurrencyCatalog::default();
        let args = vec![
            "usd=12.50".parse::<AmountArg>().unwrap(),
            "CDF=250000".parse().unwrap(),
        ];
        let amounts = resolve_amounts(&catalog, "opening", &args).unwrap();
        assert_eq!(amounts[&Currency::parse("USD").unwrap()], Money::from_minor(1_250));
        assert_eq!(
            amounts[&Currency::parse("CDF").unwrap()],
            Money::from_minor(25_000_000)
        );

        let repeated = vec![
            "USD=1".parse::<AmountArg>().unwrap(),
            "usd=2".parse().unwrap(),
        ];
        let err = resolve_amounts(&catalog, "opening", &repeated).unwrap_err();
        assert_eq!(err.code, ErrorCode::Ledger(ErrorKind::Validation));

        let unknown = vec!["ZZZ=1".parse::<AmountArg>().unwrap()];
        let err = resolve_amounts(&catalog, "opening", &unknown).unwrap_err();
        assert_eq!(err.code, ErrorCode::Ledger(ErrorKind::UnknownCurrency));
    }

    #[tokio::test]
    async fn test_shift_through_the_command_line() {
        let ctx = context().await;

        exec(&ctx, &["register", "add", "till-1", "--shop", "shop-1"])
            .await
            .unwrap();
        let opened = exec(
            &ctx,
            &["session", "open", "till-1", "--operator", "cashier-1", "--amount", "USD=100"],
        )
        .await
        .unwrap();
        let session_id = opened["id"].as_str().unwrap().to_string();

        exec(
            &ctx,
            &["movement", "record", &session_id, "deposit", "USD=30", "--actor", "cashier-1"],
        )
        .await
        .unwrap();

        let balance = exec(&ctx, &["balance", "show", &session_id, "--currency", "usd"])
            .await
            .unwrap();
        assert_eq!(balance["current_minor"], 13_000);
        assert_eq!(balance["current"], "130.00 USD");

        let closed = exec(
            &ctx,
            &["session", "close", &session_id, "--actor", "cashier-1", "--count", "USD=140"],
        )
        .await
        .unwrap();
        assert_eq!(closed["closing"]["discrepancies"][0]["discrepancy_minor"], 1_000);

        let err = exec(
            &ctx,
            &["movement", "record", &session_id, "deposit", "USD=1", "--actor", "cashier-1"],
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::Ledger(ErrorKind::SessionClosed));
        assert_eq!(err.exit_code(), 3);
    }
}
