//! # Command-Line Surface
//!
//! ```text
//! caisse [--config FILE] [--db FILE] <group> <action> ...
//!
//!   register  add | show | list
//!   session   open | close | reopen | show | list | history
//!   movement  record | list
//!   balance   show | verify
//!   report    summary | discrepancy | institutions | rollup
//! ```
//!
//! Amounts are written `CUR=decimal`, e.g. `USD=130.50` or `CDF=250000`.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use caisse_core::MovementKind;

#[derive(Debug, Parser)]
#[command(name = "caisse", version, about = "Cash-session ledger for shop registers")]
pub struct Cli {
    /// Config file (default: platform config dir/caisse.toml)
    #[arg(long, global = true, env = "CAISSE_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Database file, overriding config and environment
    #[arg(long, global = true, value_name = "FILE")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Register administration
    #[command(subcommand)]
    Register(RegisterCommand),

    /// Open, close and reopen shifts
    #[command(subcommand)]
    Session(SessionCommand),

    /// Record and list cash movements
    #[command(subcommand)]
    Movement(MovementCommand),

    /// Projected balances
    #[command(subcommand)]
    Balance(BalanceCommand),

    /// Reconciliation reports
    #[command(subcommand)]
    Report(ReportCommand),
}

// =============================================================================
// Register
// =============================================================================

#[derive(Debug, Subcommand)]
pub enum RegisterCommand {
    /// Create a register
    Add {
        id: String,
        #[arg(long)]
        shop: String,
        #[arg(long)]
        counter: Option<String>,
        /// Operator every session on this register is attributed to
        #[arg(long)]
        operator: Option<String>,
    },
    /// Show one register and its open session, if any
    Show { id: String },
    /// List the registers of a shop
    List {
        #[arg(long)]
        shop: String,
    },
}

// =============================================================================
// Session
// =============================================================================

#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Open a shift with its opening float
    Open {
        register: String,
        /// Who is asking (used unless the register has an assigned operator)
        #[arg(long)]
        operator: String,
        /// Opening amount, repeatable
        #[arg(long = "amount", value_name = "CUR=AMOUNT")]
        amounts: Vec<AmountArg>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Close a shift with the counted cash
    Close {
        session: String,
        #[arg(long)]
        actor: String,
        /// Counted amount, repeatable; missing currencies count as zero
        #[arg(long = "count", value_name = "CUR=AMOUNT")]
        counts: Vec<AmountArg>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Reopen a closed shift (supervisor action)
    Reopen {
        session: String,
        #[arg(long)]
        actor: String,
    },
    /// Show a session with its balances
    Show { session: String },
    /// List the sessions of a register, oldest first
    List { register: String },
    /// Every closing recorded for a session
    History { session: String },
}

// =============================================================================
// Movement
// =============================================================================

#[derive(Debug, Subcommand)]
pub enum MovementCommand {
    /// Append a movement; the kind decides the sign
    Record(RecordArgs),
    /// List a session's movements in order
    List { session: String },
}

#[derive(Debug, Args)]
pub struct RecordArgs {
    pub session: String,

    /// deposit | withdrawal | exchange-in | exchange-out | adjustment-in | adjustment-out
    pub kind: MovementKind,

    /// Magnitude, never signed
    #[arg(value_name = "CUR=AMOUNT")]
    pub amount: AmountArg,

    #[arg(long)]
    pub actor: String,

    #[arg(long, default_value = "")]
    pub description: String,

    /// Business transaction reference, e.g. mpesa:QX12
    #[arg(long = "ref")]
    pub external_ref: Option<String>,

    /// Accept a zero amount
    #[arg(long)]
    pub allow_zero: bool,
}

// =============================================================================
// Balance
// =============================================================================

#[derive(Debug, Subcommand)]
pub enum BalanceCommand {
    /// Current balance, per currency or for one
    Show {
        session: String,
        #[arg(long)]
        currency: Option<String>,
    },
    /// Compare cached balances with a recomputation from movements
    Verify { session: String },
}

// =============================================================================
// Report
// =============================================================================

#[derive(Debug, Subcommand)]
pub enum ReportCommand {
    /// Count and total per movement kind and currency
    Summary { session: String },
    /// Counted minus projected, without closing
    Discrepancy {
        session: String,
        #[arg(long = "count", value_name = "CUR=AMOUNT")]
        counts: Vec<AmountArg>,
    },
    /// Withdrawals per counterpart institution
    Institutions {
        session: String,
        /// Overrides reports.institution_separator
        #[arg(long)]
        separator: Option<char>,
    },
    /// Shop totals for one UTC day
    Rollup {
        shop: String,
        /// YYYY-MM-DD, default today
        #[arg(long)]
        day: Option<NaiveDate>,
    },
}

// =============================================================================
// Amount Argument
// =============================================================================

/// A `CUR=decimal` pair, not yet checked against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmountArg {
    pub currency: String,
    pub amount: String,
}

impl FromStr for AmountArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (currency, amount) = s
            .split_once('=')
            .ok_or_else(|| format!("expected CUR=AMOUNT, got '{}'", s))?;
        let (currency, amount) = (currency.trim(), amount.trim());
        if currency.is_empty() || amount.is_empty() {
            return Err(format!("expected CUR=AMOUNT, got '{}'", s));
        }
        Ok(AmountArg {
            currency: currency.to_string(),
            amount: amount.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_amount_arg() {
        let arg: AmountArg = "usd=12.50".parse().unwrap();
        assert_eq!(arg.currency, "usd");
        assert_eq!(arg.amount, "12.50");

        assert!("USD".parse::<AmountArg>().is_err());
        assert!("=12".parse::<AmountArg>().is_err());
        assert!("USD=".parse::<AmountArg>().is_err());
    }

    #[test]
    fn test_record_parses_kind_and_amount() {
        let cli = Cli::try_parse_from([
            "caisse", "movement", "record", "S-1", "exchange-out", "CDF=25000", "--actor",
            "cashier-1", "--ref", "mpesa:QX12",
        ])
        .unwrap();

        let Command::Movement(MovementCommand::Record(args)) = cli.command else {
            panic!("expected movement record");
        };
        assert_eq!(args.kind, MovementKind::ExchangeOut);
        assert_eq!(args.amount.currency, "CDF");
        assert_eq!(args.external_ref.as_deref(), Some("mpesa:QX12"));
        assert!(!args.allow_zero);
    }

    #[test]
    fn test_unknown_kind_is_refused_by_parser() {
        let result = Cli::try_parse_from([
            "caisse", "movement", "record", "S-1", "refund", "USD=1", "--actor", "c-1",
        ]);
        assert!(result.is_err());
    }
}
