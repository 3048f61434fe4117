//! Balance commands.

use serde_json::{json, Value};

use caisse_core::CurrencyAmount;

use super::{to_json, BalanceView, Context};
use crate::cli::BalanceCommand;
use crate::error::CliError;

pub async fn run(ctx: &Context, command: BalanceCommand) -> Result<Value, CliError> {
    let movements = ctx.db.movements();

    match command {
        BalanceCommand::Show {
            session,
            currency: Some(code),
        } => {
            let currency = ctx.catalog().resolve(&code)?;
            let balance = movements.current_balance(&session, currency).await?;
            Ok(json!({
                "session_id": session,
                "currency": currency,
                "current": ctx.catalog().format(&CurrencyAmount::new(currency, balance))?,
                "current_minor": balance.minor(),
            }))
        }
        BalanceCommand::Show {
            session,
            currency: None,
        } => {
            let balances = movements.balances(&session).await?;
            to_json(&BalanceView::build_all(ctx.catalog(), &balances)?)
        }
        BalanceCommand::Verify { session } => {
            let drift = movements.verify(&session).await?;
            if !drift.is_empty() {
                tracing::warn!(session_id = %session, lines = drift.len(), "Balance drift detected");
            }
            Ok(json!({
                "session_id": session,
                "consistent": drift.is_empty(),
                "drift": to_json(&drift)?,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::tests::{context, exec};
    use crate::error::ErrorCode;
    use caisse_core::ErrorKind;

    #[tokio::test]
    async fn test_show_and_verify() {
        let ctx = context().await;
        exec(&ctx, &["register", "add", "till-1", "--shop", "shop-1"])
            .await
            .unwrap();
        let opened = exec(
            &ctx,
            &["session", "open", "till-1", "--operator", "c-1", "--amount", "CDF=1000"],
        )
        .await
        .unwrap();
        let id = opened["id"].as_str().unwrap().to_string();
        exec(&ctx, &["movement", "record", &id, "withdrawal", "CDF=250", "--actor", "c-1"])
            .await
            .unwrap();

        let all = exec(&ctx, &["balance", "show", &id]).await.unwrap();
        assert_eq!(all[0]["currency"], "CDF");
        assert_eq!(all[0]["opening_minor"], 100_000);
        assert_eq!(all[0]["current_minor"], 75_000);

        // Untouched currency reads as zero
        let eur = exec(&ctx, &["balance", "show", &id, "--currency", "EUR"])
            .await
            .unwrap();
        assert_eq!(eur["current_minor"], 0);

        let verified = exec(&ctx, &["balance", "verify", &id]).await.unwrap();
        assert_eq!(verified["consistent"], true);

        let err = exec(&ctx, &["balance", "show", "missing"]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Ledger(ErrorKind::SessionNotFound));
    }
}
