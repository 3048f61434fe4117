//! Session lifecycle commands.

use serde_json::{json, Value};

use caisse_core::{CloseSession, OpenSession};

use super::{resolve_amounts, to_json, BalanceView, Context};
use crate::cli::SessionCommand;
use crate::error::CliError;

pub async fn run(ctx: &Context, command: SessionCommand) -> Result<Value, CliError> {
    let sessions = ctx.db.sessions();

    match command {
        SessionCommand::Open {
            register,
            operator,
            amounts,
            notes,
        } => {
            let mut request = OpenSession::new(register, operator);
            request.opening_amounts = resolve_amounts(ctx.catalog(), "opening", &amounts)?;
            request.notes = notes;

            to_json(&sessions.open(&request).await?)
        }
        SessionCommand::Close {
            session,
            actor,
            counts,
            notes,
        } => {
            let mut request = CloseSession::new(session, actor);
            request.counted_amounts = resolve_amounts(ctx.catalog(), "counted", &counts)?;
            request.notes = notes;

            to_json(&sessions.close(&request).await?)
        }
        SessionCommand::Reopen { session, actor } => {
            to_json(&sessions.reopen(&session, &actor).await?)
        }
        SessionCommand::Show { session } => {
            let record = sessions.require(&session).await?;
            let balances = ctx.db.movements().balances(&session).await?;
            Ok(json!({
                "session": to_json(&record)?,
                "balances": to_json(&BalanceView::build_all(ctx.catalog(), &balances)?)?,
            }))
        }
        SessionCommand::List { register } => to_json(&sessions.list_for_register(&register).await?),
        SessionCommand::History { session } => to_json(&sessions.closings(&session).await?),
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::tests::{context, exec};
    use crate::error::ErrorCode;
    use caisse_core::ErrorKind;

    #[tokio::test]
    async fn test_reopen_and_history() {
        let ctx = context().await;
        exec(&ctx, &["register", "add", "till-1", "--shop", "shop-1"])
            .await
            .unwrap();

        let opened = exec(
            &ctx,
            &[
                "session", "open", "till-1", "--operator", "c-1", "--amount", "USD=100",
                "--amount", "CDF=50000",
            ],
        )
        .await
        .unwrap();
        let id = opened["id"].as_str().unwrap().to_string();

        let err = exec(&ctx, &["session", "open", "till-1", "--operator", "c-2"])
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Ledger(ErrorKind::RegisterBusy));

        let shown = exec(&ctx, &["session", "show", &id]).await.unwrap();
        assert_eq!(shown["session"]["status"], "open");
        assert_eq!(shown["balances"].as_array().unwrap().len(), 2);

        exec(&ctx, &["session", "close", &id, "--actor", "c-1", "--count", "USD=90"])
            .await
            .unwrap();
        exec(&ctx, &["session", "reopen", &id, "--actor", "supervisor"])
            .await
            .unwrap();
        exec(&ctx, &["session", "close", &id, "--actor", "supervisor"])
            .await
            .unwrap();

        let history = exec(&ctx, &["session", "history", &id]).await.unwrap();
        let closings = history.as_array().unwrap();
        assert_eq!(closings.len(), 2);
        assert_eq!(closings[0]["sequence"], 1);
        assert_eq!(closings[1]["actor_id"], "supervisor");

        let listed = exec(&ctx, &["session", "list", "till-1"]).await.unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }
}
