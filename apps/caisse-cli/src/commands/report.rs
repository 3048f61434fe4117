//! Reconciliation reports.

use chrono::Utc;
use serde_json::Value;

use caisse_core::PrefixResolver;

use super::{resolve_amounts, to_json, Context};
use crate::cli::ReportCommand;
use crate::error::CliError;

pub async fn run(ctx: &Context, command: ReportCommand) -> Result<Value, CliError> {
    let reports = ctx.db.reports();

    match command {
        ReportCommand::Summary { session } => to_json(&reports.summarize(&session).await?),
        ReportCommand::Discrepancy { session, counts } => {
            let counted = resolve_amounts(ctx.catalog(), "counted", &counts)?;
            to_json(&reports.discrepancy(&session, &counted).await?)
        }
        ReportCommand::Institutions { session, separator } => {
            let separator = separator.unwrap_or(ctx.config.reports.institution_separator);
            let resolver = PrefixResolver::new(separator);
            to_json(&reports.institution_breakdown(&session, &resolver).await?)
        }
        ReportCommand::Rollup { shop, day } => {
            let day = day.unwrap_or_else(|| Utc::now().date_naive());
            to_json(&reports.shop_day_rollup(&shop, day).await?)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::tests::{context, exec};

    #[tokio::test]
    async fn test_reports() {
        let ctx = context().await;
        exec(&ctx, &["register", "add", "till-1", "--shop", "shop-1"])
            .await
            .unwrap();
        let opened = exec(
            &ctx,
            &["session", "open", "till-1", "--operator", "c-1", "--amount", "USD=100"],
        )
        .await
        .unwrap();
        let id = opened["id"].as_str().unwrap().to_string();

        for (kind, amount, reference) in [
            ("withdrawal", "USD=20", "mpesa/TX1"),
            ("withdrawal", "USD=5", "airtel/TX2"),
            ("deposit", "USD=30", "walk-in"),
        ] {
            exec(
                &ctx,
                &["movement", "record", &id, kind, amount, "--actor", "c-1", "--ref", reference],
            )
            .await
            .unwrap();
        }

        let summary = exec(&ctx, &["report", "summary", &id]).await.unwrap();
        assert_eq!(summary.as_array().unwrap().len(), 2);

        let preview = exec(&ctx, &["report", "discrepancy", &id, "--count", "USD=95"])
            .await
            .unwrap();
        assert_eq!(preview[0]["projected_minor"], 10_500);
        assert_eq!(preview[0]["discrepancy_minor"], -1_000);

        let institutions = exec(&ctx, &["report", "institutions", &id, "--separator", "/"])
            .await
            .unwrap();
        let lines = institutions.as_array().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["institution"], "airtel");
        assert_eq!(lines[1]["institution"], "mpesa");

        let rollup = exec(&ctx, &["report", "rollup", "shop-1"]).await.unwrap();
        assert_eq!(rollup["open_sessions"], 1);
        assert_eq!(rollup["lines"][0]["current_minor"], 10_500);
    }
}
