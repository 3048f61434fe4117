//! Movement commands.

use serde_json::Value;

use caisse_core::NewMovement;

use super::{resolve_amount, to_json, Context};
use crate::cli::{MovementCommand, RecordArgs};
use crate::error::CliError;

pub async fn run(ctx: &Context, command: MovementCommand) -> Result<Value, CliError> {
    match command {
        MovementCommand::Record(args) => record(ctx, args).await,
        MovementCommand::List { session } => to_json(&ctx.db.movements().list(&session).await?),
    }
}

async fn record(ctx: &Context, args: RecordArgs) -> Result<Value, CliError> {
    let (currency, magnitude) = resolve_amount(ctx.catalog(), &args.amount)?;

    let mut request = NewMovement::new(args.kind, magnitude, currency, args.actor)
        .with_description(args.description);
    if let Some(reference) = args.external_ref {
        request = request.with_external_ref(reference);
    }
    if args.allow_zero {
        request = request.allowing_zero();
    }

    to_json(&ctx.db.movements().record(&args.session, &request).await?)
}
