//! Register administration.

use serde_json::{json, Value};

use caisse_core::LedgerError;

use super::{to_json, Context};
use crate::cli::RegisterCommand;
use crate::error::CliError;

pub async fn run(ctx: &Context, command: RegisterCommand) -> Result<Value, CliError> {
    match command {
        RegisterCommand::Add {
            id,
            shop,
            counter,
            operator,
        } => {
            let register = ctx
                .db
                .registers()
                .create(&id, &shop, counter.as_deref(), operator.as_deref())
                .await?;
            to_json(&register)
        }
        RegisterCommand::Show { id } => {
            let register = ctx
                .db
                .registers()
                .get(&id)
                .await?
                .ok_or_else(|| LedgerError::RegisterNotFound(id.clone()))?;
            let open_session = ctx.db.sessions().open_for_register(&id).await?;
            Ok(json!({
                "register": to_json(&register)?,
                "open_session": to_json(&open_session)?,
            }))
        }
        RegisterCommand::List { shop } => {
            let registers = ctx.db.registers().list_for_shop(&shop).await?;
            to_json(&registers)
        }
    }
}
