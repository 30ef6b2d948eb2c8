//! List records command handler

use std::sync::Arc;

use crate::config::Config;
use crate::domain::{COLLECTIONS, Record};
use crate::services::RecordService;
use crate::state::SharedState;

pub async fn cmd_list_records(config: Config, collection: &str) -> anyhow::Result<()> {
    if !COLLECTIONS.iter().any(|c| *c == collection) {
        anyhow::bail!(
            "Unknown collection: {collection}. Available: {}",
            COLLECTIONS.join(", ")
        );
    }

    let state = SharedState::new(config).await?;

    match collection {
        "schools" => print_records(&state.schools).await,
        "classes" => print_records(&state.classes).await,
        "subjects" => print_records(&state.subjects).await,
        "courses" => print_records(&state.courses).await,
        "chats" => print_records(&state.chats).await,
        "messages" => print_records(&state.messages).await,
        "clubs" => print_records(&state.clubs).await,
        "events" => print_records(&state.events).await,
        "users" => print_records(&state.users).await,
        "setupAccounts" => print_records(&state.setup_accounts).await,
        other => anyhow::bail!("No list handler for collection {other}"),
    }
}

async fn print_records<R: Record>(service: &Arc<dyn RecordService<R>>) -> anyhow::Result<()> {
    let records = service.get_all().await?;

    if records.is_empty() {
        println!("No {} stored.", R::COLLECTION);
        return Ok(());
    }

    println!("{} ({} total)", R::COLLECTION, records.len());
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}
