//! Command implementations
//!
//! Each command renders its result to a `String`; [`execute`] owns the
//! context lifecycle and printing.

pub mod notes;
pub mod plugins;
pub mod storage;

use anyhow::{bail, Context, Result};
use myrkat_config::MyrkatConfig;
use myrkat_core::{AppContext, ClientError, DocumentInput, Fields, StorageError, WhereClause};
use serde_json::Value;
use tracing::error;

use crate::cli::Commands;

/// Open the data directory, run `command`, print its output.
pub async fn execute(command: Commands, config: MyrkatConfig) -> Result<()> {
    let context = AppContext::bootstrap(&config).await.with_context(|| {
        format!(
            "Failed to open data directory {}",
            config.storage.data_dir.display()
        )
    })?;

    let result = run(&context, command).await;
    context.shutdown();

    if let Err(e) = &result {
        if let Some(code) = storage_error_code(e) {
            error!(code, "Storage request failed");
        }
    }

    let output = result?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}

/// Dispatch one command against an open context.
pub async fn run(context: &AppContext, command: Commands) -> Result<String> {
    let client = context.client();

    match command {
        Commands::Init => Ok(storage::init(context)),
        Commands::Collections => storage::collections(context).await,
        Commands::Find { collection, filter } => {
            storage::find(&client, &collection, filter.as_deref()).await
        }
        Commands::Insert { collection, data } => storage::insert(&client, &collection, &data).await,
        Commands::Update {
            collection,
            filter,
            data,
        } => storage::update(&client, &collection, &filter, &data).await,
        Commands::Delete { collection, filter } => {
            storage::delete(&client, &collection, &filter).await
        }
        Commands::Import { collection, file } => {
            storage::import(&client, &collection, &file).await
        }
        Commands::Export { collection, output } => {
            storage::export(context, collection.as_deref(), output.as_deref()).await
        }
        Commands::Tree => notes::tree(context).await,
        Commands::Note(cmd) => notes::execute(context, cmd).await,
        Commands::Plugins => Ok(plugins::list(context)),
    }
}

/// Code of the storage failure behind `err`, if a storage request caused it.
pub fn storage_error_code(err: &anyhow::Error) -> Option<&'static str> {
    err.chain().find_map(|cause| {
        if let Some(client) = cause.downcast_ref::<ClientError>() {
            return client.as_storage().map(StorageError::code);
        }
        cause.downcast_ref::<StorageError>().map(StorageError::code)
    })
}

// ============================================================================
// Argument parsing helpers
// ============================================================================

/// Parse a `--where` argument. Must be a JSON object.
pub fn parse_where(text: &str) -> Result<WhereClause> {
    Ok(WhereClause::from(parse_object(text, "where-clause")?))
}

/// Parse a JSON object argument.
pub fn parse_fields(text: &str) -> Result<Fields> {
    parse_object(text, "patch")
}

/// Parse insert data: one object or an array of objects.
pub fn parse_input(text: &str) -> Result<DocumentInput> {
    serde_json::from_str(text)
        .with_context(|| format!("Insert data must be a JSON object or array of objects: {}", text))
}

fn parse_object(text: &str, what: &str) -> Result<Fields> {
    let value: Value =
        serde_json::from_str(text).with_context(|| format!("Invalid JSON in {}", what))?;
    match value {
        Value::Object(fields) => Ok(fields),
        other => bail!("The {} must be a JSON object, got {}", what, other),
    }
}

/// Pretty JSON for stdout
pub fn to_pretty(value: &impl serde::Serialize) -> Result<String> {
    serde_json::to_string_pretty(value).context("Failed to render JSON")
}

#[cfg(test)]
mod tests {
    use super::*;
    use myrkat_core::storage::MemoryBackend;
    use std::sync::Arc;

    #[test]
    fn test_parse_where_accepts_objects_only() {
        let clause = parse_where(r#"{"parentId": null}"#).unwrap();
        assert_eq!(clause.len(), 1);

        assert!(parse_where("[1, 2]").is_err());
        assert!(parse_where("{not json").is_err());
    }

    #[tokio::test]
    async fn test_storage_error_code_survives_context() {
        let context = AppContext::with_backend(
            &MyrkatConfig::default(),
            Arc::new(MemoryBackend::new()),
        )
        .await
        .unwrap();
        let client = context.client();
        storage::insert(&client, "notes", r#"{"id": "n1"}"#).await.unwrap();

        let err = storage::insert(&client, "notes", r#"{"id": "n1"}"#)
            .await
            .unwrap_err();

        assert_eq!(storage_error_code(&err), Some("duplicate_id"));
        assert_eq!(storage_error_code(&parse_where("[]").unwrap_err()), None);
    }

    #[test]
    fn test_parse_input_shapes() {
        assert!(matches!(parse_input(r#"{"a": 1}"#).unwrap(), DocumentInput::One(_)));
        assert!(matches!(
            parse_input(r#"[{"a": 1}, {"a": 2}]"#).unwrap(),
            DocumentInput::Many(ref many) if many.len() == 2
        ));
        assert!(parse_input("42").is_err());
    }
}
