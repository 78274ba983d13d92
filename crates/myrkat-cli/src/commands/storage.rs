use anyhow::{Context, Result};
use myrkat_core::{AppContext, Document, DocumentInput, StorageClient, WhereClause};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::info;

use super::{parse_fields, parse_input, parse_where, to_pretty};

pub fn init(context: &AppContext) -> String {
    format!(
        "Data directory ready at {}",
        context.config().storage.data_dir.display()
    )
}

pub async fn collections(context: &AppContext) -> Result<String> {
    let names = context
        .store()
        .collections()
        .await
        .context("Failed to list collections")?;
    Ok(names.join("\n"))
}

pub async fn find(
    client: &StorageClient,
    collection: &str,
    filter: Option<&str>,
) -> Result<String> {
    let filter = match filter {
        Some(text) => parse_where(text)?,
        None => WhereClause::all(),
    };
    let documents = client
        .find(collection, filter)
        .await
        .with_context(|| format!("Find in '{}' failed", collection))?;
    to_pretty(&documents)
}

pub async fn insert(client: &StorageClient, collection: &str, data: &str) -> Result<String> {
    let context = || format!("Insert into '{}' failed", collection);
    match parse_input(data)? {
        DocumentInput::One(fields) => {
            let document = client.insert_one(collection, fields).await.with_context(context)?;
            to_pretty(&document)
        }
        DocumentInput::Many(records) => {
            let documents = client
                .insert_many(collection, records)
                .await
                .with_context(context)?;
            to_pretty(&documents)
        }
    }
}

pub async fn update(
    client: &StorageClient,
    collection: &str,
    filter: &str,
    data: &str,
) -> Result<String> {
    let filter = parse_where(filter)?;
    let patch = parse_fields(data)?;
    let updated = client
        .update(collection, filter, patch)
        .await
        .with_context(|| format!("Update in '{}' failed", collection))?;
    to_pretty(&updated)
}

pub async fn delete(client: &StorageClient, collection: &str, filter: &str) -> Result<String> {
    let filter = parse_where(filter)?;
    let removed = client
        .delete(collection, filter)
        .await
        .with_context(|| format!("Delete in '{}' failed", collection))?;
    Ok(format!("Deleted {} document(s) from '{}'", removed, collection))
}

/// Replace `collection` with the JSON array in `file`.
pub async fn import(client: &StorageClient, collection: &str, file: &Path) -> Result<String> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let documents: Vec<Document> = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a JSON array of documents", file.display()))?;

    client
        .replace_all(collection, &documents)
        .await
        .with_context(|| format!("Import into '{}' failed", collection))?;

    info!("Imported {} documents into '{}'", documents.len(), collection);
    Ok(format!(
        "Imported {} document(s) into '{}'",
        documents.len(),
        collection
    ))
}

/// Export one collection as an array, or every collection keyed by name.
pub async fn export(
    context: &AppContext,
    collection: Option<&str>,
    output: Option<&Path>,
) -> Result<String> {
    let client = context.client();

    let dump = match collection {
        Some(name) => Value::from(export_one(&client, name).await?),
        None => {
            let names = context
                .store()
                .collections()
                .await
                .context("Failed to list collections")?;
            let mut all = Map::new();
            for name in names {
                let documents = export_one(&client, &name).await?;
                all.insert(name, Value::from(documents));
            }
            Value::Object(all)
        }
    };

    let rendered = to_pretty(&dump)?;
    match output {
        Some(path) => {
            tokio::fs::write(path, format!("{}\n", rendered))
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            Ok(format!("Exported to {}", path.display()))
        }
        None => Ok(rendered),
    }
}

async fn export_one(client: &StorageClient, collection: &str) -> Result<Vec<Value>> {
    let documents = client
        .find(collection, WhereClause::all())
        .await
        .with_context(|| format!("Export of '{}' failed", collection))?;
    Ok(documents.iter().map(Document::to_value).collect())
}
