//! LanceDB connection and table housekeeping helpers.

use arrow_array::{Float32Array, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use lancedb::{connect, Connection, Table};

use ruledb_core::{Error, Result};

use crate::schema::{build_chunk_schema, vector_dimension};

pub(crate) fn store_err(e: impl std::fmt::Display) -> Error {
    Error::Store(e.to_string())
}

pub async fn open_db(uri: &str) -> Result<Connection> {
    connect(uri).execute().await.map_err(store_err)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let names = conn.table_names().execute().await.map_err(store_err)?;
    Ok(names.iter().any(|n| n == name))
}

/// Create an empty chunk table with a `dim`-wide vector column.
pub async fn create_chunk_table(conn: &Connection, name: &str, dim: usize) -> Result<()> {
    let schema = build_chunk_schema(dim);
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await.map_err(store_err)?;
    Ok(())
}

/// Open `name`, or `CollectionNotFound` when it does not exist.
pub async fn open_existing(conn: &Connection, name: &str) -> Result<Table> {
    if !table_exists(conn, name).await? {
        return Err(Error::CollectionNotFound(name.to_string()));
    }
    conn.open_table(name).execute().await.map_err(store_err)
}

pub async fn table_dimension(table: &Table) -> Result<usize> {
    let schema = table.schema().await.map_err(store_err)?;
    vector_dimension(&schema)
        .ok_or_else(|| Error::Store(format!("table '{}' has no vector column", table.name())))
}

pub(crate) fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| Error::Store(format!("column '{}' missing or not utf8", name)))
}

pub(crate) fn int_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
        .ok_or_else(|| Error::Store(format!("column '{}' missing or not int32", name)))
}

/// Cosine distance column added by vector search.
pub(crate) fn distance_column(batch: &RecordBatch) -> Result<&Float32Array> {
    batch
        .column_by_name("_distance")
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| Error::Store("search result has no _distance column".into()))
}
