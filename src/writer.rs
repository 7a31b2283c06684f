// src/writer.rs
use crate::elastic::{BulkOperation, Destination, IndexAction};
use crate::error::{Result, WriterError};
use crate::options::LoadOptions;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::io::Read;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Synthetic grouping reported for indices on servers without document types.
pub const TYPELESS_MAPPING_ID: &str = "_doc";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadResult {
    pub documents: usize,
    pub batches: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listing {
    pub id: String,
}

/// Opens a CSV source the way the writer expects it: header row first,
/// short rows reported by the mapper rather than the parser.
pub fn csv_reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b',')
        .has_headers(true)
        .flexible(true)
        .from_reader(input)
}

pub struct Writer<'a, D: Destination + ?Sized> {
    destination: &'a D,
}

impl<'a, D: Destination + ?Sized> Writer<'a, D> {
    pub fn new(destination: &'a D) -> Self {
        Self { destination }
    }

    /// Streams `reader` into the target index in `bulk_size` batches.
    ///
    /// Batches sent before a failure stay committed.
    pub async fn load_file<R: Read>(
        &self,
        mut reader: csv::Reader<R>,
        options: &LoadOptions,
        primary_key: Option<&str>,
    ) -> Result<LoadResult> {
        let header = reader.headers()?.clone();

        if let Err(e) = self.create_index_if_not_exists(options).await {
            warn!(index = options.index(), "Index create error: {}. Ignored.", e);
        }

        let mapper = options.columns_mapper();
        let doc_type = self
            .destination
            .supports_types()
            .then(|| options.doc_type().to_string());
        let mut batch: Vec<BulkOperation> = Vec::with_capacity(options.bulk_size().min(4096));
        let mut result = LoadResult::default();

        for (row, record) in reader.records().enumerate() {
            let record = record?;
            // header occupies line 1
            let line = row as u64 + 2;
            let document = mapper.map_row(&header, &record)?;

            let id = match primary_key {
                Some(column) => {
                    let value = document.get(column).ok_or_else(|| WriterError::MissingIdColumn {
                        column: column.to_string(),
                        line,
                    })?;
                    document_id(value)
                }
                None => None,
            };

            batch.push(BulkOperation {
                action: IndexAction {
                    index: options.index().to_string(),
                    doc_type: doc_type.clone(),
                    id,
                },
                document,
            });

            if batch.len() >= options.bulk_size() {
                self.send_bulk(&batch, result.batches + 1, options).await?;
                result.documents += batch.len();
                result.batches += 1;
                batch.clear();
            }
        }

        if !batch.is_empty() {
            self.send_bulk(&batch, result.batches + 1, options).await?;
            result.documents += batch.len();
            result.batches += 1;
        }

        Ok(result)
    }

    async fn send_bulk(&self, batch: &[BulkOperation], batch_no: usize, options: &LoadOptions) -> Result<()> {
        info!(
            index = options.index(),
            batch = batch_no,
            "Write {} batch {} to {} start",
            options.doc_type(),
            batch_no,
            options.index()
        );
        let started = Instant::now();
        let response = self.destination.bulk(batch).await?;
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "bulk request returned");

        info!(
            index = options.index(),
            batch = batch_no,
            took_ms = response.took,
            "Write {} batch {} to {} took {} ms",
            options.doc_type(),
            batch_no,
            options.index(),
            response.took
        );

        if response.errors {
            for item in response.items.iter().flat_map(|item| item.values()) {
                if !item.is_failed() {
                    continue;
                }
                if let Some(message) = item.error_message() {
                    let id = item.id.as_deref().unwrap_or("");
                    error!(document_id = id, status = item.status, "ES error(document ID '{}'): {}", id, message);
                }
            }
            return Err(WriterError::BulkWriteFailed);
        }

        Ok(())
    }

    async fn create_index_if_not_exists(&self, options: &LoadOptions) -> Result<()> {
        if self.destination.index_exists(options.index()).await? {
            return Ok(());
        }

        let mut properties = Map::new();
        for column in options.columns_mapper().all_columns() {
            if column.is_ignored() {
                continue;
            }
            properties.insert(column.db_name.clone(), json!({ "type": column.r#type }));
        }
        if properties.is_empty() {
            return Ok(());
        }

        let mappings = if self.destination.supports_types() {
            let mut typed = Map::new();
            typed.insert(options.doc_type().to_string(), json!({ "properties": properties }));
            Value::Object(typed)
        } else {
            json!({ "properties": properties })
        };
        debug!(index = options.index(), "creating index");
        self.destination
            .create_index(options.index(), json!({ "mappings": mappings }))
            .await
    }

    pub async fn list_indices(&self) -> Result<Vec<Listing>> {
        Ok(self
            .destination
            .index_names()
            .await?
            .into_iter()
            .map(|id| Listing { id })
            .collect())
    }

    pub async fn list_index_mappings(&self, index: &str) -> Result<Vec<Listing>> {
        let response = self.destination.mapping(index).await?;
        let mappings = match response.pointer(&format!("/{}/mappings", escape_pointer(index))) {
            Some(Value::Object(mappings)) if !mappings.is_empty() => mappings,
            _ => return Ok(Vec::new()),
        };

        if !self.destination.supports_types() {
            return Ok(vec![Listing {
                id: TYPELESS_MAPPING_ID.to_string(),
            }]);
        }
        Ok(mappings.keys().map(|id| Listing { id: id.clone() }).collect())
    }
}

fn document_id(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn escape_pointer(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stringified() {
        assert_eq!(document_id(&json!("a")), Some("a".to_string()));
        assert_eq!(document_id(&json!(12)), Some("12".to_string()));
        assert_eq!(document_id(&Value::Null), None);
    }

    #[test]
    fn pointer_tokens_are_escaped() {
        assert_eq!(escape_pointer("a/b~c"), "a~1b~0c");
    }
}
