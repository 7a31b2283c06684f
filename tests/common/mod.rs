#![allow(dead_code)]

use async_trait::async_trait;
use esw::elastic::{BulkItem, BulkOperation, BulkResponse, Destination};
use esw::mapping::Record;
use esw::{Result, WriterError};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MockIndex {
    pub docs: BTreeMap<String, Record>,
    pub mapping: Value,
}

#[derive(Debug, Default)]
pub struct MockState {
    pub indices: BTreeMap<String, MockIndex>,
    pub bulk_calls: Vec<Vec<BulkOperation>>,
    pub created: Vec<(String, Value)>,
    next_id: u64,
}

/// In-memory document store that behaves like a single-node server.
#[derive(Default)]
pub struct MockDestination {
    pub typed: bool,
    pub fail_create: bool,
    pub reject: Option<fn(&BulkOperation) -> bool>,
    pub state: Mutex<MockState>,
}

impl MockDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn typed() -> Self {
        Self {
            typed: true,
            ..Self::default()
        }
    }

    pub fn doc_count(&self, index: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .indices
            .get(index)
            .map_or(0, |i| i.docs.len())
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.state.lock().unwrap().bulk_calls.iter().map(Vec::len).collect()
    }

    pub fn add_index(&self, name: &str, mapping: Value) {
        self.state.lock().unwrap().indices.insert(
            name.to_string(),
            MockIndex {
                docs: BTreeMap::new(),
                mapping,
            },
        );
    }
}

#[async_trait]
impl Destination for MockDestination {
    fn supports_types(&self) -> bool {
        self.typed
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn bulk(&self, operations: &[BulkOperation]) -> Result<BulkResponse> {
        let mut state = self.state.lock().unwrap();
        state.bulk_calls.push(operations.to_vec());

        let mut errors = false;
        let mut items = Vec::new();
        for op in operations {
            let item = if self.reject.is_some_and(|reject| reject(op)) {
                errors = true;
                BulkItem {
                    id: op.action.id.clone(),
                    status: 400,
                    error: Some(json!({
                        "type": "mapper_parsing_exception",
                        "reason": "failed to parse"
                    })),
                }
            } else {
                let id = match &op.action.id {
                    Some(id) => id.clone(),
                    None => {
                        state.next_id += 1;
                        format!("auto-{}", state.next_id)
                    }
                };
                state
                    .indices
                    .entry(op.action.index.clone())
                    .or_default()
                    .docs
                    .insert(id.clone(), op.document.clone());
                BulkItem {
                    id: Some(id),
                    status: 201,
                    error: None,
                }
            };
            items.push(HashMap::from([("index".to_string(), item)]));
        }

        Ok(BulkResponse {
            took: 3,
            errors,
            items,
        })
    }

    async fn index_exists(&self, index: &str) -> Result<bool> {
        Ok(self.state.lock().unwrap().indices.contains_key(index))
    }

    async fn create_index(&self, index: &str, body: Value) -> Result<()> {
        if self.fail_create {
            return Err(WriterError::UnexpectedResponse {
                endpoint: format!("/{}", index),
                detail: "400 illegal_argument_exception".to_string(),
            });
        }
        let mut state = self.state.lock().unwrap();
        state.created.push((index.to_string(), body.clone()));
        state.indices.insert(
            index.to_string(),
            MockIndex {
                docs: BTreeMap::new(),
                mapping: body["mappings"].clone(),
            },
        );
        Ok(())
    }

    async fn index_names(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().indices.keys().cloned().collect())
    }

    async fn mapping(&self, index: &str) -> Result<Value> {
        let state = self.state.lock().unwrap();
        let mapping = state
            .indices
            .get(index)
            .map(|i| i.mapping.clone())
            .unwrap_or_else(|| json!({}));
        let mut response = serde_json::Map::new();
        response.insert(index.to_string(), json!({ "mappings": mapping }));
        Ok(Value::Object(response))
    }
}

pub fn csv_rows(header: &str, rows: impl IntoIterator<Item = String>) -> String {
    let mut text = format!("{}\n", header);
    for row in rows {
        text.push_str(&row);
        text.push('\n');
    }
    text
}
