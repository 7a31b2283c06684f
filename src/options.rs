// src/options.rs
use crate::error::{Result, WriterError};
use crate::mapping::{ColumnMapping, ColumnsMapper};

pub const DEFAULT_BULK_SIZE: usize = 10_000;

/// Per-table load configuration, read-only once built.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    index: String,
    doc_type: String,
    bulk_size: usize,
    columns: Vec<ColumnMapping>,
}

impl LoadOptions {
    pub fn builder(index: &str, doc_type: &str) -> LoadOptionsBuilder {
        LoadOptionsBuilder {
            index: index.to_string(),
            doc_type: doc_type.to_string(),
            bulk_size: DEFAULT_BULK_SIZE,
            columns: Vec::new(),
        }
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    pub fn doc_type(&self) -> &str {
        &self.doc_type
    }

    pub fn bulk_size(&self) -> usize {
        self.bulk_size
    }

    pub fn columns(&self) -> &[ColumnMapping] {
        &self.columns
    }

    pub fn columns_mapper(&self) -> ColumnsMapper {
        ColumnsMapper::new(&self.columns)
    }
}

pub struct LoadOptionsBuilder {
    index: String,
    doc_type: String,
    bulk_size: usize,
    columns: Vec<ColumnMapping>,
}

impl LoadOptionsBuilder {
    pub fn bulk_size(mut self, bulk_size: usize) -> Self {
        self.bulk_size = bulk_size;
        self
    }

    pub fn columns(mut self, columns: Vec<ColumnMapping>) -> Self {
        self.columns = columns;
        self
    }

    pub fn build(self) -> Result<LoadOptions> {
        if self.bulk_size < 1 {
            return Err(WriterError::Config(format!(
                "Invalid bulk size {}: must be at least 1.",
                self.bulk_size
            )));
        }
        Ok(LoadOptions {
            index: self.index,
            doc_type: self.doc_type,
            bulk_size: self.bulk_size,
            columns: self.columns,
        })
    }
}
