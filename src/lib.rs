//! Bulk-loads CSV tables into Elasticsearch indices.
//!
//! Each configured table is streamed from CSV, mapped column by column
//! through [`mapping::ColumnsMapper`] and written in fixed-size bulk
//! batches by [`writer::Writer`].

pub mod app;
pub mod cli;
pub mod config;
pub mod elastic;
pub mod error;
pub mod mapping;
pub mod options;
pub mod tunnel;
pub mod writer;

pub use error::{Result, WriterError};
