// src/app.rs
use crate::config::{Config, TableConfig};
use crate::elastic::{Credentials, Destination, ElasticClient};
use crate::error::{Result, WriterError};
use crate::options::LoadOptions;
use crate::tunnel::{SshTunnel, TunnelParams};
use crate::writer::{csv_reader, Listing, LoadResult, Writer};
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub skipped: usize,
    pub documents: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingReport {
    pub indices: Vec<IndexReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub id: String,
    pub mappings: Vec<Listing>,
}

/// A connected destination client. Holds the tunnel, if any, open until dropped.
pub struct Connection {
    client: ElasticClient,
    _tunnel: Option<SshTunnel>,
}

impl Connection {
    pub fn client(&self) -> &ElasticClient {
        &self.client
    }
}

enum TableOutcome {
    Skipped,
    Loaded(LoadResult),
}

pub struct Application {
    config: Config,
    data_dir: PathBuf,
}

impl Application {
    pub fn new<P: Into<PathBuf>>(config: Config, data_dir: P) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            data_dir: data_dir.into(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn tables_dir(&self) -> PathBuf {
        self.data_dir.join("in").join("tables")
    }

    /// Opens the optional tunnel, then connects to and pings the server.
    pub async fn connect(&self) -> Result<Connection> {
        let elastic = &self.config.elastic;
        let destination = format!("{}:{}", elastic.host(), elastic.port);
        let (mut host, mut port) = (elastic.host().to_string(), elastic.port);

        let tunnel = match elastic.ssh.as_ref().filter(|ssh| ssh.enabled) {
            Some(ssh) => {
                let params = TunnelParams::resolve(ssh, &host, port);
                let tunnel = SshTunnel::open(&params, ssh.keys.private_key().unwrap_or_default()).await?;
                let (local_host, local_port) = tunnel.local_endpoint();
                host = local_host.to_string();
                port = local_port;
                Some(tunnel)
            }
            None => None,
        };

        let credentials = match (&elastic.username, &elastic.password) {
            (Some(username), Some(password)) => Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            }),
            _ => None,
        };

        let connection_failed = |e: WriterError| {
            debug!(error = %e, "connection check failed");
            WriterError::Connection {
                destination: destination.clone(),
            }
        };
        let client = ElasticClient::connect(&host, port, credentials)
            .await
            .map_err(connection_failed)?;
        client.ping().await.map_err(connection_failed)?;
        info!(version = client.version(), "Connected to {}", destination);

        Ok(Connection {
            client,
            _tunnel: tunnel,
        })
    }

    /// Loads every configured table in order, stopping at the first failure.
    pub async fn run<D: Destination + ?Sized>(&self, destination: &D) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        for table in &self.config.tables {
            match self.run_table(destination, table).await? {
                TableOutcome::Skipped => summary.skipped += 1,
                TableOutcome::Loaded(result) => {
                    summary.processed += 1;
                    summary.documents += result.documents;
                }
            }
        }
        Ok(summary)
    }

    async fn run_table<D: Destination + ?Sized>(&self, destination: &D, table: &TableConfig) -> Result<TableOutcome> {
        let (prefix, path) = match (&table.table_id, &table.file) {
            (Some(table_id), _) => (
                format!("Table {} - ", table_id),
                self.tables_dir().join(format!("{}.csv", table_id)),
            ),
            (None, Some(file)) => (format!("File {} - ", file), self.tables_dir().join(file)),
            (None, None) => {
                return Err(WriterError::Config(
                    "Table config must contain either \"tableId\" or \"file\" key.".to_string(),
                ))
            }
        };

        if !table.export {
            info!("{}Skipped", prefix);
            return Ok(TableOutcome::Skipped);
        }
        info!("{}Export start", prefix);

        if table.table_id.is_none() && !has_csv_extension(&path) {
            return Err(WriterError::InvalidSource(format!(
                "{}Export failed. Only csv files are supported",
                prefix
            )));
        }

        let mut builder = LoadOptions::builder(&table.index, &table.doc_type).columns(table.items.clone());
        if let Some(size) = self.config.elastic.bulk_size {
            builder = builder.bulk_size(size.max(0) as usize);
        }
        let options = builder.build()?;

        let file = File::open(&path).map_err(|e| {
            WriterError::InvalidSource(format!(
                "{}Cannot open source file \"{}\": {}",
                prefix,
                path.display(),
                e
            ))
        })?;

        let result = Writer::new(destination)
            .load_file(csv_reader(BufReader::new(file)), &options, table.id_column())
            .await
            .map_err(|e| if e.is_user_error() { e.in_table(&prefix) } else { e })?;

        info!(
            documents = result.documents,
            batches = result.batches,
            "{}Export finished",
            prefix
        );
        Ok(TableOutcome::Loaded(result))
    }

    /// Lists every index with its type groupings.
    pub async fn mapping_action<D: Destination + ?Sized>(&self, destination: &D) -> Result<MappingReport> {
        let writer = Writer::new(destination);
        let mut indices = Vec::new();
        for index in writer.list_indices().await? {
            let mappings = writer.list_index_mappings(&index.id).await?;
            indices.push(IndexReport { id: index.id, mappings });
        }
        Ok(MappingReport { indices })
    }
}

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}
