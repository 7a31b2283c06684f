// src/config.rs
use crate::error::{Result, WriterError};
use crate::mapping::ColumnMapping;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_LOCAL_PORT: u16 = 19200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    Run,
    Mapping,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub action: Action,
    pub elastic: ElasticConfig,
    pub tables: Vec<TableConfig>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    action: Action,
    #[serde(default)]
    parameters: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ElasticConfig {
    host: Option<String>,
    #[serde(rename = "#host")]
    secret_host: Option<String>,
    #[serde(deserialize_with = "de_port")]
    pub port: u16,
    pub username: Option<String>,
    #[serde(rename = "#password")]
    pub password: Option<String>,
    #[serde(rename = "bulkSize")]
    pub bulk_size: Option<i64>,
    pub ssh: Option<SshConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SshConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(rename = "sshHost", default)]
    pub ssh_host: String,
    #[serde(rename = "sshPort", default, deserialize_with = "de_opt_port")]
    pub ssh_port: Option<u16>,
    #[serde(rename = "localPort", default, deserialize_with = "de_opt_port")]
    pub local_port: Option<u16>,
    #[serde(default)]
    pub user: String,
    #[serde(rename = "remoteHost")]
    pub remote_host: Option<String>,
    #[serde(rename = "remotePort", default, deserialize_with = "de_opt_port")]
    pub remote_port: Option<u16>,
    #[serde(default)]
    pub keys: SshKeys,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SshKeys {
    private: Option<String>,
    #[serde(rename = "#private")]
    secret_private: Option<String>,
}

impl SshKeys {
    pub fn private_key(&self) -> Option<&str> {
        self.private.as_deref().or(self.secret_private.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableConfig {
    pub id: Option<String>,
    #[serde(default)]
    pub index: String,
    #[serde(rename = "type", default)]
    pub doc_type: String,
    #[serde(rename = "tableId")]
    pub table_id: Option<String>,
    pub file: Option<String>,
    #[serde(default = "default_export")]
    pub export: bool,
    #[serde(default)]
    pub items: Vec<ColumnMapping>,
}

fn default_export() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortValue {
    Number(u16),
    Text(String),
}

impl PortValue {
    fn into_port<E: serde::de::Error>(self) -> std::result::Result<u16, E> {
        match self {
            PortValue::Number(n) => Ok(n),
            PortValue::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| E::custom(format!("invalid port \"{}\"", s))),
        }
    }
}

fn de_port<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u16, D::Error> {
    PortValue::deserialize(deserializer)?.into_port()
}

fn de_opt_port<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<u16>, D::Error> {
    match Option::<PortValue>::deserialize(deserializer)? {
        Some(PortValue::Text(s)) if s.is_empty() => Ok(None),
        Some(port) => port.into_port().map(Some),
        None => Ok(None),
    }
}

fn invalid(message: impl Into<String>) -> WriterError {
    WriterError::Config(message.into())
}

impl ElasticConfig {
    pub fn host(&self) -> &str {
        self.host
            .as_deref()
            .or(self.secret_host.as_deref())
            .unwrap_or_default()
    }

    pub fn ssh_enabled(&self) -> bool {
        self.ssh.as_ref().is_some_and(|ssh| ssh.enabled)
    }

    fn validate(&self) -> Result<()> {
        match (&self.host, &self.secret_host) {
            (None, None) => return Err(invalid("Elastic config must contain either \"#host\" key.")),
            (Some(_), Some(_)) => {
                return Err(invalid(
                    "Elastic config must contain either \"host\" or \"#host\" key, not both.",
                ))
            }
            _ => {}
        }
        if self.host().is_empty() {
            return Err(invalid("Elastic host cannot be empty."));
        }
        if matches!(self.username.as_deref(), Some("")) {
            return Err(invalid("Elastic username cannot be empty."));
        }
        if matches!(self.password.as_deref(), Some("")) {
            return Err(invalid("Elastic password cannot be empty."));
        }
        if let Some(size) = self.bulk_size {
            if size < 1 {
                return Err(invalid(format!(
                    "Invalid bulkSize {}: must be at least 1.",
                    size
                )));
            }
        }
        if let Some(ssh) = &self.ssh {
            ssh.validate()?;
        }
        Ok(())
    }
}

impl SshConfig {
    fn validate(&self) -> Result<()> {
        if self.ssh_host.is_empty() {
            return Err(invalid("SSH config must contain non-empty \"sshHost\" key."));
        }
        if self.user.is_empty() {
            return Err(invalid("SSH config must contain non-empty \"user\" key."));
        }
        match (&self.keys.private, &self.keys.secret_private) {
            (None, None) => Err(invalid("SSH keys config must contain either \"#private\" key.")),
            (Some(_), Some(_)) => Err(invalid(
                "SSH keys config must contain either \"private\" or \"#private\" key, not both.",
            )),
            _ => Ok(()),
        }
    }
}

impl TableConfig {
    /// Primary key column, if one is configured.
    pub fn id_column(&self) -> Option<&str> {
        self.id.as_deref().filter(|id| !id.is_empty())
    }

    fn validate(&self, position: usize) -> Result<()> {
        let prefix = format!("Table config {}: ", position + 1);
        match (&self.table_id, &self.file) {
            (None, None) => {
                return Err(invalid(format!(
                    "{}Table config must contain either \"tableId\" or \"file\" key.",
                    prefix
                )))
            }
            (Some(_), Some(_)) => {
                return Err(invalid(format!(
                    "{}Table config must contain either \"tableId\" or \"file\" key, not both.",
                    prefix
                )))
            }
            _ => {}
        }
        if self.index.is_empty() {
            return Err(invalid(format!("{}Missing elastic index.", prefix)));
        }
        if self.doc_type.is_empty() {
            return Err(invalid(format!("{}Missing elastic document type.", prefix)));
        }

        let mut seen = HashSet::new();
        for item in &self.items {
            if item.name.is_empty() || item.db_name.is_empty() || item.r#type.is_empty() {
                return Err(invalid(format!(
                    "{}Column mapping items must contain non-empty \"name\", \"dbName\" and \"type\".",
                    prefix
                )));
            }
            if !seen.insert(item.name.as_str()) {
                return Err(invalid(format!(
                    "{}Duplicate column mapping for column \"{}\".",
                    prefix, item.name
                )));
            }
        }
        Ok(())
    }
}

impl Config {
    /// Reads a YAML (`.yml`/`.yaml`) or JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            invalid(format!("Cannot read configuration file {}: {}", path.display(), e))
        })?;

        let is_yaml = path
            .extension()
            .and_then(|s| s.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml"));
        let value: Value = if is_yaml {
            serde_yaml::from_str(&text).map_err(|e| invalid(format!("Invalid configuration: {}", e)))?
        } else {
            serde_json::from_str(&text).map_err(|e| invalid(format!("Invalid configuration: {}", e)))?
        };
        Self::from_value(value)
    }

    /// Accepts both a `tables` list and a single table inlined in `parameters`.
    pub fn from_value(value: Value) -> Result<Self> {
        let raw: RawConfig =
            serde_json::from_value(value).map_err(|e| invalid(format!("Invalid configuration: {}", e)))?;
        let parameters = raw.parameters;

        let elastic = match parameters.get("elastic") {
            Some(elastic) => ElasticConfig::deserialize(elastic)
                .map_err(|e| invalid(format!("Invalid elastic configuration: {}", e)))?,
            None => return Err(invalid("Missing elasticsearch configuration.")),
        };

        let tables = if let Some(tables) = parameters.get("tables") {
            Vec::<TableConfig>::deserialize(tables)
                .map_err(|e| invalid(format!("Invalid tables configuration: {}", e)))?
        } else if ["index", "tableId", "file"].iter().any(|key| parameters.get(key).is_some()) {
            vec![TableConfig::deserialize(&parameters)
                .map_err(|e| invalid(format!("Invalid table configuration: {}", e)))?]
        } else {
            Vec::new()
        };

        Ok(Self {
            action: raw.action,
            elastic,
            tables,
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.elastic.validate()?;
        if self.action == Action::Mapping {
            return Ok(());
        }
        if self.tables.is_empty() {
            return Err(invalid("The \"tables\" configuration cannot be empty."));
        }
        for (position, table) in self.tables.iter().enumerate() {
            table.validate(position)?;
        }
        Ok(())
    }
}
