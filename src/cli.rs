// src/cli.rs
use crate::config::Action;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Data directory holding the config file and `in/tables/`
    #[arg(long, env = "KBC_DATADIR", default_value = "/data")]
    pub data_dir: PathBuf,

    /// Config file, defaults to `<data-dir>/config.json`
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Overrides the action named in the config file
    #[arg(long, value_enum)]
    pub action: Option<CliAction>,

    #[arg(long)]
    pub debug: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CliAction {
    Run,
    Mapping,
}

impl From<CliAction> for Action {
    fn from(action: CliAction) -> Self {
        match action {
            CliAction::Run => Action::Run,
            CliAction::Mapping => Action::Mapping,
        }
    }
}

impl Cli {
    /// Explicit `--config`, else the first of `config.json`, `config.yml`, `config.yaml`.
    pub fn config_path(&self) -> PathBuf {
        if let Some(path) = &self.config {
            return path.clone();
        }
        ["config.json", "config.yml", "config.yaml"]
            .iter()
            .map(|name| self.data_dir.join(name))
            .find(|path| path.exists())
            .unwrap_or_else(|| self.data_dir.join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_arguments() {
        let cli = Cli::parse_from(["esw", "--data-dir", "/tmp/data", "--action", "mapping", "--debug"]);
        assert_eq!(cli.data_dir, PathBuf::from("/tmp/data"));
        assert_eq!(cli.action, Some(CliAction::Mapping));
        assert!(cli.debug);
        assert_eq!(cli.config_path(), PathBuf::from("/tmp/data/config.json"));
    }

    #[test]
    fn explicit_config_wins() {
        let cli = Cli::parse_from(["esw", "--data-dir", "/d", "--config", "/etc/esw.yml"]);
        assert_eq!(cli.config_path(), PathBuf::from("/etc/esw.yml"));
    }
}
