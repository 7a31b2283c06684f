use anyhow::{Context, Result};
use clap::Parser;
use esw::app::Application;
use esw::cli::Cli;
use esw::config::{Action, Config};
use esw::WriterError;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run(args: Cli) -> Result<()> {
    let mut config = Config::load(args.config_path())?;
    if let Some(action) = args.action {
        config.action = action.into();
    }

    let app = Application::new(config, &args.data_dir)?;
    let connection = app.connect().await?;

    match app.config().action {
        Action::Run => {
            let summary = app.run(connection.client()).await?;
            info!(
                processed = summary.processed,
                skipped = summary.skipped,
                documents = summary.documents,
                "Writer finished"
            );
        }
        Action::Mapping => {
            let report = app
                .mapping_action(connection.client())
                .await
                .context("listing index mappings")?;
            println!("{}", serde_json::to_string(&report)?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    init_tracing(args.debug);

    let code = match run(args).await {
        Ok(()) => 0,
        Err(e) => match e.downcast_ref::<WriterError>() {
            Some(err) if err.is_user_error() => {
                error!("{}", err);
                1
            }
            _ => {
                error!(error = ?e, "Application error: {:#}", e);
                2
            }
        },
    };
    std::process::exit(code);
}
