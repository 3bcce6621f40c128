use std::path::PathBuf;

mod output;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use sfenv_core::command::SystemCommandRunner;
use sfenv_core::config::{
    ConnectionSettings, ExportConfig, DEFAULT_API_VERSION, DEFAULT_ENV_FILE,
};
use sfenv_core::envfile::EnvFile;
use sfenv_core::export::SessionExporter;
use sfenv_core::query::AccountQueryRunner;
use sfenv_core::remote::RestConnection;
use tracing::{error, info, warn};

use crate::output::ConsoleOutput;

#[derive(Parser, Debug)]
#[command(author, version, about = "Org session export and account query helper")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the current org session to an env file (`sf org display user --json`)
    Export(ExportArgs),
    /// Load the env file and list accounts through the REST API
    Query(QueryArgs),
}

#[derive(Args, Debug)]
struct ExportArgs {
    /// Destination env file, replaced on every run
    #[arg(long = "env-file", default_value = DEFAULT_ENV_FILE)]
    env_file: PathBuf,
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Env file providing INSTANCE_URL and ACCESS_TOKEN
    #[arg(long = "env-file", default_value = DEFAULT_ENV_FILE)]
    env_file: PathBuf,
    /// REST API version (e.g. 59.0)
    #[arg(long = "api-version", default_value = DEFAULT_API_VERSION)]
    api_version: String,
    /// Output the raw response as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("SFENV_LOG").unwrap_or_else(|_| "info".to_string()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Export(args) => export(args).await,
        Commands::Query(args) => query(args).await,
    }
    Ok(())
}

async fn export(args: ExportArgs) {
    let config = ExportConfig::default().with_env_file(&args.env_file);
    let exporter = SessionExporter::new(SystemCommandRunner, config);

    match exporter.export().await {
        Ok(summary) => {
            println!(
                "Wrote {} session keys to {}.",
                summary.keys.len(),
                summary.path.display()
            );
        }
        Err(err) => error!("session export failed: {err}"),
    }
}

async fn query(args: QueryArgs) {
    match EnvFile::read_from(&args.env_file) {
        Ok(Some(file)) => {
            let applied = file.apply_to_process_env();
            info!(
                path = %args.env_file.display(),
                entries = file.len(),
                applied,
                "loaded env file"
            );
        }
        Ok(None) => warn!(path = %args.env_file.display(), "env file not found"),
        Err(err) => warn!(path = %args.env_file.display(), "unable to read env file: {err}"),
    }

    let settings = ConnectionSettings::from_env().with_api_version(args.api_version);
    let connection = match RestConnection::new(&settings) {
        Ok(connection) => connection,
        Err(err) => {
            error!("failed to build HTTP client: {err}");
            return;
        }
    };
    let runner = AccountQueryRunner::new(connection);

    let mut output = ConsoleOutput::new(args.json);
    runner.run(&mut output).await;
}
