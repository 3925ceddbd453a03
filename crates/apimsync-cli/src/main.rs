//! apimsync CLI - bidirectional sync between APIM and a git-backed tree

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::Result;

mod commands;

#[derive(Parser)]
#[command(name = "apimsync")]
#[command(author = "apimsync Contributors")]
#[command(version)]
#[command(about = "Sync an Azure API Management service with a directory tree", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Snapshot the live service into the canonical directory tree
    Extract {
        /// Management URL of the service instance
        #[arg(long, env = "API_MANAGEMENT_SERVICE_URL")]
        service_url: String,

        /// Service name, for log output
        #[arg(long, env = "API_MANAGEMENT_SERVICE_NAME")]
        service_name: Option<String>,

        /// Bearer token for the management endpoint
        #[arg(long, env = "AZURE_BEARER_TOKEN", hide_env_values = true)]
        token: String,

        /// Directory the tree is written to
        #[arg(long = "output-folder", env = "API_MANAGEMENT_SERVICE_OUTPUT_FOLDER_PATH")]
        output_folder: PathBuf,

        /// Inclusion/override configuration file (YAML or JSON)
        #[arg(long, env = "CONFIGURATION_YAML_PATH")]
        configuration: Option<PathBuf>,

        /// Default API specification format (e.g. OpenApiV3Yaml, Wadl)
        #[arg(long, env = "API_SPECIFICATION_FORMAT")]
        specification_format: Option<String>,
    },

    /// Apply a directory tree (or one commit's diff) to the live service
    Publish {
        /// Management URL of the service instance
        #[arg(long, env = "API_MANAGEMENT_SERVICE_URL")]
        service_url: String,

        /// Service name, for log output
        #[arg(long, env = "API_MANAGEMENT_SERVICE_NAME")]
        service_name: Option<String>,

        /// Bearer token for the management endpoint
        #[arg(long, env = "AZURE_BEARER_TOKEN", hide_env_values = true)]
        token: String,

        /// Directory holding the service tree
        #[arg(long = "service-folder", env = "API_MANAGEMENT_SERVICE_OUTPUT_FOLDER_PATH")]
        service_folder: PathBuf,

        /// Publish only what this commit changed (its parent becomes "previous")
        #[arg(long, env = "COMMIT_ID")]
        commit_id: Option<String>,

        /// Inclusion/override configuration file (YAML or JSON)
        #[arg(long, env = "CONFIGURATION_YAML_PATH")]
        configuration: Option<PathBuf>,
    },
}

fn init_tracing(debug: bool) {
    use tracing_subscriber::EnvFilter;
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.debug);

    match cli.command {
        Commands::Extract {
            service_url,
            service_name,
            token,
            output_folder,
            configuration,
            specification_format,
        } => {
            commands::extract::run(
                &service_url,
                service_name.as_deref(),
                &token,
                &output_folder,
                configuration,
                specification_format.as_deref(),
            )
            .await
        }

        Commands::Publish {
            service_url,
            service_name,
            token,
            service_folder,
            commit_id,
            configuration,
        } => {
            commands::publish::run(
                &service_url,
                service_name.as_deref(),
                &token,
                &service_folder,
                commit_id.as_deref(),
                configuration,
            )
            .await
        }
    }
}
