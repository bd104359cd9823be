//! Ingot binary: serves the workflow engine or talks to a running one.

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use ingot_engine::{MemoryStore, SystemClock};
use ingot_proto::workflow::WorkflowActionsRequest;
use ingot_proto::WorkflowServiceClient;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about = "Ingot bare metal provisioning engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output - shows more detailed logs
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the workflow service and reconciler
    Serve(ServeArgs),
    /// Workflow inspection commands
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommands,
    },
}

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Address to serve the workflow service on
    #[arg(long, env = "INGOT_GRPC_AUTHORITY", default_value = "127.0.0.1:42113")]
    listen: SocketAddr,
}

#[derive(Subcommand, Debug)]
enum WorkflowCommands {
    /// Print the JSON action list of a workflow
    #[command(name = "get-workflow-actions")]
    GetWorkflowActions {
        /// Workflow id
        id: String,

        /// Address of the workflow service
        #[arg(long, env = "INGOT_GRPC_AUTHORITY", default_value = "127.0.0.1:42113")]
        server: String,
    },
}

fn validate_id(id: &str) -> Result<(), String> {
    Uuid::parse_str(id).map_err(|_| format!("invalid uuid: {}", id))?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Fast path: argument validation needs no runtime
    if let Commands::Workflow {
        command: WorkflowCommands::GetWorkflowActions { id, .. },
    } = &cli.command
    {
        if let Err(msg) = validate_id(id) {
            eprintln!("{}", msg);
            std::process::exit(1);
        }
    }

    color_eyre::install()?;

    let default_level = if cli.verbose { "debug" } else { "info" };
    let directives = format!(
        "ingot={level},ingot_server={level},ingot_engine={level},tower=warn,hyper=warn,h2=warn",
        level = default_level
    );
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));
    registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve(args) => {
            let (shutdown_tx, shutdown_rx) = watch::channel(());
            tokio::spawn(async move {
                tokio::signal::ctrl_c()
                    .await
                    .expect("failed to install Ctrl+C handler");
                info!("Ctrl+C received, sending shutdown signal");
                let _ = shutdown_tx.send(());
            });

            let store = Arc::new(MemoryStore::new());
            let clock = Arc::new(SystemClock);
            ingot_server::serve(args.listen, store, clock, shutdown_rx)
                .await
                .map_err(|e| color_eyre::eyre::eyre!(e))?;
        }

        Commands::Workflow {
            command: WorkflowCommands::GetWorkflowActions { id, server },
        } => {
            let mut client =
                WorkflowServiceClient::connect(format!("http://{}", server)).await?;
            let list = client
                .get_workflow_actions(WorkflowActionsRequest { workflow_id: id })
                .await?
                .into_inner();

            let actions: Vec<ingot_engine::WorkflowAction> = list
                .action_list
                .into_iter()
                .map(ingot_server::convert::action_from_proto)
                .collect();
            println!("{}", serde_json::to_string_pretty(&actions)?);
        }
    }

    Ok(())
}
