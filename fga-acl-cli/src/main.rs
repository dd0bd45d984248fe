use clap::{Parser, Subcommand};
use fga_acl_cli::commands::{columns, doctor, query};
use fga_acl_cli::profiles::{ProfilesFile, DEFAULT_CONNECTION};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fga-acl", version, about = "Query ACL permissions stored in OpenFGA")]
struct Cli {
    /// Connection profile file (default: ./fga-acl.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the sys_acl_permission table
    Query(query::QueryArgs),
    /// Describe the table columns
    Columns,
    /// Check that a connection profile reaches a usable store
    Doctor {
        /// Connection profile to check
        #[arg(short, long, default_value = DEFAULT_CONNECTION)]
        connection: String,
    },
}

/// Logs go to stderr so that stdout only carries rows. `RUST_LOG` overrides the `warn` default.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Columns => columns::run(),
        Commands::Query(args) => match ProfilesFile::load(cli.config.as_deref()) {
            Ok(profiles) => query::run(&args, &profiles).await,
            Err(e) => Err(e.into()),
        },
        Commands::Doctor { connection } => match ProfilesFile::load(cli.config.as_deref()) {
            Ok(profiles) => doctor::run(&profiles, &connection).await,
            Err(e) => Err(e.into()),
        },
    };

    if let Err(e) = result {
        eprintln!("{}", colored::Colorize::red(format!("Error: {e}").as_str()));
        std::process::exit(1);
    }
}
