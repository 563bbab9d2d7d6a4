//! Unified CLI for the campus gateway
//!
//! # Usage
//!
//! ## Server Mode
//! ```bash
//! campus-gateway server --port 8080 --host 0.0.0.0
//! ```
//!
//! ## Login Mode
//! ```bash
//! campus-gateway login --name 2021040501 --password secret
//! campus-gateway login --name 2021040501 --lab --verbose
//! ```
//!
//! ## Help and Version
//! ```bash
//! campus-gateway --version
//! campus-gateway --help
//! campus-gateway server --help
//! ```

use clap::{Parser, Subcommand};

use campus_gateway::cli::{
    login::{LoginArgs, run_login_mode},
    server::{ServerArgs, run_server_mode},
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(name = "campus-gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start HTTP server mode
    Server {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Configuration file path
        #[arg(long)]
        config: Option<String>,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },

    /// Log in once and print the cookie jar as JSON
    Login {
        /// Student id
        #[arg(short, long)]
        name: String,

        /// Portal password
        #[arg(short, long, env = "CAS_PASSWORD", hide_env_values = true)]
        password: String,

        /// Derive lab-platform cookies instead of portal cookies
        #[arg(long)]
        lab: bool,

        /// Skip the cached session
        #[arg(short, long)]
        force: bool,

        /// Configuration file path
        #[arg(long)]
        config: Option<String>,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Server {
            port,
            host,
            config,
            verbose,
        } => {
            let args = ServerArgs {
                port,
                host,
                config,
                verbose,
            };
            run_server_mode(args).await
        }
        Commands::Login {
            name,
            password,
            lab,
            force,
            config,
            verbose,
        } => {
            let args = LoginArgs {
                name,
                password,
                lab,
                force,
                config,
                verbose,
            };
            run_login_mode(args).await
        }
    }
}
