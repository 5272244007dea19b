// Copyright (c) 2026 MCP Hub contributors
// SPDX-License-Identifier: MIT
//! # MCP Hub CLI
//!
//! The `mcp-hub` binary hosts the hub as a foreground service and offers
//! config tooling:
//!
//! - `mcp-hub serve`: load configs, connect backends, run until Ctrl-C
//! - `mcp-hub validate`: parse configs and report every warning
//! - `mcp-hub tools`: connect and print the tools visible in a group

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

/// MCP hub: aggregate MCP servers and REST APIs behind one tool API.
#[derive(Parser)]
#[command(name = "mcp-hub")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to mcp_server.json
    #[arg(
        long,
        global = true,
        env = "MCP_HUB_SERVERS",
        default_value = "mcp_server.json"
    )]
    servers: PathBuf,

    /// Path to group.json (optional)
    #[arg(long, global = true, env = "MCP_HUB_GROUPS")]
    groups: Option<PathBuf>,

    /// Path to api-tools.json (optional)
    #[arg(long, global = true, env = "MCP_HUB_API_TOOLS")]
    api_tools: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "MCP_HUB_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the hub in the foreground until interrupted
    Serve {
        /// Expose Prometheus metrics on this port
        #[arg(long, env = "MCP_HUB_METRICS_PORT")]
        metrics_port: Option<u16>,
    },
    /// Parse the config documents and report warnings
    Validate,
    /// Connect and list the tools visible in a group
    Tools {
        /// Group to resolve (defaults to the `default` group)
        #[arg(long)]
        group: Option<String>,
    },
    /// Invoke a single tool and print its result
    Call {
        /// Tool name as listed by `tools`
        tool: String,
        /// Tool arguments as a JSON object
        #[arg(long)]
        args: Option<String>,
        /// Group to call through (defaults to the `default` group)
        #[arg(long)]
        group: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is a developer convenience; absence is fine.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let paths = commands::ConfigPaths {
        servers: cli.servers,
        groups: cli.groups,
        api_tools: cli.api_tools,
    };

    match cli.command {
        Commands::Serve { metrics_port } => commands::serve::run(&paths, metrics_port).await,
        Commands::Validate => commands::validate::run(&paths),
        Commands::Tools { group } => commands::tools::run(&paths, group.as_deref()).await,
        Commands::Call { tool, args, group } => {
            commands::call::run(&paths, &tool, args.as_deref(), group.as_deref()).await
        }
    }
}
