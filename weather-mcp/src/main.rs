//! Binary crate for the `weather-mcp` tool server.
//!
//! This crate focuses on:
//! - Loading configuration once at startup
//! - Serving the weather tools to an MCP host over stdio
//! - One-shot tool invocation from the command line

use clap::Parser;

mod cli;
mod server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the protocol, so logs go to stderr
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let cmd = cli::Cli::parse();
    cmd.run().await
}
