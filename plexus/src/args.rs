use std::path::PathBuf;

use clap::Parser;

/// Plexus LLM gateway
#[derive(Debug, Parser)]
#[command(name = "plexus", about = "Protocol-translating LLM gateway with routing and fallback")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "plexus.toml", env = "PLEXUS_CONFIG")]
    pub config: PathBuf,

    /// Override the listen address
    #[arg(long, env = "PLEXUS_LISTEN")]
    pub listen: Option<std::net::SocketAddr>,
}
