use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

/// Command-line flags of the node. Anything left out falls back to the
/// config file, then the environment, then the built-in defaults.
#[derive(Debug, Default, Parser)]
#[command(name = "utxo-chain", about = "Run a proof-of-work UTXO ledger node")]
pub struct Opt {
    #[arg(long, help = "Host name or address to bind and advertise")]
    pub host: Option<String>,

    #[arg(long, help = "Port to listen on")]
    pub port: Option<u16>,

    #[arg(
        long = "initial-peer",
        value_name = "URL",
        help = "Peer to join the network through, e.g. http://localhost:8001"
    )]
    pub initial_peer: Option<String>,

    #[arg(long, value_name = "FILE", help = "TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long = "difficulty-bits", help = "Leading zero bits required of block hashes")]
    pub difficulty_bits: Option<u32>,

    #[arg(long = "no-mining", help = "Do not mine blocks")]
    pub no_mining: bool,

    #[arg(long = "no-tx-generation", help = "Do not generate random transactions")]
    pub no_tx_generation: bool,

    #[arg(
        long = "log-level",
        value_name = "LEVEL",
        help = "off, error, warn, info, debug or trace"
    )]
    pub log_level: Option<LevelFilter>,
}
