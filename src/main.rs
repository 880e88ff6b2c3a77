// Entry point of the node: resolve the settings, start the background loops
// and serve HTTP until Ctrl-C
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use std::process;
use std::sync::Arc;
use utxo_chain::{
    serve, Config, NodeService, NodeTasks, Opt, PeerGossip, Result, SharedState, Wallet,
};

fn main() {
    let opt = Opt::parse();

    // Info by default; RUST_LOG refines it and --log-level wins over both
    let mut logger = env_logger::Builder::new();
    logger.filter_level(LevelFilter::Info);
    logger.parse_default_env();
    if let Some(level) = opt.log_level {
        logger.filter_level(level);
    }
    logger.init();

    if let Err(e) = run(&opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run(opt: &Opt) -> Result<()> {
    let config = Config::load(opt)?;
    info!(
        "Starting node at {} (difficulty {} bits)",
        config.self_address(),
        config.difficulty_bits
    );

    let state = SharedState::new(config.consensus_params());
    let gossip = Arc::new(PeerGossip::new(&config.self_address(), config.peer_timeout()));
    if let Some(peer) = &config.initial_peer {
        match gossip.bootstrap(peer) {
            Ok(learned) => info!("Joined through {peer}, learned {learned} more peers"),
            Err(e) => warn!("Cannot join through {peer}: {e}"),
        }
    }

    let service = NodeService::new(state, gossip);
    let wallet = Wallet::new()?;
    info!("Node wallet {}", wallet.fingerprint());
    let tasks = NodeTasks::start(service.clone(), wallet, &config)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let served = runtime.block_on(serve(service, &config.bind_address()));

    tasks.stop();
    served
}
