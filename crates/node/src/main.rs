mod player;

use std::net::SocketAddr;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use player::SimulatedPlayer;
use wallsync::{DEFAULT_PORT, Node, NodeConfig, Role};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RoleArg {
    Host,
    Side,
    Bottom,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Host => Role::Host,
            RoleArg::Side => Role::Side,
            RoleArg::Bottom => Role::Bottom,
        }
    }
}

#[derive(Parser)]
#[command(name = "wallsync-node")]
#[command(about = "Synchronized video wall playback node")]
struct Args {
    /// Which display this node drives
    #[arg(short, long, value_enum)]
    role: RoleArg,

    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Endpoint of the host node (ignored when running as host)
    #[arg(long, default_value_t = SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))]
    host_addr: SocketAddr,

    /// Seconds between barrier opening and scheduled playback start
    #[arg(long, default_value_t = 2.0)]
    start_delay: f64,

    /// Seconds between sync broadcasts during playback
    #[arg(long, default_value_t = 0.5)]
    sync_interval: f64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let bind_addr: SocketAddr = format!("{}:{}", args.bind, args.port)
        .parse()
        .context("invalid bind address")?;

    let config = NodeConfig {
        role: args.role.into(),
        bind_addr,
        host_addr: args.host_addr,
        start_delay_secs: args.start_delay,
        sync_interval_secs: args.sync_interval,
    };

    let mut node = Node::new(config, SimulatedPlayer::new())
        .with_context(|| format!("failed to bind udp socket on {}", bind_addr))?;

    let running = node.running();
    ctrlc::set_handler(move || {
        log::info!("shutdown signal received");
        running.store(false, Ordering::SeqCst);
    })
    .context("failed to install shutdown handler")?;

    node.run();
    log::info!("node shutting down");

    Ok(())
}
