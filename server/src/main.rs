use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::network::Server;
use server::shutdown::shutdown_signal;
use shared::transport::udp::UdpHost;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "1234")]
    port: u16,

    /// Ticks per second
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,

    #[arg(short, long, default_value = "32")]
    max_clients: usize,

    /// Mobs spawned at startup
    #[arg(long, default_value = "10")]
    seed_mobs: usize,

    #[arg(long, default_value = "100")]
    max_mobs: usize,

    /// Random respawns stop at this many mobs
    #[arg(long, default_value = "50")]
    mob_soft_cap: usize,

    /// Respawn probability per tick
    #[arg(long, default_value = "0.01")]
    spawn_chance: f64,

    /// How long shutdown waits for clients to acknowledge
    #[arg(long, default_value = "1000")]
    drain_timeout_ms: u64,

    /// RNG seed for reproducible mob spawns
    #[arg(long)]
    seed: Option<u64>,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            tick_rate: args.tick_rate,
            max_clients: args.max_clients,
            seed_mobs: args.seed_mobs,
            max_mobs: args.max_mobs,
            mob_soft_cap: args.mob_soft_cap,
            spawn_chance: args.spawn_chance,
            drain_timeout: Duration::from_millis(args.drain_timeout_ms),
            seed: args.seed,
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = ServerConfig::from(Args::parse());
    let addr = config.bind_addr();

    let transport = match UdpHost::bind_with_config(&addr, config.udp_config()) {
        Ok(transport) => transport,
        Err(e) => {
            error!("{}", e);
            return Err(e.into());
        }
    };
    info!("Server listening on {}", transport.local_addr());

    let mut server = Server::new(transport, config)?;
    server.run(shutdown_signal()?).await?;

    info!("Server stopped");
    Ok(())
}
