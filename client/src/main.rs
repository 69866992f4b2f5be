use clap::Parser;
use client::config::ClientConfig;
use client::input::InputManager;
use client::network::Client;
use client::rendering::{draw_scene, MacroquadCanvas};
use log::{error, info};
use macroquad::prelude::*;
use macroquad::Window;
use shared::transport::udp::{self, UdpHost};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:1234")]
    server: String,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: u32,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: u32,

    /// How long to wait for the server to accept the connection
    #[arg(long, default_value = "5000")]
    connect_timeout_ms: u64,
}

impl From<Args> for ClientConfig {
    fn from(args: Args) -> Self {
        Self {
            server: args.server,
            width: args.width,
            height: args.height,
            connect_timeout: Duration::from_millis(args.connect_timeout_ms),
            ..ClientConfig::default()
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let config = ClientConfig::from(Args::parse());

    info!("Starting client...");
    info!("Connecting to: {}", config.server);

    let server_addr = udp::resolve(&config.server)?;
    let mut transport = UdpHost::bind("0.0.0.0:0")?;
    let server = transport.connect(server_addr)?;

    let mut client = Client::new(transport, server, config.clone());
    client.connect(config.connect_timeout)?;
    info!("Controls: WASD or arrow keys to move");

    let conf = Conf {
        window_title: "Meadow".to_string(),
        window_width: config.width as i32,
        window_height: config.height as i32,
        ..Default::default()
    };

    Window::from_config(conf, run(client, config));
    Ok(())
}

async fn run(mut client: Client<UdpHost>, config: ClientConfig) {
    let mut input_manager = InputManager::new();
    let mut canvas = MacroquadCanvas;
    prevent_quit();

    loop {
        if is_quit_requested() {
            break;
        }

        let input = input_manager.update();
        if let Err(e) = client.frame(&input, get_frame_time()) {
            error!("Frame failed: {}", e);
        }

        draw_scene(
            &mut canvas,
            client.game_state(),
            client.status(),
            (screen_width(), screen_height()),
        );

        next_frame().await;
    }

    info!("Disconnecting...");
    client.shutdown(config.shutdown_timeout);
}
