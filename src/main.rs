//! CLI for ChatRelay
//!
//! Subcommands:
//! - `serve`: run the relay
//! - `watch`: connect to a relay and print every frame (useful for smoke tests)

use std::path::PathBuf;
use std::sync::Arc;

use chatrelay::config::{Settings, load_config_from};
use chatrelay::driver::Relay;
use chatrelay::ingest::{JsonLinesFeedFactory, StdoutConsole};
use chatrelay::transport::Frame;
use chatrelay::utils::{RelayError, logging};
use clap::{Args, Parser};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "chatrelay", version, about = "Relay a live chat feed to WebSocket subscribers")]
enum Command {
    /// Run the relay
    Serve(ServeArgs),
    /// Connect to a relay and print every frame it sends
    Watch {
        /// Relay URL to connect to
        #[arg(long, default_value = "ws://127.0.0.1:8765")]
        url: String,
    },
}

#[derive(Args)]
struct ServeArgs {
    /// Extra configuration file, layered over config/default
    #[arg(long)]
    config: Option<PathBuf>,
    /// JSON-lines chat feed written by the upstream adapter
    #[arg(long)]
    feed: Option<PathBuf>,
    /// Upstream video id, used for the greeting URL
    #[arg(long)]
    video_id: Option<String>,
    /// Maximum number of chat messages to keep in the buffer
    #[arg(long)]
    max_messages: Option<usize>,
    /// Maximum characters per rendered line
    #[arg(long)]
    max_message_width: Option<usize>,
    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,
    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let code = match Command::parse() {
        Command::Serve(args) => match run_server(args).await {
            Ok(()) => 0,
            Err(e) => {
                logging::init("info");
                error!("Relay failed: {e}");
                1
            }
        },
        Command::Watch { url } => {
            logging::init("info");
            match run_watch(&url).await {
                Ok(()) => 0,
                Err(e) => {
                    error!("Watch failed: {e}");
                    1
                }
            }
        }
    };

    // Exit without waiting on adapter calls still parked on blocking threads.
    std::process::exit(code);
}

fn apply_overrides(settings: &mut Settings, args: &ServeArgs) {
    if let Some(feed) = &args.feed {
        settings.source.feed_path = Some(feed.display().to_string());
    }
    if let Some(video_id) = &args.video_id {
        settings.source.video_id = Some(video_id.clone());
    }
    if let Some(max_messages) = args.max_messages {
        settings.buffer.max_messages = max_messages;
    }
    if let Some(width) = args.max_message_width {
        settings.buffer.max_message_width = width;
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if let Some(level) = &args.log_level {
        settings.log.level = level.clone();
    }
}

async fn run_server(args: ServeArgs) -> Result<(), RelayError> {
    let mut settings = load_config_from(args.config.as_deref())?;
    apply_overrides(&mut settings, &args);
    logging::init(&settings.log.level);

    let feed_path = settings
        .source
        .feed_path
        .clone()
        .ok_or(RelayError::MissingSource)?;
    let url = settings.source_url().ok_or(RelayError::MissingSource)?;
    let factory = Arc::new(JsonLinesFeedFactory::new(feed_path, url));

    let console = settings.ingest.console;
    let mut relay = Relay::new(settings, factory);
    if console {
        relay = relay.with_console(Box::new(StdoutConsole));
    }

    if let Some(report) = relay.run().await? {
        info!(
            accepted = report.stats.accepted,
            broadcasts = report.stats.broadcasts,
            recreations = report.stats.recreations(),
            "relay stopped"
        );
    }
    Ok(())
}

async fn run_watch(url: &str) -> Result<(), Box<dyn std::error::Error>> {
    use futures_util::StreamExt;
    use tokio_tungstenite::connect_async;
    use tokio_tungstenite::tungstenite::Message as WsMessage;

    let (mut ws_stream, _response) = connect_async(url).await?;

    while let Some(msg) = ws_stream.next().await {
        match msg? {
            WsMessage::Text(text) => match Frame::parse(text.as_str()) {
                Some(Frame::Data(source)) => println!("Watching {source}\n"),
                Some(Frame::ChatBuffer(buffer)) => println!("{buffer}\n"),
                None => println!("Unknown frame: {text}"),
            },
            WsMessage::Close(frame) => {
                if let Some(frame) = frame {
                    info!("Relay closed the connection: {}", frame.reason);
                }
                break;
            }
            _ => {}
        }
    }

    Ok(())
}
