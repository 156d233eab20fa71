//! Pin Deck - GPIO pin dashboard binary
//!
//! Watches a pin controller from the terminal, or runs a simulated one.

use clap::{Args, Parser, Subcommand};
use futures_util::StreamExt;
use pin_deck::client::{self, ClientConfig, ConnectionStatus, DeviceInfo, Session, UiEvent};
use pin_deck::device::{start_device_server, DeviceConfig};
use pin_deck::view::{render, ActionKind, CategoryFilter, DashboardView, StatusIndicator};
use pin_deck::{render_text, PinCatalog, RuntimeStateStore, WebSocketConnector, DEFAULT_DEVICE_PORT};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "pin_deck")]
#[command(about = "Pin Deck - GPIO pin dashboard")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Austin Couch")]
#[command(long_about = "A live dashboard for a microcontroller's GPIO pins, driven over WebSocket")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Device host, optionally with a port
    #[arg(long, default_value_t = format!("localhost:{}", DEFAULT_DEVICE_PORT))]
    host: String,

    /// Connect with wss:// instead of ws://
    #[arg(long)]
    secure: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and watch the dashboard (default)
    Watch(ViewArgs),

    /// Run a simulated device
    Simulate(SimulateArgs),

    /// Print the pin catalog without connecting
    Pins(ViewArgs),
}

#[derive(Args, Clone)]
struct ViewArgs {
    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    format: String,

    /// Category filter: all, power, system, digital or input
    #[arg(long, default_value = "all")]
    filter: String,

    /// Search text matched against pin labels and numbers
    #[arg(long, default_value = "")]
    search: String,
}

impl Default for ViewArgs {
    fn default() -> Self {
        Self {
            format: "pretty".to_string(),
            filter: "all".to_string(),
            search: String::new(),
        }
    }
}

#[derive(Args)]
struct SimulateArgs {
    /// Bind address
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_DEVICE_PORT)]
    port: u16,

    /// Board name reported in snapshots
    #[arg(long, default_value = "esp32s3")]
    target: String,

    /// Disable CORS headers
    #[arg(long)]
    no_cors: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Pretty,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pretty" => Ok(OutputFormat::Pretty),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("Unsupported format: {}. Use 'json' or 'pretty'", other)),
        }
    }
}

/// A line typed by the operator while watching.
#[derive(Debug, Clone, PartialEq, Eq)]
enum OperatorCommand {
    Mode { gpio: String, mode: String },
    Write { gpio: String, next: String },
    Toggle { gpio: String },
    Filter(String),
    Search(String),
    Quit,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    match &cli.command {
        Some(Commands::Watch(args)) => watch_command(&cli, args).await?,
        Some(Commands::Simulate(args)) => simulate_command(args).await?,
        Some(Commands::Pins(args)) => pins_command(args)?,
        None => watch_command(&cli, &ViewArgs::default()).await?,
    }

    Ok(())
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    // stdout carries the dashboard
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

async fn watch_command(cli: &Cli, args: &ViewArgs) -> anyhow::Result<()> {
    let format: OutputFormat = args.format.parse().map_err(anyhow::Error::msg)?;
    let config = ClientConfig::new(&cli.host)
        .with_secure(cli.secure)
        .with_filter(&args.filter)
        .with_search(&args.search);

    info!("Watching {}", config.endpoint_url());
    let session = Session::new(PinCatalog::reference(), &config)?;
    let dashboard = client::spawn(session, WebSocketConnector::new(config.endpoint_url()));

    let mut views = dashboard.views();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            view = views.next() => match view {
                Some(view) => print_view(&view, format)?,
                None => break,
            },
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) if line.trim().is_empty() => {}
                Some(line) => match parse_operator_command(&line) {
                    Ok(OperatorCommand::Quit) => break,
                    Ok(command) => match to_ui_event(command, &dashboard.current_view()) {
                        Ok(event) => {
                            dashboard.send_ui(event);
                        }
                        Err(message) => eprintln!("{}", message),
                    },
                    Err(message) => eprintln!("{}", message),
                },
                None => stdin_open = false,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    dashboard.shutdown().await?;
    Ok(())
}

async fn simulate_command(args: &SimulateArgs) -> anyhow::Result<()> {
    let config = DeviceConfig::new(&args.bind, args.port)
        .with_target(&args.target)
        .with_cors(!args.no_cors);

    info!("Simulated device configuration:");
    info!("  - Bind address: {}", config.bind_address());
    info!("  - CORS enabled: {}", config.enable_cors);
    info!("  - Broadcast interval: {}ms", config.broadcast_interval_ms);
    info!("  - Reserved GPIOs: {:?}", config.reserved_gpios);

    println!("Simulated device on ws://{}{}", config.bind_address(), pin_deck::DEFAULT_WS_PATH);
    start_device_server(config).await?;
    Ok(())
}

fn pins_command(args: &ViewArgs) -> anyhow::Result<()> {
    let format: OutputFormat = args.format.parse().map_err(anyhow::Error::msg)?;
    let category: CategoryFilter = args.filter.parse().map_err(anyhow::Error::msg)?;
    let catalog = PinCatalog::reference();
    let status = ConnectionStatus::Disconnected;

    let view = DashboardView {
        status: StatusIndicator::from(status),
        filter: category.to_string(),
        search: args.search.trim().to_lowercase(),
        device: DeviceInfo::default(),
        grid: render(&catalog, &RuntimeStateStore::new(), status, category, &args.search),
    };
    print_view(&view, format)
}

fn print_view(view: &DashboardView, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Pretty => println!("{}", render_text(view)),
        OutputFormat::Json => println!("{}", serde_json::to_string(view)?),
    }
    Ok(())
}

fn parse_operator_command(line: &str) -> Result<OperatorCommand, String> {
    let mut words = line.split_whitespace();
    let command = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    match (command, args.as_slice()) {
        ("mode", [gpio, mode]) => Ok(OperatorCommand::Mode {
            gpio: gpio.to_string(),
            mode: mode.to_string(),
        }),
        ("write", [gpio, next]) => Ok(OperatorCommand::Write {
            gpio: gpio.to_string(),
            next: next.to_string(),
        }),
        ("toggle", [gpio]) => Ok(OperatorCommand::Toggle {
            gpio: gpio.to_string(),
        }),
        ("filter", [category]) => Ok(OperatorCommand::Filter(category.to_string())),
        ("search", words) => Ok(OperatorCommand::Search(words.join(" "))),
        ("quit", []) | ("exit", []) => Ok(OperatorCommand::Quit),
        _ => Err(format!(
            "Unknown command: {}. Try: mode <gpio> <mode>, write <gpio> <0|1>, toggle <gpio>, filter <category>, search [text], quit",
            line.trim()
        )),
    }
}

/// Toggle presses the card's action button, so it needs the visible view.
fn to_ui_event(command: OperatorCommand, view: &DashboardView) -> Result<UiEvent, String> {
    match command {
        OperatorCommand::Mode { gpio, mode } => Ok(UiEvent::ModeSelected { gpio, mode }),
        OperatorCommand::Write { gpio, next } => Ok(UiEvent::TogglePressed { gpio, next }),
        OperatorCommand::Toggle { gpio } => {
            let card = view
                .grid
                .cards()
                .iter()
                .find(|card| card.action.data_gpio == gpio)
                .ok_or_else(|| format!("GPIO {} is not on the dashboard", gpio))?;

            match (card.action.kind, card.action.enabled, card.action.data_next()) {
                (ActionKind::Toggle, true, Some(next)) => Ok(UiEvent::TogglePressed {
                    gpio,
                    next: next.to_string(),
                }),
                _ => Err(format!("GPIO {}: {}", gpio, card.action.label)),
            }
        }
        OperatorCommand::Filter(category) => Ok(UiEvent::FilterChanged(category)),
        OperatorCommand::Search(text) => Ok(UiEvent::SearchChanged(text)),
        OperatorCommand::Quit => Err("quit".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["pin_deck", "--host", "192.168.1.40", "--secure", "pins"]).unwrap();
        assert_eq!(cli.host, "192.168.1.40");
        assert!(cli.secure);
        assert!(matches!(cli.command, Some(Commands::Pins(_))));
    }

    #[test]
    fn test_default_values() {
        let cli = Cli::try_parse_from(["pin_deck"]).unwrap();
        assert_eq!(cli.host, "localhost:8080");
        assert!(!cli.secure);
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["pin_deck", "simulate"]).unwrap();
        let Some(Commands::Simulate(args)) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.port, DEFAULT_DEVICE_PORT);
        assert_eq!(args.bind, "0.0.0.0");
    }

    #[test]
    fn test_output_format() {
        assert_eq!("json".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_operator_commands() {
        assert_eq!(
            parse_operator_command("mode 14 output"),
            Ok(OperatorCommand::Mode { gpio: "14".into(), mode: "output".into() })
        );
        assert_eq!(
            parse_operator_command("search  io 1 "),
            Ok(OperatorCommand::Search("io 1".into()))
        );
        assert_eq!(parse_operator_command("search"), Ok(OperatorCommand::Search(String::new())));
        assert_eq!(parse_operator_command("quit"), Ok(OperatorCommand::Quit));
        assert!(parse_operator_command("mode 14").is_err());
        assert!(parse_operator_command("reboot").is_err());
    }

    #[test]
    fn test_toggle_needs_enabled_card() {
        let view = DashboardView {
            status: StatusIndicator::from(ConnectionStatus::Disconnected),
            filter: "all".into(),
            search: String::new(),
            device: DeviceInfo::default(),
            grid: render(
                &PinCatalog::reference(),
                &RuntimeStateStore::new(),
                ConnectionStatus::Disconnected,
                CategoryFilter::All,
                "",
            ),
        };

        let err = to_ui_event(OperatorCommand::Toggle { gpio: "14".into() }, &view).unwrap_err();
        assert_eq!(err, "GPIO 14: Offline");
        assert!(to_ui_event(OperatorCommand::Toggle { gpio: "99".into() }, &view).is_err());
    }
}
