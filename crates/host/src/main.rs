use std::path::PathBuf;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use mdcollab_host::api;
use mdcollab_host::config::Config;
use mdcollab_host::session::RoomManager;
use mdcollab_host::ws;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const INDEX_HTML: &str = include_str!("../static/index.html");

/// What the command line asked for
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Serve,
    Help,
    Version,
}

fn print_help() {
    println!("mdcollab - collaborative Markdown editing in the browser");
    println!();
    println!("USAGE:");
    println!("    mdcollab [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("    -c, --config PATH    Config file (default: ~/.config/mdcollab/config.toml)");
    println!("    -b, --bind ADDR      Address to bind");
    println!("        --ws-port PORT   WebSocket port");
    println!("        --http-port PORT HTTP port");
    println!("    -h, --help           Print help information");
    println!("    -v, --version        Print version");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG             Log filter (default: info)");
}

/// Value following a flag
fn flag_value<'a>(args: &'a [String], i: usize, flag: &str) -> anyhow::Result<&'a str> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| anyhow::anyhow!("{flag} requires a value"))
}

/// Explicit config path, if any
fn config_path(args: &[String]) -> anyhow::Result<Option<PathBuf>> {
    for (i, arg) in args.iter().enumerate() {
        if arg == "--config" || arg == "-c" {
            return Ok(Some(PathBuf::from(flag_value(args, i, arg)?)));
        }
    }
    Ok(None)
}

/// Apply command-line overrides on top of the file config
fn apply_args(config: &mut Config, args: &[String]) -> anyhow::Result<Command> {
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => return Ok(Command::Help),
            "--version" | "-v" => return Ok(Command::Version),
            "--config" | "-c" => {
                flag_value(args, i, "--config")?;
                i += 2;
            }
            "--bind" | "-b" => {
                config.server.bind = flag_value(args, i, "--bind")?.to_string();
                i += 2;
            }
            "--ws-port" => {
                config.server.ws_port = flag_value(args, i, "--ws-port")?.parse()?;
                i += 2;
            }
            "--http-port" => {
                config.server.http_port = flag_value(args, i, "--http-port")?.parse()?;
                i += 2;
            }
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(Command::Serve)
}

/// Serve /config.js with dynamic WS port
async fn serve_config_js(State(state): State<api::AppState>) -> impl IntoResponse {
    let js = format!("window.MDCOLLAB_CONFIG = {{ wsPort: {} }};", state.ws_port);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/javascript")],
        js,
    )
}

async fn serve_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging (tracing)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_level(true)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut config = match config_path(&args)? {
        Some(path) => Config::load_from_path(&path)?,
        None => Config::load(),
    };

    match apply_args(&mut config, &args)? {
        Command::Help => {
            print_help();
            return Ok(());
        }
        Command::Version => {
            println!("mdcollab {VERSION}");
            return Ok(());
        }
        Command::Serve => {}
    }

    let rooms = RoomManager::shared(&config.rooms);

    // WebSocket server
    let ws_rooms = rooms.clone();
    let ws_config = config.clone();
    tokio::spawn(async move {
        if let Err(e) = ws::serve(ws_rooms, &ws_config).await {
            tracing::error!(error = %e, "WebSocket server stopped");
        }
    });

    // HTTP server: client page, wasm bundle, REST API
    let state = api::AppState {
        rooms,
        ws_port: config.server.ws_port,
    };
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = Router::new()
        .route("/", get(serve_index))
        .route("/config.js", get(serve_config_js))
        .nest("/api", api::api_router())
        .nest_service("/pkg", ServeDir::new(&config.server.assets_dir))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", config.server.bind, config.server.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        http = %addr,
        ws_port = config.server.ws_port,
        version = VERSION,
        "mdcollab listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("mdcollab")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn flags_override_config() {
        let mut config = Config::default();
        let cmd = apply_args(
            &mut config,
            &args(&["--bind", "0.0.0.0", "--ws-port", "9100", "--http-port", "8100"]),
        )
        .unwrap();
        assert_eq!(cmd, Command::Serve);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.server.ws_port, 9100);
        assert_eq!(config.server.http_port, 8100);
    }

    #[test]
    fn help_and_version() {
        let mut config = Config::default();
        assert_eq!(apply_args(&mut config, &args(&["-h"])).unwrap(), Command::Help);
        assert_eq!(apply_args(&mut config, &args(&["--version"])).unwrap(), Command::Version);
    }

    #[test]
    fn bad_arguments_are_errors() {
        let mut config = Config::default();
        assert!(apply_args(&mut config, &args(&["--ws-port"])).is_err());
        assert!(apply_args(&mut config, &args(&["--ws-port", "high"])).is_err());
        assert!(apply_args(&mut config, &args(&["--frobnicate"])).is_err());
    }

    #[test]
    fn config_path_is_found() {
        assert_eq!(
            config_path(&args(&["--bind", "x", "-c", "/tmp/m.toml"])).unwrap(),
            Some(PathBuf::from("/tmp/m.toml"))
        );
        assert_eq!(config_path(&args(&[])).unwrap(), None);
    }
}
