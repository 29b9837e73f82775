//! # prov-api: Binary Entry Point
//!
//! Starts the Axum HTTP server for the provenance engine.
//!
//! | Variable       | Meaning                                        |
//! |----------------|------------------------------------------------|
//! | `PORT`         | Listen port, default 8080                      |
//! | `AUTH_TOKEN`   | Shared bearer secret; unset disables the check |
//! | `PROV_CONFIG`  | Engine YAML configuration file                 |
//! | `PROV_LOG_JSON`| `1` for JSON log lines                         |
//! | `RUST_LOG`     | Log filter, default `info`                     |

use metrics_exporter_prometheus::PrometheusBuilder;

use prov_api::{AppConfig, AppState};
use prov_engine::EngineConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if std::env::var("PROV_LOG_JSON").is_ok_and(|v| v == "1") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);
    let auth_token = std::env::var("AUTH_TOKEN").ok().filter(|t| !t.is_empty());
    if auth_token.is_none() {
        tracing::warn!("AUTH_TOKEN not set; bearer secret check disabled");
    }
    let config = AppConfig { port, auth_token };

    let engine_config = match std::env::var("PROV_CONFIG") {
        Ok(path) => EngineConfig::load(&path).map_err(|e| {
            tracing::error!("failed to load engine configuration from {path}: {e}");
            e
        })?,
        Err(_) => EngineConfig::default(),
    };
    tracing::info!(identity_backend = ?engine_config.identity, "engine configured");

    let prometheus = PrometheusBuilder::new().install_recorder()?;
    let state = AppState::new(config, engine_config)?.with_prometheus(prometheus);
    let app = prov_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("provenance API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
