use axum::http::StatusCode;
use axum::{
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use minichain_core::chain::Chain;
use minichain_core::constants::DEFAULT_DIFFICULTY;
use serde::Serialize;
use serde_json::Value;
use std::{net::SocketAddr, sync::Arc};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};

#[derive(Parser, Debug)]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// Leading zero hex characters required of every mined block hash
    #[arg(long, default_value_t = DEFAULT_DIFFICULTY)]
    difficulty: usize,
}

// The chain is single-writer; the mutex is the external mutual
// exclusion appends require. Mining happens while the lock is held,
// which serializes POST /blocks.
#[derive(Clone)]
struct AppState {
    chain: Arc<Mutex<Chain>>,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

#[derive(Serialize)]
struct Head {
    height: u64,
    hash: String,
}

#[derive(Serialize)]
struct Validity {
    valid: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let state = AppState {
        chain: Arc::new(Mutex::new(Chain::with_difficulty(args.difficulty))),
    };

    let app = Router::new()
        .route("/health", get(|| async { Json(Health { status: "ok" }) }))
        .route(
            "/chain",
            get({
                let state = state.clone();
                move || async move {
                    let chain = state.chain.lock().await;
                    Json(chain.blocks.clone())
                }
            }),
        )
        .route(
            "/chain/head",
            get({
                let state = state.clone();
                move || async move {
                    let chain = state.chain.lock().await;
                    let (height, hash) = chain
                        .tip()
                        .map(|b| (b.index, b.hash.clone()))
                        .unwrap_or((0, "0".to_string()));
                    Json(Head { height, hash })
                }
            }),
        )
        .route(
            "/chain/valid",
            get({
                let state = state.clone();
                move || async move {
                    let chain = state.chain.lock().await;
                    Json(Validity {
                        valid: chain.validate(),
                    })
                }
            }),
        )
        .route(
            "/blocks",
            post({
                let state = state.clone();
                move |Json(data): Json<Value>| {
                    let state = state.clone();
                    async move {
                        let mut chain = state.chain.lock().await;
                        match chain.append(data) {
                            Ok(block) => (StatusCode::OK, Json(serde_json::json!({ "block": block }))),
                            Err(e) => (
                                StatusCode::INTERNAL_SERVER_ERROR,
                                Json(serde_json::json!({ "error": e.to_string() })),
                            ),
                        }
                    }
                }
            }),
        )
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = args.listen.parse()?;
    info!(
        "minichain-node listening on http://{addr} (difficulty {})",
        args.difficulty
    );
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}
