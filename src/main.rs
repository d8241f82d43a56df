mod config;
mod db;
mod game;
mod protocol;
mod routes;
mod services;
mod state;

use game::board::{self, Board};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = config::ServerConfig::from_env().expect("invalid configuration");

    if let Some(path) = &config.board_path {
        let custom = Board::load(path).expect("board config failed to load");
        board::install(custom);
        tracing::info!(path = %path.display(), "custom board installed");
    }

    let pool = db::init_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("database init failed");

    let port = config.port;
    let state = state::AppState::new(pool, config);

    // Spawn background snapshot flush.
    let _persistence = services::persistence::spawn_persistence_task(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "monopoly server listening");
    axum::serve(listener, app).await.expect("server failed");
}
