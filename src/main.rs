mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod middleware;
mod models;
mod routes;
mod service;
mod utils;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use dotenv::dotenv;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::filter::LevelFilter;

use config::Config;
use db::db::DBClient;
use db::subscriptiondb::SubscriptionExt;
use routes::create_router;
use service::{chat_service::ChatService, job_service::JobService};

const SUBSCRIPTION_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct AppState {
    pub env: Config,
    pub db_client: Arc<DBClient>,
    pub job_service: JobService,
    pub chat_service: Arc<ChatService>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .init();

    dotenv().ok();

    let config = Config::init();

    let pool = match PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
    {
        Ok(pool) => {
            println!("✅Connection to the database is successful!");
            pool
        }
        Err(err) => {
            println!("🔥 Failed to connect to the database: {:?}", err);
            std::process::exit(1);
        }
    };

    let allowed_origins = vec![
        "http://localhost:5173".parse::<HeaderValue>().unwrap(),
        "http://localhost:8000".parse::<HeaderValue>().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([AUTHORIZATION, ACCEPT, CONTENT_TYPE])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE]);

    let db_client = Arc::new(DBClient::new(pool));
    let app_state = AppState {
        env: config.clone(),
        db_client: db_client.clone(),
        job_service: JobService::new(db_client.clone()),
        chat_service: Arc::new(ChatService::new(db_client.clone())),
    };

    start_subscription_expiry_sweeper(db_client);

    let app = create_router(Arc::new(app_state)).layer(cors);

    println!(
        "{}",
        format!("🚀 Server is running on http://localhost:{}", config.port)
    );

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", &config.port))
        .await
        .unwrap();

    axum::serve(listener, app).await.unwrap();
}

/// Periodically flips subscriptions whose window has passed to expired, so
/// stale quota never entitles a posting.
fn start_subscription_expiry_sweeper(db_client: Arc<DBClient>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(SUBSCRIPTION_SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            match db_client.mark_expired_subscriptions().await {
                Ok(0) => {}
                Ok(expired) => tracing::info!(expired, "subscriptions expired"),
                Err(err) => tracing::error!(error = %err, "subscription expiry sweep failed"),
            }
        }
    });
}
