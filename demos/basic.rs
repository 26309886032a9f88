use axum::{extract::Extension, response::Json, routing::get, Router};
use basic_axum_guard::{
    AdmissionGuard, GuardConfig, OnBlocked, RateLimitConfig, ScreeningConfig, SecurityContext,
    SlowDownConfig, TrackerConfig,
};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "guard-demo")]
#[command(about = "Serves a tiny site behind the admission chain")]
struct Args {
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Requests allowed per identity per window
    #[arg(long, default_value_t = 100)]
    max_requests: u64,

    /// Window length in seconds, shared by the rate limiter and slow-down
    #[arg(long, default_value_t = 900)]
    window: u64,

    /// Requests per window before responses are delayed
    #[arg(long, default_value_t = 100)]
    delay_after: u64,

    /// 403s per identity before each one is logged as an error
    #[arg(long, default_value_t = 5)]
    blocked_threshold: u64,

    /// Also reject GET and POST on `/`
    #[arg(long)]
    block_root: bool,
}

#[derive(Clone)]
struct LogOnBlocked;

#[async_trait::async_trait]
impl OnBlocked for LogOnBlocked {
    async fn on_blocked(&self, ip: &str, path: &str, _context: &SecurityContext) {
        tracing::info!("Rate limit reached: {} attempted {}", ip, path);
    }
}

async fn handler(Extension(ctx): Extension<SecurityContext>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ip": ctx.ip_address,
        "user_agent": ctx.user_agent,
        "message": "Request successful"
    }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let window = Duration::from_secs(args.window);

    let config = GuardConfig {
        screening: ScreeningConfig::recommended().with_root_get_post_blocking(args.block_root),
        rate_limit: RateLimitConfig::new(args.max_requests, window),
        slow_down: SlowDownConfig::new(args.delay_after, window),
        tracker: TrackerConfig::new(args.blocked_threshold),
    };

    let guard = AdmissionGuard::new(config, LogOnBlocked)?;
    let _cleanup = guard.spawn_cleanup(Duration::from_secs(300));

    let app = guard.apply(
        Router::new()
            .route("/", get(handler))
            .route("/api/v1/products", get(handler)),
    );

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", args.port)).await?;
    tracing::info!(
        "Listening on http://127.0.0.1:{} ({} requests per {}s)",
        args.port,
        args.max_requests,
        args.window
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
