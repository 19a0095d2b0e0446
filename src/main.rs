use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use axum::body::Body;
use http::{HeaderValue, StatusCode};
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::{GovernorError, GovernorLayer};

mod config;
mod db;
mod error;
mod middleware;
mod routes;
mod services;
#[cfg(test)]
mod test_utils;

use config::Config;
use services::{init, twitch::IdentityProvider};

pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: Config,
    pub identity: Arc<dyn IdentityProvider>,
}

/// Assemble the application routes. `auth` is passed in so the binary can
/// wrap it in a rate limiter that needs the peer address.
pub fn build_router(state: Arc<AppState>, auth: Router<Arc<AppState>>) -> Router {
    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/auth", auth)
        .nest("/api/checkins", routes::checkins::router())
        .nest("/api/overlay", routes::overlay::router());

    if let Some(dir) = state.config.server.static_dir.as_deref() {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.with_state(state)
        .layer(axum::middleware::from_fn(middleware::csp::csp_middleware))
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "checkin_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    tracing::info!("Starting check-in service");

    let pool = init::init_db(&config).await?;
    let identity = init::init_identity_provider(&config)?;

    let app_state = Arc::new(AppState {
        db: pool,
        config: config.clone(),
        identity,
    });

    let thread_shutdown = Arc::new(AtomicBool::new(false));

    // Per-IP rate limiting for the sign-in endpoints. Rejections use the
    // `AppError` JSON shape plus a Retry-After header.
    let mut auth_builder = GovernorConfigBuilder::default();
    auth_builder.per_second(config.rate_limit.auth_per_second.into());
    auth_builder.burst_size(config.rate_limit.auth_burst);
    auth_builder.key_extractor(SmartIpKeyExtractor);
    auth_builder.error_handler(|error: GovernorError| -> http::Response<Body> {
        match error {
            GovernorError::TooManyRequests { wait_time, headers } => {
                let body = serde_json::json!({
                    "error": {
                        "code": "RATE_LIMITED",
                        "message": "Rate limit exceeded",
                    }
                })
                .to_string();

                let mut resp = http::Response::new(Body::from(body));
                *resp.status_mut() = StatusCode::TOO_MANY_REQUESTS;
                resp.headers_mut().insert(
                    http::header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );

                if let Some(hmap) = headers {
                    for (name, value) in hmap.iter() {
                        resp.headers_mut().append(name.clone(), value.clone());
                    }
                }

                if let Ok(retry_after) = HeaderValue::from_str(&wait_time.to_string()) {
                    resp.headers_mut()
                        .insert(http::header::RETRY_AFTER, retry_after);
                }

                resp
            }
            GovernorError::UnableToExtractKey => {
                let body = serde_json::json!({
                    "error": {
                        "code": "INVALID_REQUEST",
                        "message": "Unable to determine client IP for rate limiting"
                    }
                })
                .to_string();

                let mut resp = http::Response::new(Body::from(body));
                *resp.status_mut() = StatusCode::BAD_REQUEST;
                resp.headers_mut().insert(
                    http::header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                resp
            }
            GovernorError::Other { code, msg, headers } => {
                let body = msg.unwrap_or_else(|| "Rate limiting error".to_string());
                let mut resp = http::Response::new(Body::from(body));
                let status = StatusCode::from_u16(code.as_u16())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                *resp.status_mut() = status;
                if let Some(hmap) = headers {
                    for (name, value) in hmap.iter() {
                        resp.headers_mut().append(name.clone(), value.clone());
                    }
                }
                resp
            }
        }
    });

    let auth_gov_conf = Arc::new(
        auth_builder
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Failed to build auth governor config"))?,
    );

    // Background cleanup for the limiter's per-IP storage
    let auth_cleaner = {
        let limiter = auth_gov_conf.limiter().clone();
        let interval = Duration::from_secs(60);
        let flag = thread_shutdown.clone();
        std::thread::spawn(move || {
            let tick = Duration::from_secs(1);
            loop {
                for _ in 0..interval.as_secs() {
                    if flag.load(Ordering::SeqCst) {
                        tracing::info!("Auth rate limiter cleanup thread exiting");
                        return;
                    }
                    std::thread::sleep(tick);
                }
                tracing::debug!("auth rate limiter size: {}", limiter.len());
                limiter.retain_recent();
            }
        })
    };

    let auth_rate_layer = GovernorLayer {
        config: auth_gov_conf.clone(),
    };

    let frontend_origin = config
        .server
        .frontend_url
        .parse::<HeaderValue>()
        .map_err(|e| anyhow::anyhow!("Invalid FRONTEND_URL for CORS: {}", e))?;

    let app = build_router(
        app_state.clone(),
        routes::auth::router().layer(auth_rate_layer),
    )
    .layer(
        CorsLayer::new()
            .allow_origin(frontend_origin)
            .allow_methods([http::Method::GET, http::Method::POST, http::Method::OPTIONS])
            .allow_headers([
                http::header::CONTENT_TYPE,
                http::header::AUTHORIZATION,
                http::header::ACCEPT,
            ])
            .allow_credentials(true),
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server_fut = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );

    let thread_shutdown_clone = thread_shutdown.clone();
    let signal_fut = async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut term) => {
                    tokio::select! {
                        _ = ctrl_c => {},
                        _ = term.recv() => {},
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to bind SIGTERM, waiting for Ctrl+C only: {}", e);
                    let _ = ctrl_c.await;
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
        }

        tracing::info!("Shutdown signal received");
        thread_shutdown_clone.store(true, Ordering::SeqCst);
    };

    tokio::select! {
        res = server_fut => {
            if let Err(e) = res {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = signal_fut => {
            tracing::info!("Server future dropped; no longer accepting connections");
        }
    }

    thread_shutdown.store(true, Ordering::SeqCst);
    if let Err(e) = auth_cleaner.join() {
        tracing::warn!("Auth cleanup thread join failed: {:?}", e);
    }

    app_state.db.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
