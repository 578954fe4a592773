pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::db::Database;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Arc<Config>,
}

/// Build the router with all routes.
pub fn build_router(state: AppState) -> Router {
    // Device-scoped routes
    let device_routes = Router::new()
        .route(
            "/api/progress",
            get(routes::progress::list)
                .put(routes::progress::upsert)
                .delete(routes::progress::delete_all),
        )
        .route(
            "/api/progress/reset-chapter",
            post(routes::progress::reset_chapter),
        )
        .route(
            "/api/exam-history",
            get(routes::exam_history::list)
                .post(routes::exam_history::create)
                .delete(routes::exam_history::delete_all),
        )
        .layer(middleware::from_fn(routes::auth::device_middleware));

    // Catalog administration
    let admin_routes = Router::new()
        .route("/api/chapters", post(routes::catalog::create_chapter))
        .route("/api/chapters/:id", delete(routes::catalog::delete_chapter))
        .route("/api/questions", post(routes::catalog::create_question))
        .route(
            "/api/questions/:id",
            put(routes::catalog::update_question).delete(routes::catalog::delete_question),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            routes::auth::admin_middleware,
        ));

    // Public catalog reads
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/api/chapters", get(routes::catalog::list_chapters))
        .route("/api/questions", get(routes::catalog::list_questions));

    public_routes
        .merge(device_routes)
        .merge(admin_routes)
        .with_state(state)
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    if config.admin_password.is_none() {
        tracing::warn!("ADMIN_PASSWORD not set, catalog administration is disabled");
    }

    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url).await?;

    tracing::info!("Running migrations...");
    db.run_migrations().await?;

    let addr = config.bind_addr();
    let state = AppState {
        db: Arc::new(db),
        config: Arc::new(config),
    };

    let app = build_router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header::AUTHORIZATION, Request, StatusCode},
    };
    use sqlx::postgres::PgPoolOptions;
    use tower::ServiceExt;

    /// Router whose pool never connects; only requests rejected before
    /// touching the database may be sent.
    fn offline_router(admin_password: Option<&str>) -> Router {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://quiz@localhost/unused")
            .unwrap();
        build_router(AppState {
            db: Arc::new(Database::from_pool(pool)),
            config: Arc::new(Config {
                host: "127.0.0.1".into(),
                port: 0,
                database_url: "postgres://quiz@localhost/unused".into(),
                admin_password: admin_password.map(str::to_string),
            }),
        })
    }

    async fn status_of(router: Router, request: Request<Body>) -> StatusCode {
        router.oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::get("/health").body(Body::empty()).unwrap();
        assert_eq!(status_of(offline_router(None), request).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_progress_requires_device_header() {
        let request = Request::get("/api/progress").body(Body::empty()).unwrap();
        assert_eq!(
            status_of(offline_router(None), request).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_blank_device_header_is_rejected() {
        let request = Request::delete("/api/exam-history")
            .header("X-Device-Id", "   ")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            status_of(offline_router(None), request).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_admin_routes_closed_without_password() {
        let request = Request::delete("/api/questions/q1")
            .header(AUTHORIZATION, "Bearer anything")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            status_of(offline_router(None), request).await,
            StatusCode::UNAUTHORIZED
        );
    }

    #[tokio::test]
    async fn test_admin_routes_reject_wrong_token() {
        let request = Request::delete("/api/chapters/ch1")
            .header(AUTHORIZATION, "Bearer guess")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            status_of(offline_router(Some("secret")), request).await,
            StatusCode::UNAUTHORIZED
        );
    }
}
