//! Common test utilities and fixtures for integration tests.
//!
//! # Requirements
//! Integration tests require a PostgreSQL database (set DATABASE_URL).

#![allow(dead_code)]

pub mod fixtures;

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;

use quiz_backend::config::Config;
use quiz_backend::db::Database;
use quiz_backend::models::DeviceId;
use quiz_backend::{build_router, AppState};

/// Admin password configured for every test router.
pub const ADMIN_PASSWORD: &str = "test-admin-password";

/// Test context containing database connection and router.
pub struct TestContext {
    pub db: Arc<Database>,
    app: Router,
}

impl TestContext {
    /// Create a new test context.
    ///
    /// # Panics
    /// Panics if DATABASE_URL is not set or database connection fails.
    pub async fn new() -> Self {
        dotenvy::dotenv().ok();

        let database_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");

        let db = Database::connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        db.run_migrations()
            .await
            .expect("Failed to run migrations");

        let db = Arc::new(db);
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_url,
            admin_password: Some(ADMIN_PASSWORD.to_string()),
        };

        let app = build_router(AppState {
            db: db.clone(),
            config: Arc::new(config),
        });

        Self { db, app }
    }

    /// Get the router for use with axum-test.
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    /// Fresh device id that no other test uses.
    pub fn new_device() -> DeviceId {
        DeviceId::parse(&format!("test-{}", uuid::Uuid::new_v4())).unwrap()
    }

    /// `X-Device-Id` header for a device.
    pub fn device_header(device: &DeviceId) -> (HeaderName, HeaderValue) {
        (
            HeaderName::from_static("x-device-id"),
            HeaderValue::from_str(device.as_str()).unwrap(),
        )
    }

    /// `Authorization` header carrying `token`.
    pub fn admin_header(token: &str) -> (HeaderName, HeaderValue) {
        (
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        )
    }

    /// Clean up progress and exam history of a device.
    pub async fn cleanup_device(&self, device: &DeviceId) {
        let _ = sqlx::query("DELETE FROM progress WHERE device_id = $1")
            .bind(device.as_str())
            .execute(self.db.pool())
            .await;

        let _ = sqlx::query("DELETE FROM exam_history WHERE device_id = $1")
            .bind(device.as_str())
            .execute(self.db.pool())
            .await;
    }

    /// Clean up catalog rows created by a test.
    pub async fn cleanup_catalog(&self, chapter_id: &str) {
        let _ = sqlx::query("DELETE FROM questions WHERE chapter_id = $1")
            .bind(chapter_id)
            .execute(self.db.pool())
            .await;

        let _ = sqlx::query("DELETE FROM chapters WHERE id = $1")
            .bind(chapter_id)
            .execute(self.db.pool())
            .await;
    }
}
