//! Question bank administration.

use std::sync::Arc;

use quiz_core::types::{Chapter, Question};
use thiserror::Error;

use crate::progress::ProgressStore;
use crate::remote::{CatalogSource, RemoteError};

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("admin login required")]
    NotAuthenticated,

    #[error("{action} failed: {source}")]
    Remote {
        action: &'static str,
        #[source]
        source: RemoteError,
    },
}

/// Admin session over the catalog write operations.
///
/// The logged-in flag lives in the local cache, so it survives restarts
/// and is cleared by a full reset.
pub struct CatalogAdmin {
    source: Arc<dyn CatalogSource>,
    store: Arc<ProgressStore>,
    password: Option<String>,
}

impl CatalogAdmin {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        store: Arc<ProgressStore>,
        password: Option<String>,
    ) -> Self {
        Self {
            source,
            store,
            password,
        }
    }

    /// Check `password` against the configured one and remember a success.
    /// Without a configured password nobody can log in.
    pub fn login(&self, password: &str) -> bool {
        let ok = self.password.as_deref().is_some_and(|expected| expected == password);
        if ok {
            self.store.set_admin_authenticated(true);
        } else {
            tracing::info!("admin login rejected");
        }
        ok
    }

    pub fn logout(&self) {
        self.store.set_admin_authenticated(false);
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.admin_authenticated()
    }

    fn ensure_authenticated(&self) -> Result<(), AdminError> {
        if self.is_authenticated() {
            Ok(())
        } else {
            Err(AdminError::NotAuthenticated)
        }
    }

    fn remote_failed(action: &'static str) -> impl FnOnce(RemoteError) -> AdminError {
        move |source| {
            tracing::warn!(action, error = %source, "catalog update failed");
            AdminError::Remote { action, source }
        }
    }

    pub async fn add_question(&self, question: &Question) -> Result<(), AdminError> {
        self.ensure_authenticated()?;
        self.source
            .insert_question(question)
            .await
            .map_err(Self::remote_failed("add question"))
    }

    pub async fn update_question(&self, question: &Question) -> Result<(), AdminError> {
        self.ensure_authenticated()?;
        self.source
            .update_question(question)
            .await
            .map_err(Self::remote_failed("update question"))
    }

    pub async fn delete_question(&self, question_id: &str) -> Result<(), AdminError> {
        self.ensure_authenticated()?;
        self.source
            .delete_question(question_id)
            .await
            .map_err(Self::remote_failed("delete question"))
    }

    pub async fn add_chapter(&self, chapter: &Chapter) -> Result<(), AdminError> {
        self.ensure_authenticated()?;
        self.source
            .insert_chapter(chapter)
            .await
            .map_err(Self::remote_failed("add chapter"))
    }

    pub async fn delete_chapter(&self, chapter_id: &str) -> Result<(), AdminError> {
        self.ensure_authenticated()?;
        self.source
            .delete_chapter(chapter_id)
            .await
            .map_err(Self::remote_failed("delete chapter"))
    }
}
