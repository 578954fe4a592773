//! Question catalog with a bundled fallback dataset.

use quiz_core::types::{Chapter, Question};
use serde::{Deserialize, Serialize};

use crate::remote::CatalogSource;

const BUNDLED_JSON: &str = include_str!("../../data/bundled.json");

/// Where the loaded catalog came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogOrigin {
    /// Both chapters and questions came from the record service.
    Remote,
    /// The service answered but one of the lists was empty and was filled
    /// from the bundled dataset.
    Partial,
    /// The service was unreachable; everything is bundled data.
    Bundled,
}

#[derive(Debug, Default, Deserialize)]
struct BundledData {
    chapters: Vec<Chapter>,
    questions: Vec<Question>,
}

/// Parse the bundled dataset. A malformed bundle yields an empty dataset.
fn bundled() -> BundledData {
    serde_json::from_str(BUNDLED_JSON).unwrap_or_else(|e| {
        tracing::error!(error = %e, "bundled question data is malformed");
        BundledData::default()
    })
}

/// In-memory copy of chapters and questions.
#[derive(Debug, Clone)]
pub struct QuestionCatalog {
    chapters: Vec<Chapter>,
    questions: Vec<Question>,
    origin: CatalogOrigin,
}

impl Default for QuestionCatalog {
    fn default() -> Self {
        Self::bundled()
    }
}

impl QuestionCatalog {
    /// Catalog holding only the bundled dataset.
    pub fn bundled() -> Self {
        let data = bundled();
        Self {
            chapters: sorted(data.chapters),
            questions: data.questions,
            origin: CatalogOrigin::Bundled,
        }
    }

    /// Reload everything from `source`, replacing the current copy.
    ///
    /// Any fetch error switches to the bundled dataset. An empty remote list
    /// is replaced by its bundled counterpart on its own.
    pub async fn load_all(&mut self, source: &dyn CatalogSource) -> CatalogOrigin {
        let fetched = match source.fetch_chapters().await {
            Ok(chapters) => source
                .fetch_questions()
                .await
                .map(|questions| (chapters, questions)),
            Err(e) => Err(e),
        };

        let (chapters, questions) = match fetched {
            Ok(lists) => lists,
            Err(e) => {
                tracing::warn!(error = %e, "failed to load catalog, using built-in data");
                *self = Self::bundled();
                return self.origin;
            }
        };

        let mut fallback = None;
        let mut origin = CatalogOrigin::Remote;

        self.chapters = if chapters.is_empty() {
            origin = CatalogOrigin::Partial;
            sorted(fallback.get_or_insert_with(bundled).chapters.clone())
        } else {
            sorted(chapters)
        };
        self.questions = if questions.is_empty() {
            origin = CatalogOrigin::Partial;
            fallback.get_or_insert_with(bundled).questions.clone()
        } else {
            questions
        };
        self.origin = origin;

        tracing::info!(
            chapters = self.chapters.len(),
            questions = self.questions.len(),
            ?origin,
            "catalog loaded"
        );
        origin
    }

    pub fn origin(&self) -> CatalogOrigin {
        self.origin
    }

    /// Chapters ordered by their `order` field.
    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn chapter_ids(&self) -> impl Iterator<Item = &str> {
        self.chapters.iter().map(|c| c.id.as_str())
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn by_id(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    pub fn by_chapter<'a>(&'a self, chapter_id: &'a str) -> impl Iterator<Item = &'a Question> {
        self.questions.iter().filter(move |q| q.chapter_id == chapter_id)
    }
}

fn sorted(mut chapters: Vec<Chapter>) -> Vec<Chapter> {
    chapters.sort_by_key(|c| c.order);
    chapters
}
