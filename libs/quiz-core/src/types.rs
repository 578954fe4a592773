//! Core types for the quiz application.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, Result};

/// Opaque identifier of one installation.
///
/// Generated once on the device and used as the partition key for every
/// remote progress and history record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Maximum accepted length, in characters.
    pub const MAX_LEN: usize = 128;

    /// Generate a fresh random device id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Validate an externally supplied device id.
    pub fn parse(value: &str) -> Result<Self> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(CoreError::EmptyDeviceId);
        }
        let len = trimmed.chars().count();
        if len > Self::MAX_LEN {
            return Err(CoreError::DeviceIdTooLong {
                len,
                max: Self::MAX_LEN,
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Question type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    Single,
    Multiple,
    Judgement,
    Essay,
}

impl Default for QuestionKind {
    fn default() -> Self {
        Self::Single
    }
}

impl QuestionKind {
    /// Get the kind name as stored remotely.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Multiple => "multiple",
            Self::Judgement => "judgement",
            Self::Essay => "essay",
        }
    }

    /// Parse from the stored name.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "single" => Ok(Self::Single),
            "multiple" => Ok(Self::Multiple),
            "judgement" => Ok(Self::Judgement),
            "essay" => Ok(Self::Essay),
            other => Err(CoreError::UnknownQuestionKind(other.to_string())),
        }
    }
}

/// A chapter of the question bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub order: i32,
}

/// A question with its answer key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub chapter_id: String,
    #[serde(rename = "type", default)]
    pub kind: QuestionKind,
    pub question: String,
    #[serde(default, deserialize_with = "deserialize_options")]
    pub options: Vec<String>,
    pub answer: String,
    #[serde(default)]
    pub explanation: String,
}

/// Options arrive either as a JSON array or as a string holding one.
fn deserialize_options<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(options_from_value(value))
}

/// Decode question options leniently; anything unusable becomes empty.
pub fn options_from_value(value: serde_json::Value) -> Vec<String> {
    match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s),
                serde_json::Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        serde_json::Value::String(raw) => serde_json::from_str::<serde_json::Value>(&raw)
            .ok()
            .filter(|v| v.is_array())
            .map(options_from_value)
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// One of the boolean progress flags kept per question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressFlag {
    Practiced,
    Wrong,
    Favorite,
    Mastered,
}

/// Progress of one device on one question, as stored remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub device_id: DeviceId,
    pub question_id: String,
    #[serde(default)]
    pub chapter_id: String,
    #[serde(default)]
    pub is_practiced: bool,
    #[serde(default)]
    pub is_wrong: bool,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub is_mastered: bool,
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// Fresh record with every flag cleared.
    pub fn new(device_id: DeviceId, question_id: impl Into<String>) -> Self {
        Self {
            device_id,
            question_id: question_id.into(),
            chapter_id: String::new(),
            is_practiced: false,
            is_wrong: false,
            is_favorite: false,
            is_mastered: false,
            updated_at: Utc::now(),
        }
    }

    /// Apply an upsert patch. Absent fields keep their value.
    pub fn apply(&mut self, patch: &ProgressPatch, now: DateTime<Utc>) {
        if let Some(chapter_id) = &patch.chapter_id {
            self.chapter_id = chapter_id.clone();
        }
        if let Some(v) = patch.is_practiced {
            self.is_practiced = v;
        }
        if let Some(v) = patch.is_wrong {
            self.is_wrong = v;
        }
        if let Some(v) = patch.is_favorite {
            self.is_favorite = v;
        }
        if let Some(v) = patch.is_mastered {
            self.is_mastered = v;
        }
        self.updated_at = now;
    }
}

/// Upsert body for one (device, question) progress row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressPatch {
    pub question_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_practiced: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_wrong: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_favorite: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_mastered: Option<bool>,
}

impl ProgressPatch {
    pub fn new(question_id: impl Into<String>) -> Self {
        Self {
            question_id: question_id.into(),
            ..Self::default()
        }
    }

    pub fn with_chapter(mut self, chapter_id: impl Into<String>) -> Self {
        self.chapter_id = Some(chapter_id.into());
        self
    }

    pub fn with_flag(mut self, flag: ProgressFlag, value: bool) -> Self {
        let slot = match flag {
            ProgressFlag::Practiced => &mut self.is_practiced,
            ProgressFlag::Wrong => &mut self.is_wrong,
            ProgressFlag::Favorite => &mut self.is_favorite,
            ProgressFlag::Mastered => &mut self.is_mastered,
        };
        *slot = Some(value);
        self
    }

    /// True when the patch would not change anything but `updated_at`.
    pub fn is_empty(&self) -> bool {
        self.chapter_id.is_none()
            && self.is_practiced.is_none()
            && self.is_wrong.is_none()
            && self.is_favorite.is_none()
            && self.is_mastered.is_none()
    }
}

/// A completed exam attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamHistoryEntry {
    pub created_at: DateTime<Utc>,
    /// Percentage of objective questions answered correctly (0-100).
    pub score: u32,
    pub total: u32,
    pub correct: u32,
    pub wrong: u32,
    /// Elapsed time in seconds.
    pub used_time: u32,
}
