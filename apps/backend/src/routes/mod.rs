//! HTTP route handlers

pub mod auth;
pub mod catalog;
pub mod exam_history;
pub mod progress;
