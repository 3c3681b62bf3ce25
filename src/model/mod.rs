//! Core data model types for extracted messages, attachments, and run progress.

pub mod attachment;
pub mod message;
pub mod progress;
