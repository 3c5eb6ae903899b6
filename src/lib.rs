//! Inbox Triage — email-to-action decision engine.
//!
//! Takes a normalized email payload, runs it through a three-stage
//! reasoning pipeline (route → generate task → extract meeting), and
//! returns a single validated [`engine::Decision`] record. Every failure
//! mode degrades to a documented fallback: the pipeline never drops an
//! email because the reasoning backend misbehaved.

pub mod categories;
pub mod config;
pub mod content;
pub mod engine;
pub mod error;
pub mod llm;
