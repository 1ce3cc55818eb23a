//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store calls into use-case level APIs.
//! - Keep FFI/UI layers decoupled from storage details.

pub mod notification_service;
pub mod post_service;
pub mod reaction_engine;
