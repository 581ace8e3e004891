//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate record store calls and lock decisions into use-case APIs.
//! - Keep CLI/transport layers decoupled from storage details.

pub mod article_service;
pub mod user_service;
