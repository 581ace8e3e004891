//! Domain model for collaboratively edited articles.
//!
//! # Responsibility
//! - Define canonical user and article records shared by repo/service layers.
//! - Own normalization and validation rules applied before persistence.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Lock fields on an article are written all-or-none.

pub mod article;
pub mod user;
