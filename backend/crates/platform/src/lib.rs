//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Clock abstraction (system and manual clocks)
//! - Client IP extraction
//! - Random secrets and one-time codes
//! - Key-value store (Redis and in-memory)
//! - Password hashing (Argon2id)
//! - Fixed-window rate limiting

pub mod client;
pub mod clock;
pub mod crypto;
pub mod kv;
pub mod password;
pub mod rate_limit;
