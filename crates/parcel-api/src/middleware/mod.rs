//! # Middleware

pub mod metrics;
