//! HTTP/REST API layer for Confab.
//!
//! Axum-based REST API at `/api/v1/` with caller identity from
//! `X-User-Id`, envelope response format, and CORS support.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
