//! Chat orchestration, conversation memory and repository traits for Confab.
//!
//! This crate defines the "ports" (repository and client-builder traits)
//! that the infrastructure layer implements. It depends only on
//! `confab-types`, never on `confab-infra` or any database or HTTP crate.

pub mod app;
pub mod chat;
pub mod llm;
pub mod memory;
pub mod provider;
pub mod repository;
pub mod service;
pub mod stream;

#[cfg(test)]
mod testing;
