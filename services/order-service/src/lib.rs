//! Order Service
//!
//! Accepts order-creation requests over HTTP, records each order in a
//! key-value store and announces it on a message queue.
//!
//! # Architecture
//!
//! ```text
//!   POST /orders
//!        │
//!   ┌────▼─────┐
//!   │Ingestion │  ← validate, assign id, encode once
//!   └────┬─────┘
//!        │ same bytes
//!   ┌────▼────┐    ┌───────┐
//!   │  Store  ├───►│ Queue │  (publish only after the store write)
//!   └─────────┘    └───────┘
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod ingestion;
pub mod models;
pub mod openapi;
pub mod queue;
pub mod router;
pub mod shutdown;
pub mod state;
pub mod store;

// Service version
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");
