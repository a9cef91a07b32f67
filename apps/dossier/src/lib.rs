//! # Dossier
//!
//! The application layer over `dossier-core`: the HTTP API, the CLI and
//! the configuration that wires a store into both.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 apps/dossier (THE BINARY)            │
//! │                                                      │
//! │   ┌─────────────┐            ┌─────────────┐         │
//! │   │    CLI      │            │  HTTP API   │         │
//! │   │   (clap)    │            │   (axum)    │         │
//! │   └──────┬──────┘            └──────┬──────┘         │
//! │          └────────────┬─────────────┘                │
//! │                       ▼                              │
//! │               ┌───────────────┐                      │
//! │               │ dossier-core  │                      │
//! │               │  (THE LOGIC)  │                      │
//! │               └───────────────┘                      │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod cli;
pub mod config;
