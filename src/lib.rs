// ABOUTME: Library entry point for the whoop-sync incremental synchronization engine
// ABOUTME: Wires OAuth token lifecycle, paginated API access, and idempotent persistence
//
// SPDX-License-Identifier: MIT OR Apache-2.0

#![deny(unsafe_code)]

//! # whoop-sync
//!
//! Synchronizes personal physiological data (cycles, recovery, sleep,
//! workouts) from the WHOOP developer API into a local SQLite store.
//!
//! ## Architecture
//!
//! - **oauth**: token lifecycle — interactive authorization via a
//!   short-lived loopback listener, refresh with rotating refresh tokens,
//!   durable token persistence
//! - **api**: authenticated, cursor-paginated access to WHOOP resources
//! - **database**: idempotent upsert persistence keyed by natural remote
//!   IDs, plus the watermark queries that drive incremental resume
//! - **sync**: the orchestrator tying the above together per resource type
//!
//! The store is safe to re-sync at any time: records are keyed by their
//! remote IDs and re-ingestion overwrites in place, never duplicates.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use whoop_sync::api::ApiClient;
//! use whoop_sync::config::Config;
//! use whoop_sync::database::Database;
//! use whoop_sync::errors::AppResult;
//! use whoop_sync::oauth::{AuthFlow, TokenStore};
//! use whoop_sync::sync::{SyncEngine, SyncOptions};
//!
//! #[tokio::main]
//! async fn main() -> AppResult<()> {
//!     let config = Config::from_env()?;
//!     let store = TokenStore::new(&config.tokens_file);
//!     let auth = Arc::new(AuthFlow::new(&config, store)?);
//!     let api = ApiClient::new(&config, Arc::clone(&auth));
//!     let db = Database::connect(&config.database_url()).await?;
//!
//!     let engine = SyncEngine::new(&config, auth, api, db);
//!     engine.authenticate().await?;
//!     let report = engine.sync_all(SyncOptions::default()).await?;
//!     println!("synced {} cycles", report.cycles);
//!     Ok(())
//! }
//! ```

/// Authenticated, paginated WHOOP API client
pub mod api;

/// Environment-based configuration
pub mod config;

/// SQLite record store with idempotent upserts and watermark queries
pub mod database;

/// Unified error handling
pub mod errors;

/// Typed WHOOP v2 record structures
pub mod models;

/// OAuth token lifecycle: authorization flow, refresh, persistence
pub mod oauth;

/// Incremental sync orchestration
pub mod sync;
