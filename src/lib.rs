//! # Poster Labels
//!
//! Turns supermarket price lists into two-line poster labels and learns
//! from every correction a user makes during review.
//!
//! ## Architecture
//!
//! ```text
//! price list ──▶ normalize ──▶ extract ──▶ resolve ──▶ group ──▶ labels
//!                                            │  ▲
//!                                      learn ▼  │ read
//!                                       ┌─────────────┐
//!                                       │ corrections │
//!                                       │  (SQLite)   │
//!                                       └─────────────┘
//! ```
//!
//! The algorithms live in `poster-labels-core`; this crate adds the SQLite
//! store, configuration, CSV intake and the `posters` CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! posters init
//! posters process ofertas.csv
//! posters edit ofertas.csv --item 3 --name "REFRIGERANTE COCA-COLA"
//! posters corrections --state all
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite correction store |
//! | [`backend`] | Store selection |
//! | [`import`] | Price-list intake |
//! | [`process_cmd`] | `process` and `edit` commands |
//! | [`learning`] | Learning administration commands |
//! | [`logging`] | Tracing subscriber set-up |

pub mod backend;
pub mod config;
pub mod db;
pub mod import;
pub mod learning;
pub mod logging;
pub mod migrate;
pub mod process_cmd;
pub mod sqlite_store;
