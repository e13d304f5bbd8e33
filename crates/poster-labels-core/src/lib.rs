//! # Poster Labels Core
//!
//! Shared, runtime-free logic for Poster Labels: the product description
//! pipeline and the learned-correction engine.
//!
//! | Module | Role |
//! |--------|------|
//! | [`normalize`] | Brand-name accent fixes and comparison folding |
//! | [`extract`] | Base name / weight / variety extraction |
//! | [`resolve`] | Four-tier correction resolution and learning |
//! | [`group`] | Family merging of same-name lines |
//! | [`label`] | Two-line, 16-character poster labels |
//! | [`lifecycle`] | Validation, administration and sweeps of corrections |
//! | [`process`] | The end-to-end pipeline and review edits |
//! | [`store`] | The `CorrectionStore` trait and its in-memory backend |
//!
//! This crate contains no tokio, sqlx, or filesystem I/O. The SQLite
//! backend and the CLI live in the `poster-labels` package.

pub mod extract;
pub mod group;
pub mod label;
pub mod lifecycle;
pub mod models;
pub mod normalize;
pub mod process;
pub mod resolve;
pub mod store;
