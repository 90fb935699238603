//! Incremental RSS archiver.
//!
//! Feed items are indexed in SQLite and written one file each under
//! `<raw>/<source>/`; aged files are folded into monthly bundles under
//! `<raw>/archives/<source>/`. A separate backfill pass scores unscored items
//! with a local Ollama model and records the result in a second table.

pub mod ai;
pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod models;
pub mod services;
pub mod store;
