//! deeptube - a subscription feed that lives in a local cache
//!
//! This crate provides:
//! - A client for the YouTube Data API playlist and video endpoints
//! - An aggregation pipeline that resolves subscriptions into playlists,
//!   filters, merges and sorts their videos, and commits them atomically
//! - A SQLite store for video records, the hidden flag, and thumbnails
//! - A thumbnail cache that downloads each image at most once
//! - CLI commands and a view-model for presentation layers

pub mod commands;
pub mod config;
pub mod duration;
pub mod error;
pub mod feed;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod remote;
pub mod store;
pub mod thumbnail;
pub mod timefmt;

pub use config::Config;
pub use error::{Error, Result};
