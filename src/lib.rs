//! Reelwatch - change reconciliation and notification dedup for a media library
//!
//! This library crate exposes the core functionality for integration testing.

pub mod arr;
pub mod config;
pub mod engine;
pub mod identity;
pub mod ledger;
pub mod library;
pub mod messages;
pub mod notifications;
pub mod quality;
pub mod reconcile;
pub mod season;
pub mod server;
pub mod signals;
pub mod state;
pub mod suppression;
