//! # Cardkeep Core
//!
//! Shared, I/O-free logic for Cardkeep: the contact data model, rotation
//! arithmetic, fixed-ratio crop geometry, tolerant parsing of extraction
//! replies, the client-side contact filter, and the store abstraction.
//!
//! This crate contains no tokio runtime, sqlx, HTTP client, or image codec.
//! The `cardkeep` crate provides the SQLite store, the pixel cropper, the
//! remote extractor, and the capture pipeline on top of it.

pub mod filter;
pub mod geometry;
pub mod models;
pub mod reply;
pub mod store;
