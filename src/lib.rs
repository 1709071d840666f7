//! # Cardkeep
//!
//! A local-first business card scanner. A photo of a card goes in; a
//! structured contact record comes out and is stored in SQLite.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌────────┐   ┌───────────┐   ┌────────────┐   ┌──────────┐
//! │  Photo  │──▶│  Crop  │──▶│ Extractor │──▶│ Duplicate? │──▶│  SQLite  │
//! │ (bytes) │   │ 85% W  │   │ (Gemini)  │   │  by name   │   │ contacts │
//! └─────────┘   └────────┘   └───────────┘   └────────────┘   └────┬─────┘
//!                                                                 │
//!                                          ┌──────────────────────┤
//!                                          ▼                      ▼
//!                                     ┌──────────┐          ┌──────────┐
//!                                     │   CLI    │          │   HTTP   │
//!                                     │ (cards)  │          │   API    │
//!                                     └──────────┘          └──────────┘
//! ```
//!
//! Store-independent types (records, geometry, reply parsing, the
//! [`ContactStore`](cardkeep_core::store::ContactStore) trait) live in the
//! `cardkeep-core` crate.
//!
//! ## Quick Start
//!
//! ```bash
//! cards init                          # create database
//! cards scan ./card.jpg               # photo → contact
//! cards list --search acme
//! cards serve                         # start HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite contact store |
//! | [`crop`] | Fixed-ratio pixel cropping |
//! | [`extractor`] | Field extraction backends |
//! | [`pipeline`] | Scan-to-record capture pipeline |
//! | [`contacts`] | CLI commands over the store |
//! | [`server`] | HTTP API |

pub mod config;
pub mod contacts;
pub mod crop;
pub mod db;
pub mod extractor;
pub mod migrate;
pub mod pipeline;
pub mod server;
pub mod sqlite_store;
