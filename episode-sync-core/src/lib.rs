#![doc = "episode-sync-core: pipeline logic for synchronising episode spreadsheets into a content API."]

//! This crate holds everything between the raw CSV text and the remote
//! store interface: parsing, normalization, reference resolution,
//! reconciliation and run orchestration. Transport lives in the CLI crate,
//! behind [`contract::ContentStore`].
//!
//! # Usage
//! Parse input with [`delimited::parse`], then hand the table, a store and a
//! [`config::SyncConfig`] to [`synchronise::synchronise`].

pub mod config;
pub mod contract;
pub mod delimited;
pub mod normalize;
pub mod payload;
pub mod reconcile;
pub mod resolver;
pub mod synchronise;
