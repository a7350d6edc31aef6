//! Typed statistics query layer for an NginxPulse backend.
//!
//! - [`api`]: parameter normalization, the dimension schema, the HTTP
//!   transport and the [`api::StatsClient`] façade.
//! - [`auth`]: access-key providers and the 401 notification registry.
//! - [`config`]: layered TOML + environment configuration.
//! - [`logging`]: the local JSONL request log and its summaries.

pub mod api;
pub mod auth;
pub mod config;
pub mod logging;
