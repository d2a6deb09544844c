#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! HTTP transport for the Pelecard payment gateway.
//!
//! Provides the gateway client and the webhook receiver, each behind its
//! own feature flag.
//!
//! # Modules
//!
//! - [`constants`] - Timeouts, media types and log redaction keys
//! - [`client`] - `reqwest` gateway client (feature: `client`)
//! - [`webhook`] - Axum webhook router (feature: `server`)
//!
//! # Feature Flags
//!
//! - `client` - Gateway client (default)
//! - `server` - Webhook router
//! - `telemetry` - Enables tracing instrumentation for debugging and monitoring

pub mod constants;

#[cfg(feature = "client")]
pub mod client;
#[cfg(feature = "server")]
pub mod webhook;

#[cfg(feature = "client")]
pub use client::PelecardClient;
