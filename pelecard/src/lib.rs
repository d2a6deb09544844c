#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Core types for the Pelecard payment gateway.
//!
//! This crate holds everything that does not touch the network: request
//! and response views, the endpoint table, credentials and their per-tenant
//! resolution, typed request data, hosted payment page URLs, token
//! extraction, billing records and webhook classification. The HTTP client
//! and the webhook router live in `pelecard-http`.
//!
//! # Modules
//!
//! - [`billing`] - Subscription and transaction records
//! - [`config`] - TOML and environment configuration
//! - [`credentials`] - Terminal credentials and gateway environments
//! - [`endpoints`] - Gateway operations and their required fields
//! - [`error`] - Error types shared by all crates
//! - [`events`] - Billing events and listeners
//! - [`payment_page`] - Hosted payment page URLs and iframes
//! - [`request`] - Outgoing request data and key conversion
//! - [`requests`] - Typed request data per operation
//! - [`resolver`] - Per-tenant credential resolution and caching
//! - [`response`] - Gateway reply view
//! - [`token`] - Card token and payment method extraction
//! - [`webhook`] - Inbound notification classification
//!
//! # Feature Flags
//!
//! - `telemetry` - Enables tracing instrumentation for debugging and monitoring

pub mod billing;
pub mod config;
pub mod credentials;
pub mod endpoints;
pub mod error;
pub mod events;
pub mod payment_page;
pub mod request;
pub mod requests;
pub mod resolver;
pub mod response;
pub mod token;
pub mod webhook;

pub use config::PelecardConfig;
pub use credentials::{Credentials, Environment};
pub use endpoints::Endpoint;
pub use error::PelecardError;
pub use request::Request;
pub use response::Response;
