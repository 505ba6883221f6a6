//! # Keyguard Azure
//!
//! Azure Resource Manager transport for the protection engine.
//!
//! ## Key Components
//!
//! - [`TokenSource`]: cached client-credentials tokens
//! - [`ArmClient`]: bearer-authenticated management requests with a single
//!   retry after a 401
//! - [`AzureMetricsSource`]: HTTP 429 counts from Azure Monitor
//! - [`AzureKeyProvider`]: `listKeys` / `regenerateKey` on Cognitive Services accounts
//!
//! ## Usage
//!
//! ```rust,ignore
//! let client = Arc::new(ArmClient::new(&config.azure)?);
//! client.test_connection().await?;
//!
//! let metrics = AzureMetricsSource::new(client.clone());
//! let provider = AzureKeyProvider::new(client);
//! ```
#![forbid(unsafe_code)]

pub mod client;
pub mod keys;
pub mod metrics;
pub mod resource;
pub mod token;

pub use client::ArmClient;
pub use keys::AzureKeyProvider;
pub use metrics::AzureMetricsSource;
pub use resource::{KEYS_API_VERSION, MANAGEMENT_AUDIENCE, METRICS_API_VERSION, resource_id};
pub use token::{REFRESH_MARGIN, TokenSource};
