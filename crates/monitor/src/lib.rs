//! # Keyguard Monitor
//!
//! Bounded polling loop that samples rate-limit error counts for a set of
//! resources and hands bursts to the [`ProtectionEngine`](keyguard_credential::ProtectionEngine).
//!
//! ## Key Components
//!
//! - [`PollingScheduler`]: concurrent per-cycle checks and the fixed-cadence run loop
//! - [`CycleReport`]: what one cycle observed and did
//! - [`MonitoringStats`], [`ProtectionStatusReport`]: read-only projections for hosts
//! - [`EventLog`]: bounded log of protection actions
//!
//! ## Usage
//!
//! ```rust,ignore
//! let scheduler = PollingScheduler::new(engine, metrics, resources);
//! let summary = scheduler
//!     .run_for(Duration::from_secs(55 * 60), CancellationToken::new())
//!     .await;
//! scheduler.engine().drain().await;
//! ```
#![forbid(unsafe_code)]

pub mod event_log;
pub mod report;
pub mod scheduler;
pub mod stats;

pub use event_log::{EVENT_LOG_CAPACITY, EventLog, ProtectionAction, ProtectionRecord};
pub use report::{CycleReport, DisabledCredential, ResourceCheck};
pub use scheduler::{CRITICAL_RESOURCE_COUNT, PollingScheduler};
pub use stats::{
    AccountSafetyMetrics, MonitoringConfiguration, MonitoringStats, ProtectionAnalysis,
    ProtectionEfficiency, ProtectionHistory, ProtectionStatusReport, RunSummary, SystemStatus,
};
