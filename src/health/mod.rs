//! Health tracking subsystem.
//!
//! # Data Flow
//! ```text
//! Forward outcome observed (orchestrator)
//!     → metrics_store.rs (counters, latency window, error rate)
//!     → shared cache (best effort)
//!
//! Ranking:
//!     metrics_store.rs snapshot → score.rs → 0..=100
//!
//! Background (sweeper.rs):
//!     Periodic timer → evict stale in-process records
//! ```
//!
//! # Design Decisions
//! - Health is passive: derived from real traffic, no probes
//! - Scores are optimistic for unknown instances
//! - Health state is per instance, not per service type

pub mod metrics_store;
pub mod score;
pub mod sweeper;

pub use metrics_store::{InstanceMetrics, MetricsStore};
pub use score::{health_score, ScoringPolicy};
pub use sweeper::MetricsSweeper;
