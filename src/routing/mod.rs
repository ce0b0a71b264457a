//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, headers, body)
//!     → matcher.rs (prefix rules)
//!     → classifier.rs (keyword scoring, deadline, fallback)
//!     → Category → service type
//!
//! Headers
//!     → region.rs (hint / forwarded-for / accept-language)
//!     → Option<region>
//! ```
//!
//! # Design Decisions
//! - Classification never fails; failure means `Category::Default`
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always yields the same category

pub mod category;
pub mod classifier;
pub mod matcher;
pub mod region;

pub use category::Category;
pub use classifier::{BoundedClassifier, FixedClassifier, KeywordClassifier, RouteClassifier};
pub use matcher::ClassifyInput;
pub use region::RegionResolver;
