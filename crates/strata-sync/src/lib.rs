//! Tick bookkeeping for anti-entropy.
//!
//! For every origin node the store tracks the highest tick it has heard of,
//! the ticks it holds or knows were superseded (`known`), the gaps in between
//! (`missing`) and the gaps peers have advertised (`remote_missing`).
//!
//! - [`RangeSet`]: disjoint closed tick intervals.
//! - [`NodeState`]: one origin's counters, with `known ∪ missing = [1, highest]`.
//! - [`NodeRegistry`]: all origins, plus the `get_state` report and the
//!   per-origin summaries that anti-entropy publishes.

mod error;
mod range;
mod registry;
mod state;


pub use error::SyncError;
pub use range::RangeSet;
pub use registry::{NodeRegistry, OriginSummary, ReportSelect, StateReport};
pub use state::{NodeState, Observation};
