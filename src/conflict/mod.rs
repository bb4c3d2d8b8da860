//! Conflict detector (4.G): bounded reverse reachability from changed
//! units, pairwise cross-branch overlap, earliest-common-caller filtering,
//! ranking, and JSON export.

pub mod detector;
pub mod report;

pub use detector::{Conflict, Detector};
pub use report::{build_report, Report};
