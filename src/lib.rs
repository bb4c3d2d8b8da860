pub mod change_locator;
pub mod cli;
pub mod config;
pub mod conflict;
pub mod error;
pub mod indexing;
pub mod logging;
pub mod record;
pub mod srcml;
pub mod storage;
pub mod types;
pub mod vcs;

pub use config::Settings;
pub use conflict::{build_report, Conflict, Detector, Report};
pub use error::{ExtractError, IndexError, VcsError};
pub use types::{BranchSpec, LineRange, UnitId};
