//! rollcall-core: attendance domain logic.
//!
//! Per-day CSV record store, the check-in/check-out lateness policy,
//! monthly report aggregation, and the employee roster. Face capture
//! and recognition live elsewhere; nothing in this crate touches a
//! camera or a model.

pub mod config;
pub mod csv;
pub mod policy;
pub mod report;
pub mod roster;
pub mod store;
pub mod types;

pub use config::Config;
pub use policy::{classify, Schedule};
pub use report::{MemberSummary, MonthlyReport};
pub use roster::Roster;
pub use store::RecordStore;
pub use types::{AttendanceEvent, AttendanceStatus, Employee, EventKind};
