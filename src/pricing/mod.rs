//! The pure margin-allocation core: no I/O, no shared state, fully
//! synchronous. Services under `crate::services` wire these pieces to the
//! rate table and persistence.

pub mod engine;
pub mod mode;
pub mod undercharge;
pub mod units;
pub mod validate;

pub use engine::{allocate, AllocationError, AllocationRequest, Breakdown, Line, RateCard};
pub use mode::{AllocationMode, Party};
pub use undercharge::{detect, ApprovalCheck};
pub use units::{round_cents, round_cpm, to_cpm, to_total};
pub use validate::{validate, Issue, IssueCode, ValidationReport};
