//! Maturity-State: persistence layer for agent maturity governance
//!
//! This crate owns every record the governance engine reads or writes and
//! the storage seams it talks to. It handles all I/O with SurrealDB and
//! ships an in-memory implementation for tests.
//!
//! ## Key Components
//!
//! - `records`: `AgentRecord`, `ExamRecord`, `PromotionHistoryEntry`,
//!   `EdgeCaseRecord`, `UserRecord` and the `MaturityLevel` ladder
//! - `storage_traits`: async store traits plus the atomic `GovernanceStore`
//! - `SurrealGovernanceStore`: SurrealDB-backed implementation
//! - `fakes::MemoryGovernanceStore`: in-memory implementation

mod error;
pub mod fakes;
pub mod handle;
pub mod migrations;
pub mod records;
mod schema;
pub mod storage_traits;
pub mod surreal_store;

pub use error::{StateError, StorageError};
pub use handle::CloudConfig;
pub use records::{
    clamp_score, AgentRecord, ConstitutionalViolation, EdgeCaseRecord, EdgeCaseResult, ExamRecord,
    MaturityLevel, PromotionHistoryEntry, PromotionType, UnknownLevel, UserRecord, ViolationKind,
    ViolationSeverity,
};
pub use storage_traits::{
    AgentRecordStore, EdgeCaseLibrary, ExamCommit, ExamStore, GovernanceStore, PromotionLedger,
    StorageResult, UserDirectory,
};
pub use surreal_store::SurrealGovernanceStore;

/// Result type for maturity-state operations
pub type Result<T> = std::result::Result<T, StateError>;
