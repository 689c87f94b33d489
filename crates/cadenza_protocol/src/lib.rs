//! Cadenza Host Protocol
//!
//! Wire contract between the interface and the host process that performs
//! library scans. Two primitives cross the boundary:
//!
//! - **Commands**: one-shot request/response calls (`create_library`, `get_libraries`)
//! - **Events**: named, unbounded notification streams (`library_scan`)
//!
//! # Event Envelope
//!
//! ```text
//! { "type": "ok",    "data": { "phase": "reading", "current": 1, "total": 2, "path": "..." } }
//! { "type": "error", "data": { "path": "...", "error": <raw host error> } }
//! ```
//!
//! The raw host error inside an `error` envelope carries no shape guarantee.
//! Hosts built on this crate emit [`HostError`], but consumers must treat the
//! value as untyped JSON and normalise it themselves.

pub mod defaults;
pub mod error;
pub mod paths;
pub mod types;

pub use error::{HostError, HostErrorContext, HostErrorType};
pub use types::{
    CreateLibraryArgs, LibraryOutcome, LibraryScanEvent, LibrarySummary, PathedError, ScanPhase,
    ScanProgress,
};
