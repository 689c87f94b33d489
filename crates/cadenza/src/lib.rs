//! Cadenza
//!
//! Interface side of the library scanner. A scan is one long-running host
//! command (`create_library`) plus an event stream (`library_scan`) carrying
//! progress and per-file failures. This crate reconciles the two into a single
//! [`ScanSession`]:
//!
//! - [`outcome`]: folds errors and panics from foreign code into `Result`s
//! - [`error`]: [`TypedError`], the normalised form of any host failure
//! - [`bridge`]: typed `invoke` / `subscribe` over a [`bridge::HostTransport`]
//! - [`scan`]: the [`ScanOrchestrator`] state machine
//! - [`host`]: an in-process host that scans directories for audio files

pub mod bridge;
pub mod cancel;
pub mod config;
pub mod error;
pub mod host;
pub mod outcome;
pub mod scan;

pub use bridge::{Bridge, HostTransport, LocalHost, Subscription};
pub use cancel::CancellationToken;
pub use config::{CadenzaConfig, ConfigError};
pub use error::{ContractViolation, ErrorContext, ErrorKind, TypedError};
pub use host::{HostScanConfig, LibraryHost};
pub use scan::{
    FailureDigest, ItemFailure, ScanError, ScanOrchestrator, ScanRequest, ScanSession, ScanTerminal,
};
