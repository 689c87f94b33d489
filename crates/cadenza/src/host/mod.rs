//! Host side of the bridge, run in-process.

pub mod library;
pub mod probe;

pub use library::{HostScanConfig, LibraryHost};
pub use probe::AudioFamily;
