//! Canonical names and default values shared by the interface and the host.

/// Command that creates a library and scans its locations.
pub const CREATE_LIBRARY_COMMAND: &str = "create_library";
/// Command that lists the libraries known to the host.
pub const GET_LIBRARIES_COMMAND: &str = "get_libraries";
/// Event stream carrying scan progress and per-item failures.
pub const LIBRARY_SCAN_EVENT: &str = "library_scan";

/// File extensions the library scanner indexes (lowercase, no dot).
pub const SUPPORTED_AUDIO_EXTENSIONS: [&str; 5] = ["wav", "flac", "opus", "ogg", "mp3"];

/// Number of item failures rendered before collapsing into "+N more".
pub const DEFAULT_FAILURE_DISPLAY_LIMIT: usize = 20;

pub const CANCELLED_BY_USER_MESSAGE: &str = "Cancelled by user";
