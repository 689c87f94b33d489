//! `create_library` / `get_libraries` for the in-process host.

use super::probe::probe_file;
use crate::bridge::{EventEmitter, LocalHost};
use cadenza_protocol::defaults::{
    CREATE_LIBRARY_COMMAND, GET_LIBRARIES_COMMAND, LIBRARY_SCAN_EVENT, SUPPORTED_AUDIO_EXTENSIONS,
};
use cadenza_protocol::{
    CreateLibraryArgs, HostError, HostErrorType, LibraryOutcome, LibraryScanEvent, LibrarySummary,
    ScanPhase, ScanProgress,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// How the host walks scan locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostScanConfig {
    /// Lowercase, without the leading dot
    pub extensions: Vec<String>,
    pub follow_symlinks: bool,
    pub include_hidden: bool,
}

impl Default for HostScanConfig {
    fn default() -> Self {
        Self {
            extensions: SUPPORTED_AUDIO_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            follow_symlinks: false,
            include_hidden: false,
        }
    }
}

impl HostScanConfig {
    fn accepts(&self, extension: &str) -> bool {
        self.extensions.iter().any(|e| e == extension)
    }
}

/// In-memory library registry plus the scanner behind `create_library`.
#[derive(Clone, Default)]
pub struct LibraryHost {
    config: Arc<HostScanConfig>,
    libraries: Arc<Mutex<Vec<LibrarySummary>>>,
}

/// A file selected for indexing.
struct Candidate {
    path: PathBuf,
    extension: String,
}

/// Walk result for one location: candidates in path order plus entries the
/// walker could not read.
struct Discovery {
    candidates: Vec<Candidate>,
    failures: Vec<(String, HostError)>,
}

impl LibraryHost {
    pub fn new(mut config: HostScanConfig) -> Self {
        config.extensions = config
            .extensions
            .iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self {
            config: Arc::new(config),
            libraries: Arc::default(),
        }
    }

    /// Register this host's commands on `host`.
    pub fn install(&self, host: &LocalHost) {
        let this = self.clone();
        host.register_command(CREATE_LIBRARY_COMMAND, move |args, emitter| {
            let this = this.clone();
            async move {
                let args: CreateLibraryArgs =
                    serde_json::from_value(args).map_err(|e| HostError::from(e).to_value())?;
                let outcome = this
                    .create_library(args, &emitter)
                    .await
                    .map_err(|e| e.to_value())?;
                serde_json::to_value(outcome).map_err(|e| HostError::from(e).to_value())
            }
        });

        let this = self.clone();
        host.register_command(GET_LIBRARIES_COMMAND, move |_args, _emitter| {
            let libraries = this.get_libraries();
            async move { serde_json::to_value(libraries).map_err(|e| HostError::from(e).to_value()) }
        });
    }

    pub fn get_libraries(&self) -> Vec<LibrarySummary> {
        self.lock_libraries().clone()
    }

    /// Scan every location, report progress and per-file failures on
    /// `library_scan`, then register the library.
    pub async fn create_library(
        &self,
        args: CreateLibraryArgs,
        emitter: &EventEmitter,
    ) -> Result<LibraryOutcome, HostError> {
        self.ensure_name_free(&args.name)?;

        let mut roots = Vec::with_capacity(args.scan_locations.len());
        for location in &args.scan_locations {
            roots.push(check_location(location).await?);
        }

        info!(library = %args.name, locations = roots.len(), "Creating library");

        let mut track_count = 0u64;
        let mut failed_count = 0u64;

        for root in roots {
            let config = Arc::clone(&self.config);
            let walk_root = root.clone();
            let discovery = tokio::task::spawn_blocking(move || discover(&walk_root, &config))
                .await
                .map_err(task_error)?;

            for (path, error) in discovery.failures {
                failed_count += 1;
                emit(emitter, &LibraryScanEvent::failure(path, error))?;
            }

            let total = discovery.candidates.len() as u64;
            debug!(root = %root.display(), files = total, "Discovered files");

            for (i, candidate) in discovery.candidates.iter().enumerate() {
                let progress = ScanProgress::new(
                    ScanPhase::Reading,
                    i as u64 + 1,
                    total,
                    candidate.path.display().to_string(),
                );
                emit(emitter, &LibraryScanEvent::<HostError>::progress(progress))?;
            }

            for (i, candidate) in discovery.candidates.into_iter().enumerate() {
                let shown = candidate.path.display().to_string();
                let probed = tokio::task::spawn_blocking(move || {
                    probe_file(&candidate.path, &candidate.extension)
                })
                .await
                .map_err(task_error)?;

                match probed {
                    Ok(()) => {
                        track_count += 1;
                        let progress =
                            ScanProgress::new(ScanPhase::Indexing, i as u64 + 1, total, shown);
                        emit(emitter, &LibraryScanEvent::<HostError>::progress(progress))?;
                    }
                    Err(error) => {
                        failed_count += 1;
                        warn!(path = %shown, "Skipping file: {}", error);
                        emit(emitter, &LibraryScanEvent::failure(shown, error))?;
                    }
                }
            }
        }

        let mut libraries = self.lock_libraries();
        if libraries.iter().any(|l| l.name == args.name) {
            return Err(duplicate_name(&args.name));
        }
        let id = libraries.len() as u64 + 1;
        libraries.push(LibrarySummary {
            id,
            name: args.name.clone(),
            scan_locations: args.scan_locations,
            track_count,
        });

        info!(library = %args.name, id, track_count, failed_count, "Library created");
        Ok(LibraryOutcome {
            id,
            name: args.name,
            track_count,
            failed_count,
        })
    }

    fn ensure_name_free(&self, name: &str) -> Result<(), HostError> {
        if self.lock_libraries().iter().any(|l| l.name == name) {
            return Err(duplicate_name(name));
        }
        Ok(())
    }

    fn lock_libraries(&self) -> MutexGuard<'_, Vec<LibrarySummary>> {
        match self.libraries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

fn duplicate_name(name: &str) -> HostError {
    HostError::descriptive(format!("A library with the name {} already exists", name))
}

fn task_error(err: tokio::task::JoinError) -> HostError {
    HostError::new(HostErrorType::Task, "Task: Background scan task failed").with_context(err.to_string())
}

fn emit<E: serde::Serialize>(emitter: &EventEmitter, event: &LibraryScanEvent<E>) -> Result<(), HostError> {
    emitter.emit(LIBRARY_SCAN_EVENT, event).map(|_| ())
}

async fn check_location(location: &str) -> Result<PathBuf, HostError> {
    let metadata = tokio::fs::metadata(location)
        .await
        .map_err(|e| HostError::from(e).append_context(location))?;
    if !metadata.is_dir() {
        return Err(HostError::new(HostErrorType::Io, "IO: Not a directory").with_context(location));
    }
    Ok(PathBuf::from(location))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn discover(root: &Path, config: &HostScanConfig) -> Discovery {
    let mut discovery = Discovery {
        candidates: Vec::new(),
        failures: Vec::new(),
    };

    let walker = WalkDir::new(root)
        .follow_links(config.follow_symlinks)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| config.include_hidden || e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .unwrap_or(root)
                    .display()
                    .to_string();
                discovery.failures.push((path, HostError::from(io::Error::from(err))));
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let extension = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        if config.accepts(&extension) {
            discovery.candidates.push(Candidate {
                path: entry.into_path(),
                extension,
            });
        }
    }

    discovery
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_discover_filters_extensions_and_hidden() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.MP3"), b"ID3").unwrap();
        fs::write(dir.path().join("a.flac"), b"fLaC").unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::create_dir(dir.path().join(".cache")).unwrap();
        fs::write(dir.path().join(".cache").join("c.wav"), b"RIFF").unwrap();

        let found = discover(dir.path(), &HostScanConfig::default());
        let names: Vec<_> = found
            .candidates
            .iter()
            .map(|c| c.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.flac", "b.MP3"]);
        assert_eq!(found.candidates[1].extension, "mp3");
        assert!(found.failures.is_empty());

        let config = HostScanConfig {
            include_hidden: true,
            ..HostScanConfig::default()
        };
        assert_eq!(discover(dir.path(), &config).candidates.len(), 3);
    }

    #[test]
    fn test_configured_extensions_are_normalised() {
        let host = LibraryHost::new(HostScanConfig {
            extensions: vec![".FLAC".into(), "".into()],
            ..HostScanConfig::default()
        });
        assert_eq!(host.config.extensions, vec!["flac".to_string()]);
    }
}
