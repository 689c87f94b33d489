//! Container header check for audio files.

use cadenza_protocol::{HostError, HostErrorType};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

const HEADER_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFamily {
    Flac,
    Wav,
    Ogg,
    Mpeg,
}

impl AudioFamily {
    /// Family expected for a lowercase extension. `None` for extensions with
    /// no known header.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "flac" => Some(Self::Flac),
            "wav" => Some(Self::Wav),
            "ogg" | "opus" => Some(Self::Ogg),
            "mp3" => Some(Self::Mpeg),
            _ => None,
        }
    }

    /// Family whose magic `header` starts with.
    pub fn detect(header: &[u8]) -> Option<Self> {
        if header.starts_with(b"fLaC") {
            Some(Self::Flac)
        } else if header.len() >= HEADER_LEN && &header[0..4] == b"RIFF" && &header[8..12] == b"WAVE" {
            Some(Self::Wav)
        } else if header.starts_with(b"OggS") {
            Some(Self::Ogg)
        } else if header.starts_with(b"ID3") || (header.len() >= 2 && header[0] == 0xFF && header[1] & 0xE0 == 0xE0) {
            Some(Self::Mpeg)
        } else {
            None
        }
    }
}

impl fmt::Display for AudioFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Flac => "FLAC",
            Self::Wav => "WAV",
            Self::Ogg => "Ogg",
            Self::Mpeg => "MPEG",
        };
        write!(f, "{}", name)
    }
}

/// Read the first bytes of `path` and check they match `extension`.
///
/// Blocking; run it off the async runtime.
pub fn probe_file(path: &Path, extension: &str) -> Result<(), HostError> {
    let mut header = Vec::with_capacity(HEADER_LEN);
    File::open(path)
        .and_then(|file| file.take(HEADER_LEN as u64).read_to_end(&mut header))
        .map_err(|e| HostError::from(e).append_context(&path.display().to_string()))?;

    check_header(&header, extension)
}

pub fn check_header(header: &[u8], extension: &str) -> Result<(), HostError> {
    if header.is_empty() {
        return Err(HostError::new(HostErrorType::Decoder, "Decoder: Empty file"));
    }

    let Some(expected) = AudioFamily::from_extension(extension) else {
        return Ok(());
    };

    match AudioFamily::detect(header) {
        Some(found) if found == expected => Ok(()),
        Some(found) => Err(HostError::new(
            HostErrorType::Decoder,
            format!("Decoder: Expected {} data but found {}", expected, found),
        )),
        None => Err(HostError::new(
            HostErrorType::Decoder,
            format!("Decoder: Unrecognised {} header", expected),
        )
        .with_context(format!("first bytes: {:02x?}", &header[..header.len().min(4)]))),
    }
}
