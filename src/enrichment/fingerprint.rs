//! Audio fingerprinting through Chromaprint's `fpcalc` tool.
//!
//! Install fpcalc:
//! - macOS: `brew install chromaprint`
//! - Linux: `apt install libchromaprint-tools` or equivalent
//! - Windows: `winget install AcoustID.Chromaprint`
//!
//! Everything here blocks; async callers go through `spawn_blocking`.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::enrichment::domain::{AudioFingerprint, EnrichmentError};

#[cfg(windows)]
const CANDIDATES: &[&str] = &[
    "fpcalc",
    r"C:\Program Files\Chromaprint\fpcalc.exe",
    r"C:\Program Files\MusicBrainz Picard\fpcalc.exe",
];

#[cfg(not(windows))]
const CANDIDATES: &[&str] = &[
    "fpcalc",
    "/usr/bin/fpcalc",
    "/usr/local/bin/fpcalc",
    "/opt/homebrew/bin/fpcalc",
];

/// Seconds of audio fingerprinted; AcoustID only needs the start.
const ANALYSIS_SECONDS: u32 = 120;

/// A located `fpcalc` executable.
#[derive(Debug, Clone)]
pub struct Fpcalc {
    program: PathBuf,
}

impl Fpcalc {
    /// Find a working fpcalc on PATH or in a well-known location.
    pub fn locate() -> Option<Self> {
        CANDIDATES
            .iter()
            .map(|candidate| Self {
                program: PathBuf::from(candidate),
            })
            .find(|fpcalc| fpcalc.version().is_some())
    }

    /// Use a specific executable without probing it.
    pub fn at(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Version banner, e.g. `fpcalc version 1.5.1`.
    pub fn version(&self) -> Option<String> {
        Command::new(&self.program)
            .arg("-version")
            .output()
            .ok()
            .filter(|o| o.status.success())
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
    }

    /// Fingerprint one audio file.
    pub fn fingerprint(&self, path: &Path) -> Result<AudioFingerprint, EnrichmentError> {
        let output = Command::new(&self.program)
            .arg("-json")
            .arg("-length")
            .arg(ANALYSIS_SECONDS.to_string())
            .arg(path)
            .output()
            .map_err(|e| EnrichmentError::FingerprintError(format!("Failed to run fpcalc: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EnrichmentError::FingerprintError(format!(
                "fpcalc failed on {}: {}",
                path.display(),
                stderr.trim()
            )));
        }

        parse_output(&String::from_utf8_lossy(&output.stdout))
    }
}

#[derive(serde::Deserialize)]
struct FpcalcOutput {
    fingerprint: String,
    duration: f64,
}

fn parse_output(json: &str) -> Result<AudioFingerprint, EnrichmentError> {
    let parsed: FpcalcOutput = serde_json::from_str(json).map_err(|e| {
        EnrichmentError::FingerprintError(format!("Unreadable fpcalc output: {}", e))
    })?;

    if parsed.fingerprint.is_empty() {
        return Err(EnrichmentError::FingerprintError(
            "fpcalc produced an empty fingerprint".to_string(),
        ));
    }

    Ok(AudioFingerprint {
        fingerprint: parsed.fingerprint,
        duration_secs: parsed.duration.round() as u32,
    })
}
