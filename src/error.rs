//! Error types and shader diagnostics.
//!
//! Only resource allocation, asset loading, window/context setup and
//! configuration parsing produce an [`Error`]. Shader compile and link
//! failures are reported as [`ShaderDiagnostic`] values instead, so a broken
//! shader never aborts the frame loop.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Maximum number of bytes kept from a driver info log.
pub const INFO_LOG_LIMIT: usize = 512;

/// Errors produced by this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// The graphics device refused to allocate a resource, or the data handed
    /// to it was unusable (for example an empty vertex array).
    #[error("device resource error: {0}")]
    DeviceResource(String),

    /// A texture file could not be read or decoded.
    #[error("failed to load asset {}: {source}", path.display())]
    AssetLoad {
        /// Path that was being loaded.
        path: PathBuf,
        /// Underlying decode or I/O failure.
        #[source]
        source: image::ImageError,
    },

    /// Window, event loop or GL context initialization failed.
    #[error("window/context error: {0}")]
    InputCollaborator(String),

    /// The demo configuration file could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Which part of a shader program a diagnostic belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    /// Vertex stage compilation.
    Vertex,
    /// Fragment stage compilation.
    Fragment,
    /// Program linking.
    Program,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vertex => f.write_str("vertex"),
            Self::Fragment => f.write_str("fragment"),
            Self::Program => f.write_str("program"),
        }
    }
}

/// A compile or link failure captured from the driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderDiagnostic {
    /// The stage that failed.
    pub stage: ShaderStage,
    /// Driver info log, truncated to [`INFO_LOG_LIMIT`] bytes.
    pub log: String,
}

impl ShaderDiagnostic {
    /// Build a diagnostic, truncating `log` to [`INFO_LOG_LIMIT`] bytes.
    ///
    /// An empty driver log is replaced with a generic message so a failure is
    /// never reported with no text.
    #[must_use]
    pub fn new(stage: ShaderStage, log: &str) -> Self {
        let log = truncate_log(log.trim_end());
        let log = if log.is_empty() {
            format!("{stage} failed without an info log")
        } else {
            log.to_owned()
        };
        Self { stage, log }
    }
}

impl fmt::Display for ShaderDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage {
            ShaderStage::Program => write!(f, "program link failed: {}", self.log),
            stage => write!(f, "{stage} shader compilation failed: {}", self.log),
        }
    }
}

/// Cut `log` down to at most [`INFO_LOG_LIMIT`] bytes on a char boundary.
fn truncate_log(log: &str) -> &str {
    if log.len() <= INFO_LOG_LIMIT {
        return log;
    }
    let mut end = INFO_LOG_LIMIT;
    while !log.is_char_boundary(end) {
        end -= 1;
    }
    &log[..end]
}
