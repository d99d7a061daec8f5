use crate::feeder::{InputFeeder, TrialStatus};
use crate::target::Target;
use memmap2::Mmap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Failed to open replay input {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to stat replay input {path:?}: {source}")]
    Metadata {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to map replay input {path:?}: {source}")]
    Map {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write replay output: {0}")]
    Output(#[from] std::io::Error),
}

/// What a single replay observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayReport {
    /// File length in bytes.
    pub len: u64,
    /// MD5 hex digest of the file contents, for matching against saved crashes.
    pub digest: String,
    pub status: TrialStatus,
}

/// A saved input mapped read-only for the lifetime of this value.
///
/// Empty files are not mapped (a zero-length mapping is an error on most
/// platforms); they read back as an empty buffer.
pub struct MappedInput {
    path: PathBuf,
    len: u64,
    map: Option<Mmap>,
}

impl MappedInput {
    pub fn open(path: &Path) -> Result<Self, ReplayError> {
        let file = File::open(path).map_err(|source| ReplayError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let len = file
            .metadata()
            .map_err(|source| ReplayError::Metadata {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        let map = if len == 0 {
            debug!(?path, "empty replay input, nothing to map");
            None
        } else {
            // SAFETY: the mapping is private and read-only; callers must not
            // truncate the file while replaying it.
            let map = unsafe { Mmap::map(&file) }.map_err(|source| ReplayError::Map {
                path: path.to_path_buf(),
                source,
            })?;
            debug!(?path, len, "mapped replay input");
            Some(map)
        };

        Ok(Self {
            path: path.to_path_buf(),
            len,
            map,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.map.as_deref().unwrap_or_default()
    }

    /// MD5 hex digest of the contents.
    pub fn digest(&self) -> String {
        format!("{:x}", md5::compute(self.as_bytes()))
    }

    /// Feeds the mapped bytes through `feeder` once.
    ///
    /// A target crash is not caught here; terminating the process is the
    /// expected outcome when replaying a known-bad input.
    pub fn replay<T: Target>(&self, feeder: &InputFeeder<T>) -> TrialStatus {
        feeder.test_one_input(self.as_bytes())
    }
}

/// Maps `path`, writes its length as one line to `out`, replays it through
/// the same path the fuzzer uses, and releases the mapping before returning.
///
/// The length line is flushed before the target runs so it survives a crash.
pub fn replay_file<T: Target, W: Write>(
    path: &Path,
    feeder: &InputFeeder<T>,
    out: &mut W,
) -> Result<ReplayReport, ReplayError> {
    let input = MappedInput::open(path)?;
    writeln!(out, "{}", input.len())?;
    out.flush()?;

    let digest = input.digest();
    info!(path = ?input.path(), %digest, "replaying input");
    let report = ReplayReport {
        len: input.len(),
        digest,
        status: input.replay(feeder),
    };
    drop(input);
    Ok(report)
}
