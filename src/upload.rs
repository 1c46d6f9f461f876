//! Upload persistence: sanitized, collision-free storage of incoming files

use crate::error::PipelineError;
use std::path::{Path, PathBuf};
use tracing::debug;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

/// Name used when a client filename sanitizes to nothing
const FALLBACK_NAME: &str = "upload.csv";

/// A file field lifted out of a multipart request
#[derive(Debug, Clone)]
pub struct IncomingFile {
    /// Client-supplied filename, if the field carried one
    pub filename: Option<String>,
    /// Raw file content
    pub bytes: Vec<u8>,
}

impl IncomingFile {
    pub fn new(filename: Option<String>, bytes: Vec<u8>) -> Self {
        Self { filename, bytes }
    }
}

/// Writes uploads under a single directory, one file per request
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the upload directory if missing. Safe to call repeatedly.
    pub fn ensure_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)
    }

    /// Persist the request's file and return where it landed.
    ///
    /// Each call gets its own storage key, so two requests sending the same
    /// filename never overwrite each other.
    pub fn save(&self, file: Option<IncomingFile>) -> Result<PathBuf, PipelineError> {
        let file = file.ok_or(PipelineError::NoFileProvided)?;
        let filename = match file.filename.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => return Err(PipelineError::EmptyFilename),
        };

        self.ensure_dir()
            .map_err(|e| PipelineError::Storage(e.to_string()))?;

        let path = self.dir.join(storage_key(filename));
        std::fs::write(&path, &file.bytes).map_err(|e| PipelineError::Storage(e.to_string()))?;

        debug!(
            client_filename = %filename,
            path = %path.display(),
            bytes = file.bytes.len(),
            "Upload stored"
        );

        Ok(path)
    }
}

/// Request-scoped storage key: `<uuid>_<sanitized client name>`
pub fn storage_key(client_filename: &str) -> String {
    let mut name = sanitize_filename(client_filename);
    if name.is_empty() {
        name = FALLBACK_NAME.to_string();
    }
    format!("{}_{}", Uuid::new_v4().simple(), name)
}

/// Reduce a client filename to a safe single path component.
///
/// Path separators split the name, whitespace runs become `_`, anything
/// outside `[A-Za-z0-9._-]` is dropped and leading/trailing `.`/`_` trimmed.
pub fn sanitize_filename(name: &str) -> String {
    // Accented letters fold to their ASCII base; other non-ASCII is dropped
    let spaced: String = name
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}
