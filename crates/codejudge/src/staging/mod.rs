//! Source staging for sandbox calls
//!
//! Every call gets its own directory under the staging root, named after the
//! language and a fresh UUID. The directory belongs to the [`StagedSource`]
//! handle; dropping the handle hands the directory to the [`CleanupQueue`].

use std::borrow::Cow;
use std::io;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::FileName;
use crate::types::LanguageId;

pub use crate::staging::cleanup::CleanupQueue;

mod cleanup;

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("failed to create staging directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("staging directory {0} already exists")]
    Collision(PathBuf),

    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Arena of per-call staging directories
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
    cleanup: CleanupQueue,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>, cleanup: CleanupQueue) -> Self {
        Self {
            root: root.into(),
            cleanup,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `source` into a fresh directory as `file_name`
    #[instrument(skip(self, source), fields(root = %self.root.display()))]
    pub async fn stage(
        &self,
        language: LanguageId,
        file_name: &FileName,
        source: &str,
    ) -> Result<StagedSource, StagingError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|source| StagingError::CreateDir {
                path: self.root.clone(),
                source,
            })?;

        let id = Uuid::new_v4();
        let dir = self.root.join(format!("{language}_{id}"));

        // create_dir (not create_dir_all) so an existing directory is never shared
        match tokio::fs::create_dir(&dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(StagingError::Collision(dir));
            }
            Err(source) => return Err(StagingError::CreateDir { path: dir, source }),
        }

        // From here on the handle owns the directory, so early returns still schedule it.
        let staged = StagedSource {
            id,
            source_path: dir.join(file_name.as_str()),
            dir,
            cleanup: self.cleanup.clone(),
        };

        tokio::fs::write(&staged.source_path, source)
            .await
            .map_err(|source| StagingError::Write {
                path: staged.source_path.clone(),
                source,
            })?;

        debug!(dir = %staged.dir.display(), len = source.len(), "staged source");
        Ok(staged)
    }
}

/// A staged source file and the directory that holds it
#[derive(Debug)]
pub struct StagedSource {
    id: Uuid,
    dir: PathBuf,
    source_path: PathBuf,
    cleanup: CleanupQueue,
}

impl StagedSource {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Host path of a compile artifact inside the staging directory
    pub fn artifact_path(&self, name: &FileName) -> PathBuf {
        self.dir.join(name.as_str())
    }
}

impl Drop for StagedSource {
    fn drop(&mut self) {
        self.cleanup.schedule(self.dir.clone());
    }
}

static INCLUDE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#include\s*<[^>\n]+>").unwrap());
static C_MAIN_AFTER_SEMI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r";([ \t]*int\s+main\s*\()").unwrap());
static JAVA_MAIN_AFTER_SEMI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r";([ \t]*public\s+static\s+void\s+main\s*\()").unwrap());
static JAVA_CLASS_AFTER_SEMI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r";([ \t]*class\s+[A-Za-z_][A-Za-z0-9_]*)").unwrap());

/// Repair line structure that pasted or single-line code tends to lose
///
/// Line endings become `\n`. C and C++ get a newline after every `#include <...>`
/// that shares its line with other code and between a `;` and a following
/// `int main(`. Java gets one between a `;` and a following `main` method or
/// class declaration. Well formatted code comes back unchanged.
pub fn sanitize_source(language: LanguageId, code: &str) -> String {
    let code = normalize_line_endings(code);

    match language {
        LanguageId::Cpp | LanguageId::C => {
            let code = break_after_includes(&code);
            C_MAIN_AFTER_SEMI.replace_all(&code, ";\n$1").into_owned()
        }
        LanguageId::Java => {
            let code = JAVA_MAIN_AFTER_SEMI.replace_all(&code, ";\n$1");
            JAVA_CLASS_AFTER_SEMI.replace_all(&code, ";\n$1").into_owned()
        }
    }
}

/// Convert `\r\n` and lone `\r` to `\n`
pub fn normalize_line_endings(text: &str) -> Cow<'_, str> {
    if !text.contains('\r') {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
}

fn break_after_includes(code: &str) -> String {
    let mut out = String::with_capacity(code.len() + 16);
    let mut last = 0;
    for m in INCLUDE.find_iter(code) {
        out.push_str(&code[last..m.end()]);
        let rest = &code[m.end()..];
        let gap = &rest[..rest.len() - rest.trim_start().len()];
        if !rest.is_empty() && !gap.contains('\n') {
            out.push('\n');
        }
        last = m.end();
    }
    out.push_str(&code[last..]);
    out
}
