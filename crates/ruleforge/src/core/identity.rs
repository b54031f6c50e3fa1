//! Configuration identities and path-tag expansion.
//!
//! Rules configure the file their engine loads as a path template such as
//! `<SourceDocDir>/verify.vcfg`. The template is expanded per document, and the
//! resulting absolute path identifies which engine configuration must be running.

use crate::types::DocumentContext;
use crate::{Result, RuleError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};

static PATH_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([A-Za-z][A-Za-z0-9]*)>").expect("Path tag regex pattern is valid and should compile"));

/// Opaque key naming the configuration an engine instance was built from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigIdentity(String);

impl ConfigIdentity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Identity for a file path: absolute, with `.` and `..` resolved lexically.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let absolute = std::path::absolute(path.as_ref())?;
        Ok(Self(normalize(&absolute).to_string_lossy().into_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConfigIdentity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Replace document tags in `template`.
///
/// Supported tags:
/// - `<SourceDocName>` - full path of the source document
/// - `<SourceDocDir>` - directory containing the source document
/// - `<SourceDocStem>` - file name without extension
///
/// # Errors
///
/// Returns `RuleError::Validation` for an unknown tag, or for a document tag
/// used without a source path.
pub fn expand_path_tags(template: &str, document: &DocumentContext) -> Result<String> {
    let mut expanded = String::with_capacity(template.len());
    let mut last = 0;

    for captures in PATH_TAG.captures_iter(template) {
        let (Some(whole), Some(tag)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let tag = tag.as_str();

        let source = &document.source_path;
        if source.as_os_str().is_empty() {
            return Err(RuleError::validation(format!(
                "Tag <{}> in '{}' requires a source document",
                tag, template
            )));
        }

        let value = match tag {
            "SourceDocName" => source.to_string_lossy().into_owned(),
            "SourceDocDir" => source
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            "SourceDocStem" => source
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            unknown => {
                return Err(RuleError::validation(format!(
                    "Unknown path tag <{}> in '{}'",
                    unknown, template
                )));
            }
        };

        expanded.push_str(&template[last..whole.start()]);
        expanded.push_str(&value);
        last = whole.end();
    }

    expanded.push_str(&template[last..]);
    Ok(expanded)
}
