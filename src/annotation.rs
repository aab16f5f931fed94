//! Test annotations and the bug references derived from them.

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::GateError;

/// Annotation type that links a test to a tracker ticket.
pub const BUG_ANNOTATION: &str = "bug";

/// Metadata attached to a test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    /// Annotation kind, e.g. `"bug"` or `"issue"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Free text; for bugs, the ticket URL.
    pub description: Option<String>,
}

impl Annotation {
    /// Creates an annotation with a description.
    pub fn new(kind: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            description: Some(description.into()),
        }
    }

    /// Creates a `bug` annotation pointing at `url`.
    pub fn bug(url: impl Into<String>) -> Self {
        Self::new(BUG_ANNOTATION, url)
    }

    /// Returns the ticket URL if this is a `bug` annotation with a non-empty description.
    #[must_use]
    pub fn bug_url(&self) -> Option<&str> {
        if self.kind != BUG_ANNOTATION {
            return None;
        }
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

/// A ticket reference: key plus the tracker project it lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BugRef {
    /// Ticket key, e.g. `ACME-42`.
    pub id: String,
    /// Tracker project slug, the first label of the tracker hostname.
    pub project: String,
}

impl BugRef {
    /// Parses a ticket URL such as `https://acme.atlassian.net/browse/ACME-42`.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvalidAnnotation`] if the URL cannot be parsed,
    /// has no host, or has no path segment to use as the key.
    pub fn parse(url: &str) -> Result<Self, GateError> {
        let invalid = |reason: &str| GateError::InvalidAnnotation {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let parsed = Url::parse(url).map_err(|e| invalid(&e.to_string()))?;
        let project = parsed
            .host_str()
            .and_then(|host| host.split('.').next())
            .filter(|label| !label.is_empty())
            .ok_or_else(|| invalid("URL has no host"))?;
        let id = parsed
            .path_segments()
            .and_then(|segments| segments.rev().find(|s| !s.is_empty()))
            .ok_or_else(|| invalid("URL has no ticket key in its path"))?;

        Ok(Self {
            id: id.to_string(),
            project: project.to_string(),
        })
    }
}

/// Extracts bug references from a test's annotations, in annotation order.
///
/// Non-bug annotations and bugs without a description are skipped. Repeated
/// keys are collapsed to their first occurrence.
///
/// # Errors
///
/// Returns [`GateError::InvalidAnnotation`] for the first unparseable URL.
pub fn bug_refs(annotations: &[Annotation]) -> Result<Vec<BugRef>, GateError> {
    let mut refs: Vec<BugRef> = Vec::new();
    for url in annotations.iter().filter_map(Annotation::bug_url) {
        let bug = BugRef::parse(url)?;
        if !refs.iter().any(|r| r.id == bug.id && r.project == bug.project) {
            refs.push(bug);
        }
    }
    Ok(refs)
}

/// Returns the single project shared by all references.
///
/// # Errors
///
/// Returns [`GateError::MixedProjects`] when references span several projects.
pub fn single_project(refs: &[BugRef]) -> Result<Option<&str>, GateError> {
    let mut projects: Vec<&str> = Vec::new();
    for bug in refs {
        if !projects.contains(&bug.project.as_str()) {
            projects.push(&bug.project);
        }
    }
    match projects.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some(*only)),
        _ => Err(GateError::MixedProjects {
            projects: projects.into_iter().map(str::to_string).collect(),
        }),
    }
}
