use http::uri::PathAndQuery;

use crate::error::RewriteError;

use super::outcome::RewriteOutcome;
use super::sink::DiagnosticSink;

pub const DEFAULT_DOCUMENT: &str = "index.html";
pub const SEPARATOR: char = '/';

/// Appends `index.html` to a path that ends in `/`.
///
/// Only the last character is checked. Everything else in the path, percent-encoding
/// included, is left alone. Other document names go through [`IndexNormalizer`].
pub fn normalize(path: &str) -> String {
    append_document(path, DEFAULT_DOCUMENT)
}

/// `default_document` must already have passed [`IndexNormalizer::new`].
fn append_document(path: &str, default_document: &str) -> String {
    if is_directory(path) {
        let mut out = String::with_capacity(path.len() + default_document.len());
        out.push_str(path);
        out.push_str(default_document);
        out
    } else {
        path.to_string()
    }
}

#[inline]
pub fn is_directory(path: &str) -> bool {
    path.ends_with(SEPARATOR)
}

/// Host-side request whose path can be read and replaced.
pub trait RequestPath {
    fn path(&self) -> Result<&str, RewriteError>;

    /// Must leave the request untouched when it returns an error.
    fn set_path(&mut self, path: String) -> Result<(), RewriteError>;
}

/// True when `/<name>` parses back as exactly that path, with no query or fragment split off.
fn is_path_segment(name: &str) -> bool {
    let candidate = format!("{SEPARATOR}{name}");
    match candidate.parse::<PathAndQuery>() {
        Ok(pq) => pq.path() == candidate && pq.query().is_none(),
        Err(_) => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNormalizer {
    default_document: String,
}

impl Default for IndexNormalizer {
    fn default() -> Self {
        Self {
            default_document: DEFAULT_DOCUMENT.to_string(),
        }
    }
}

impl IndexNormalizer {
    pub fn new(default_document: impl Into<String>) -> Result<Self, RewriteError> {
        let name = default_document.into();
        if name.is_empty() {
            return Err(RewriteError::InvalidDefaultDocument {
                name,
                reason: "must not be empty",
            });
        }
        // A trailing separator here would leave the rewritten path a directory again.
        if name.ends_with(SEPARATOR) {
            return Err(RewriteError::InvalidDefaultDocument {
                name,
                reason: "must not end in '/'",
            });
        }
        if name.contains(['?', '#']) {
            return Err(RewriteError::InvalidDefaultDocument {
                name,
                reason: "must not contain '?' or '#'",
            });
        }
        if !is_path_segment(&name) {
            return Err(RewriteError::InvalidDefaultDocument {
                name,
                reason: "must only use characters allowed in a uri path",
            });
        }
        Ok(Self { default_document: name })
    }

    pub fn default_document(&self) -> &str {
        &self.default_document
    }

    pub fn normalize(&self, path: &str) -> String {
        append_document(path, &self.default_document)
    }

    /// Checked rewrite of a path pulled out of a host request.
    ///
    /// Valid paths produce exactly two sink records, `Old URI: ..` and `New URI: ..`.
    /// An invalid path produces one record and a [`RewriteOutcome::PassThrough`].
    pub fn rewrite(&self, path: Result<&str, RewriteError>, sink: &dyn DiagnosticSink) -> RewriteOutcome {
        let old = match path {
            Ok("") => Err(RewriteError::EmptyPath),
            other => other,
        };
        let old = match old {
            Ok(p) => p,
            Err(error) => {
                sink.record(&format!("Invalid URI ({error}), passing request through"));
                return RewriteOutcome::PassThrough { error };
            }
        };

        let new = self.normalize(old);
        sink.record(&format!("Old URI: {old}"));
        sink.record(&format!("New URI: {new}"));

        if !is_directory(old) {
            RewriteOutcome::Unchanged { path: new }
        } else {
            RewriteOutcome::Rewritten {
                from: old.to_string(),
                to: new,
            }
        }
    }

    /// Rewrites `req` in place. On any failure the request keeps its original path.
    pub fn rewrite_request<R>(&self, req: &mut R, sink: &dyn DiagnosticSink) -> RewriteOutcome
    where
        R: RequestPath + ?Sized,
    {
        let (from, to) = match self.rewrite(req.path(), sink) {
            RewriteOutcome::Rewritten { from, to } => (from, to),
            other => return other,
        };

        match req.set_path(to.clone()) {
            Ok(()) => RewriteOutcome::Rewritten { from, to },
            Err(error) => {
                sink.record(&format!("Rewrite of {from} failed ({error}), passing request through"));
                RewriteOutcome::PassThrough { error }
            }
        }
    }
}
