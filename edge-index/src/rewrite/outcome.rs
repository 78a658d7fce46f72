use crate::error::RewriteError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    Unchanged {
        path: String,
    },

    Rewritten {
        from: String,
        to: String,
    },

    /// The request is forwarded exactly as received.
    PassThrough {
        error: RewriteError,
    },
}

impl RewriteOutcome {
    pub fn kind_str(&self) -> &'static str {
        match self {
            RewriteOutcome::Unchanged { .. } => "unchanged",
            RewriteOutcome::Rewritten { .. } => "rewritten",
            RewriteOutcome::PassThrough { .. } => "pass_through",
        }
    }

    pub fn is_rewritten(&self) -> bool {
        matches!(self, RewriteOutcome::Rewritten { .. })
    }

    /// Path the origin will see, when known.
    pub fn new_path(&self) -> Option<&str> {
        match self {
            RewriteOutcome::Unchanged { path } => Some(path),
            RewriteOutcome::Rewritten { to, .. } => Some(to),
            RewriteOutcome::PassThrough { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&RewriteError> {
        match self {
            RewriteOutcome::PassThrough { error } => Some(error),
            _ => None,
        }
    }
}
