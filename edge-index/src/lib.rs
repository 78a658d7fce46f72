//! Directory-index rewriting for edge requests in front of an object-storage origin.
//!
//! A request for `/about/` reaches the origin as `/about/index.html`. Everything that does
//! not end in `/` is forwarded untouched.

pub mod cloudfront;
pub mod config;
pub mod error;
pub mod metrics;
pub mod obs;
pub mod rewrite;
pub mod server;
pub mod telemetry;

pub use error::{HandlerError, RewriteError};
pub use rewrite::normalizer::{normalize, IndexNormalizer, RequestPath, DEFAULT_DOCUMENT};
pub use rewrite::outcome::RewriteOutcome;
pub use rewrite::sink::{DiagnosticSink, MemorySink, TracingSink};
