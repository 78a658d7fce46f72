//! Lambda@Edge adapter: `Records[0].cf.request.uri` in, the same request out.

pub mod event;
pub mod handler;
