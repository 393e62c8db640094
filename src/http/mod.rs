//! HTTP/1.x plumbing: request heads and response sinks.

pub mod fallback;
pub mod request;
pub mod sink;

pub use request::{Request, read_request_head};
pub use sink::{BufferedHttpSink, RawPassthroughSink, ResponseSink, SinkKind};
