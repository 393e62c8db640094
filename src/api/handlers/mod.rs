//! Fallback endpoint handlers.

pub mod system;
