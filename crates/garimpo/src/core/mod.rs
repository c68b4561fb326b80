//! Configuration, IO plumbing and the top-level extraction API.

pub mod config;
pub mod extractor;
pub mod io;
