//! Markdown content loading for the platform's sites.
//!
//! The [`ContentLoader`] reads documents from a content directory, parses their YAML front matter
//! and headings, and keeps the result in a [`procache::ProcessCache`] for the lifetime of the
//! process. With [`LoaderOptions::development`] enabled, the content directory is watched and an
//! edited file is parsed again on its next request.

#![warn(missing_docs, missing_debug_implementations)]

mod document;
mod error;
mod loader;
mod path;

pub use document::{Document, Heading};
pub use error::ContentError;
pub use loader::{ContentLoader, LoaderOptions};
pub use path::normalize_path;
