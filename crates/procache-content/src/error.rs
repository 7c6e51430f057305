use thiserror::Error;

/// An error loading a content document.
#[derive(Debug, Error)]
pub enum ContentError {
    /// The path is empty, absolute, or escapes the content directory.
    #[error("invalid content path `{0}`")]
    InvalidPath(String),
    /// The path does not point to a markdown file.
    #[error("unsupported content type of `{0}`, expected a `.md` or `.mdx` file")]
    UnsupportedType(String),
    /// There is no document at the path.
    #[error("content `{0}` not found")]
    NotFound(String),
    /// The document exists, but could not be read.
    #[error("failed to read content `{path}`")]
    Io {
        /// The normalized path of the document.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The front matter of the document is not a valid YAML mapping.
    #[error("invalid front matter in `{path}`")]
    FrontMatter {
        /// The normalized path of the document.
        path: String,
        /// The YAML parser error.
        #[source]
        source: serde_yaml::Error,
    },
}
