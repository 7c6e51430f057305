use crate::ContentError;

/// File extensions of loadable documents.
const EXTENSIONS: &[&str] = &["md", "mdx"];

/// Normalizes a requested content path to a relative, `/`-separated form.
///
/// Backslashes are treated as separators, and a leading `/` as well as `.` segments and empty
/// segments are dropped, so `/docs//./intro.md` and `docs\intro.md` both become `docs/intro.md`.
///
/// # Errors
///
/// Returns [`ContentError::InvalidPath`] for empty paths, `..` segments, and absolute paths that
/// cannot be interpreted relative to the content root (UNC or drive prefixed). Returns
/// [`ContentError::UnsupportedType`] if the file is not a markdown document.
pub fn normalize_path(path: &str) -> Result<String, ContentError> {
    let unified = path.replace('\\', "/");
    if unified.starts_with("//") || has_drive_prefix(&unified) {
        return Err(ContentError::InvalidPath(path.to_owned()));
    }

    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(ContentError::InvalidPath(path.to_owned())),
            segment => segments.push(segment),
        }
    }

    let Some(file_name) = segments.last() else {
        return Err(ContentError::InvalidPath(path.to_owned()));
    };

    let supported = file_name
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| {
            !stem.is_empty() && EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e))
        });
    if !supported {
        return Err(ContentError::UnsupportedType(path.to_owned()));
    }

    Ok(segments.join("/"))
}

fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
