use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::ContentError;

/// A heading within a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    /// The heading level, from `1` to `6`.
    pub level: u8,
    /// The heading text without the leading `#` markers.
    pub text: String,
    /// A URL fragment identifying the heading, unique within its document.
    pub anchor: String,
}

/// A parsed markdown document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    /// The normalized path relative to the content root.
    pub path: String,
    /// The URL slug of the document.
    ///
    /// This is the path without its extension, where `index` documents represent their directory.
    pub slug: String,
    /// The title from the front matter, or the text of the first top-level heading.
    pub title: Option<String>,
    /// The YAML front matter, converted to JSON values.
    pub front_matter: Map<String, Value>,
    /// All headings outside of code blocks, in document order.
    pub headings: Vec<Heading>,
    /// The markdown source after the front matter.
    pub body: String,
    /// The number of whitespace separated words in the body.
    pub word_count: usize,
}

impl Document {
    /// Parses the raw contents of the document at `path`.
    pub fn parse(path: &str, raw: &str) -> Result<Self, ContentError> {
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

        let (front_matter, body) = match split_front_matter(raw) {
            Some((yaml, body)) => (parse_front_matter(path, yaml)?, body),
            None => (Map::new(), raw),
        };

        let headings = parse_headings(body);
        let title = match front_matter.get("title") {
            Some(Value::String(title)) => Some(title.clone()),
            _ => headings
                .iter()
                .find(|heading| heading.level == 1)
                .map(|heading| heading.text.clone()),
        };

        Ok(Self {
            path: path.to_owned(),
            slug: slug_from_path(path),
            title,
            front_matter,
            headings,
            word_count: body.split_whitespace().count(),
            body: body.to_owned(),
        })
    }
}

/// Splits a leading `---` delimited block from the rest of the document.
fn split_front_matter(raw: &str) -> Option<(&str, &str)> {
    let rest = raw.strip_prefix("---")?;
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }

    None
}

fn parse_front_matter(path: &str, yaml: &str) -> Result<Map<String, Value>, ContentError> {
    if yaml.trim().is_empty() {
        return Ok(Map::new());
    }
    serde_yaml::from_str(yaml).map_err(|source| ContentError::FrontMatter {
        path: path.to_owned(),
        source,
    })
}

fn parse_headings(body: &str) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut anchors = HashMap::new();
    let mut fence: Option<Fence> = None;

    for line in body.lines() {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();

        if let Some(open) = fence {
            if indent <= 3 && open.is_closed_by(trimmed) {
                fence = None;
            }
            continue;
        }
        if indent > 3 {
            continue;
        }
        if let Some(open) = Fence::open(trimmed) {
            fence = Some(open);
            continue;
        }

        if let Some((level, text)) = parse_atx_heading(trimmed) {
            let anchor = unique_anchor(&mut anchors, slugify(&text));
            headings.push(Heading {
                level,
                text,
                anchor,
            });
        }
    }

    headings
}

/// An open fenced code block.
#[derive(Debug, Clone, Copy)]
struct Fence {
    marker: u8,
    len: usize,
}

impl Fence {
    /// Parses an opening fence of at least three backticks or tildes.
    fn open(line: &str) -> Option<Self> {
        let marker = *line.as_bytes().first()?;
        if marker != b'`' && marker != b'~' {
            return None;
        }
        let len = line.bytes().take_while(|&b| b == marker).count();
        if len < 3 {
            return None;
        }
        // backticks are not allowed in the info string of a backtick fence
        if marker == b'`' && line[len..].contains('`') {
            return None;
        }
        Some(Self { marker, len })
    }

    /// A closing fence uses the same marker, at least as often, and has no info string.
    fn is_closed_by(&self, line: &str) -> bool {
        let len = line.bytes().take_while(|&b| b == self.marker).count();
        len >= self.len && line[len..].trim().is_empty()
    }
}

fn parse_atx_heading(line: &str) -> Option<(u8, String)> {
    let level = line.bytes().take_while(|&b| b == b'#').count();
    if !(1..=6).contains(&level) {
        return None;
    }

    let rest = &line[level..];
    if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
        return None;
    }

    let mut text = rest.trim();
    // optional closing sequence
    let unclosed = text.trim_end_matches('#');
    if unclosed.is_empty() || unclosed.ends_with([' ', '\t']) {
        text = unclosed.trim_end();
    }

    Some((level as u8, text.to_owned()))
}

/// Turns heading text into a lowercase, `-` separated anchor.
fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_alphanumeric() || c == '_' {
            slug.extend(c.to_lowercase());
        } else if (c.is_whitespace() || c == '-') && !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_owned()
}

fn unique_anchor(anchors: &mut HashMap<String, usize>, anchor: String) -> String {
    let count = anchors.entry(anchor.clone()).or_insert(0);
    let unique = match *count {
        0 => anchor,
        n => format!("{anchor}-{n}"),
    };
    *count += 1;
    unique
}

fn slug_from_path(path: &str) -> String {
    let stem = match path.rsplit_once('.') {
        Some((stem, _)) => stem,
        None => path,
    };
    match stem.rsplit_once('/') {
        Some((dir, "index")) => dir.to_owned(),
        None if stem == "index" => String::new(),
        _ => stem.to_owned(),
    }
}
