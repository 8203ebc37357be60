//! Parsed HTML documents.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use html5ever::serialize::{serialize, SerializeOpts};
use html5ever::tendril::TendrilSink;
use html5ever::{parse_document, ParseOpts};
use markup5ever_rcdom::{Handle, RcDom, SerializableHandle};

use crate::node;

/// How parser-recovered errors are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ParseMode {
    /// Accept anything the HTML5 parser recovers from.
    #[default]
    Lenient,

    /// Reject a document if the parser had to recover from any error.
    Strict,
}

/// Errors that can occur when loading or querying a document.
#[derive(Debug, thiserror::Error)]
pub enum DomError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed markup in {origin}: {message}")]
    Malformed { origin: String, message: String },

    #[error("Missing placeholder element <{name}>")]
    MissingPlaceholder { name: String },

    #[error("Placeholder element <{name}> appears {count} times, expected exactly once")]
    DuplicatePlaceholder { name: String, count: usize },

    #[error("Document has no <{name}> element")]
    MissingElement { name: String },

    #[error("Failed to serialize document: {0}")]
    Serialize(#[from] io::Error),
}

/// An owned HTML document.
///
/// Every document owns its own node tree. Content moved between documents is
/// always deep-copied, so one document can be spliced into many others without
/// the copies sharing state.
pub struct HtmlDocument {
    dom: RcDom,
    origin: String,
    errors: Vec<String>,
}

impl HtmlDocument {
    /// Parse a document from a string.
    pub fn parse(source: &str, mode: ParseMode) -> Result<Self, DomError> {
        Self::parse_named(source, "<string>", mode)
    }

    /// Read and parse a document from disk. The file must be UTF-8.
    pub fn parse_file(path: &Path, mode: ParseMode) -> Result<Self, DomError> {
        let bytes = fs::read(path).map_err(|source| DomError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let origin = path.display().to_string();
        let text = String::from_utf8(bytes).map_err(|e| DomError::Malformed {
            origin: origin.clone(),
            message: format!("not valid UTF-8: {}", e.utf8_error()),
        })?;

        Self::parse_named(&text, &origin, mode)
    }

    fn parse_named(source: &str, origin: &str, mode: ParseMode) -> Result<Self, DomError> {
        let dom = parse_document(RcDom::default(), ParseOpts::default()).one(source);
        let errors: Vec<String> = dom.errors.iter().map(|e| e.to_string()).collect();

        if mode == ParseMode::Strict {
            if let Some(first) = errors.first() {
                return Err(DomError::Malformed {
                    origin: origin.to_string(),
                    message: format!("{} ({} parse errors)", first, errors.len()),
                });
            }
        }

        for error in &errors {
            tracing::debug!("Recovered parse error in {}: {}", origin, error);
        }

        Ok(Self {
            dom,
            origin: origin.to_string(),
            errors,
        })
    }

    /// Where this document was loaded from (a path, or `<string>`).
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Errors the parser recovered from while building this document.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// The document node.
    pub fn document(&self) -> &Handle {
        &self.dom.document
    }

    /// The document's `<head>` element.
    pub fn head(&self) -> Result<Handle, DomError> {
        self.required("head")
    }

    /// The document's `<body>` element.
    ///
    /// Frameset documents have none.
    pub fn body(&self) -> Result<Handle, DomError> {
        self.required("body")
    }

    fn required(&self, name: &str) -> Result<Handle, DomError> {
        node::find_elements(&self.dom.document, name)
            .into_iter()
            .next()
            .ok_or_else(|| DomError::MissingElement {
                name: name.to_string(),
            })
    }

    /// Find the unique element with tag name `tag`.
    ///
    /// Fails if there are zero matches or more than one.
    pub fn find_unique(&self, tag: &str) -> Result<Handle, DomError> {
        let mut found = node::find_elements(&self.dom.document, tag);
        match found.len() {
            0 => Err(DomError::MissingPlaceholder {
                name: tag.to_string(),
            }),
            1 => Ok(found.remove(0)),
            count => Err(DomError::DuplicatePlaceholder {
                name: tag.to_string(),
                count,
            }),
        }
    }

    /// Number of elements with tag name `tag`.
    pub fn count_elements(&self, tag: &str) -> usize {
        node::find_elements(&self.dom.document, tag).len()
    }

    /// Serialize the document, doctype included.
    pub fn to_html(&self) -> Result<String, DomError> {
        let handle: SerializableHandle = self.dom.document.clone().into();
        let mut out = Vec::new();
        serialize(&mut out, &handle, SerializeOpts::default())?;
        String::from_utf8(out)
            .map_err(|e| DomError::Serialize(io::Error::new(io::ErrorKind::InvalidData, e)))
    }
}

impl std::fmt::Debug for HtmlDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlDocument")
            .field("origin", &self.origin)
            .field("errors", &self.errors.len())
            .finish()
    }
}
