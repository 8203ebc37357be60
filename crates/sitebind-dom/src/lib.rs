//! HTML document handling for sitebind.
//!
//! Parses pages, templates and fragments with html5ever, locates the named
//! placeholder elements a template declares, and splices content between
//! documents before serializing the result.

pub mod document;
pub mod merge;
mod node;

pub use document::{DomError, HtmlDocument, ParseMode};
pub use merge::{merge_page, CONTENTS_PLACEHOLDER, LANGMENU_PLACEHOLDER};
