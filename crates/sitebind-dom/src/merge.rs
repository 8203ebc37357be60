//! Splicing documents together.
//!
//! A page is merged into its template in four steps: the page's head children
//! are appended to the template head, a `<base>` element is appended after
//! them, and the two placeholder elements are replaced with the body children
//! of the language menu and of the page.

use std::cell::RefCell;

use html5ever::{Attribute, LocalName, Namespace, QualName};
use markup5ever_rcdom::{Handle, Node, NodeData};

use crate::document::{DomError, HtmlDocument};
use crate::node;

/// Tag name of the language menu insertion point.
pub const LANGMENU_PLACEHOLDER: &str = "langmenu";

/// Tag name of the page content insertion point.
pub const CONTENTS_PLACEHOLDER: &str = "contents";

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

impl HtmlDocument {
    /// Append copies of `other`'s head children to this document's head.
    ///
    /// `<base>` elements are skipped: the merged document gets exactly one,
    /// added by [`HtmlDocument::append_base`].
    ///
    /// Returns the number of nodes appended.
    pub fn append_head_from(&self, other: &HtmlDocument) -> Result<usize, DomError> {
        let head = self.head()?;
        let copies: Vec<Handle> = node::clone_children(&other.head()?)
            .into_iter()
            .filter(|child| !node::is_element(child, "base"))
            .collect();
        let count = copies.len();
        for copy in copies {
            node::append(&head, copy);
        }
        Ok(count)
    }

    /// Append `<base href="...">` as the last child of the head.
    pub fn append_base(&self, href: &str) -> Result<(), DomError> {
        let head = self.head()?;
        let base = Node::new(NodeData::Element {
            name: html_name("base"),
            attrs: RefCell::new(vec![Attribute {
                name: QualName::new(None, Namespace::from(""), LocalName::from("href")),
                value: href.into(),
            }]),
            template_contents: RefCell::new(None),
            mathml_annotation_xml_integration_point: false,
        });
        node::append(&head, base);
        Ok(())
    }

    /// Replace the unique element `name` with copies of `source`'s children.
    ///
    /// Children of the placeholder itself are kept and follow the inserted
    /// content. HTML has no self-closing custom elements, so `<langmenu />`
    /// swallows the markup after it; that markup must survive the replacement.
    pub fn replace_placeholder(&self, name: &str, source: &Handle) -> Result<(), DomError> {
        let target = self.find_unique(name)?;

        let mut replacement = node::clone_children(source);
        replacement.extend(node::take_children(&target));

        if !node::replace_with(&target, replacement) {
            return Err(DomError::MissingPlaceholder {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

fn html_name(local: &str) -> QualName {
    QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from(local))
}

/// Merge `page` and `langmenu` into `template`.
///
/// Both placeholders are checked before anything is modified, so a template
/// missing either one fails without doing partial work.
pub fn merge_page(
    template: HtmlDocument,
    langmenu: &HtmlDocument,
    page: &HtmlDocument,
    base_href: &str,
) -> Result<HtmlDocument, DomError> {
    template.find_unique(LANGMENU_PLACEHOLDER)?;
    template.find_unique(CONTENTS_PLACEHOLDER)?;

    let menu_body = langmenu.body()?;
    let page_body = page.body()?;

    let appended = template.append_head_from(page)?;
    template.append_base(base_href)?;
    template.replace_placeholder(LANGMENU_PLACEHOLDER, &menu_body)?;
    template.replace_placeholder(CONTENTS_PLACEHOLDER, &page_body)?;

    tracing::trace!(
        "Merged {} into {} ({} head nodes)",
        page.origin(),
        template.origin(),
        appended
    );

    Ok(template)
}
