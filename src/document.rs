//! HTML document loading, cleanup, and serialization.
//!
//! Thin layer over `kuchikiki` exposing only what the conversion needs: the
//! `<img>` elements, the title, and the `<body>` inner markup. The markup is
//! written as XHTML since sections are stored as `.xhtml` files.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use kuchikiki::traits::TendrilSink;
use kuchikiki::{ElementData, NodeDataRef, NodeRef};
use thiserror::Error;
use tracing::debug;

/// Text marking the Inoreader ad block.
const INOREADER_AD_TEXT: &str = "ads from inoreader";

/// Tracking image inserted by solidot.org feeds.
const SOLIDOT_AD_SELECTOR: &str = "img[src='https://img.solidot.org//0/446/liiLIZF8Uh6yM.jpg']";

const HTML_NS: &str = "http://www.w3.org/1999/xhtml";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// HTML elements that never have content; written self-closed.
const VOID_ELEMENTS: [&str; 14] = [
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Errors from loading a document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// Document path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// A parsed HTML document.
pub struct HtmlDocument {
    root: NodeRef,
}

/// An `<img>` element in a document.
pub struct ImageElement(NodeDataRef<ElementData>);

impl ImageElement {
    /// Current `src` attribute, empty when absent.
    #[must_use]
    pub fn src(&self) -> String {
        self.0
            .attributes
            .borrow()
            .get("src")
            .map(str::to_string)
            .unwrap_or_default()
    }

    /// Replaces the `src` attribute.
    pub fn set_src(&self, value: &str) {
        self.0
            .attributes
            .borrow_mut()
            .insert("src", value.to_string());
    }

    /// Removes an attribute if present.
    pub fn remove_attr(&self, name: &str) {
        self.0.attributes.borrow_mut().remove(name);
    }

    /// Whether an attribute is present.
    #[must_use]
    pub fn has_attr(&self, name: &str) -> bool {
        self.0.attributes.borrow().contains(name)
    }
}

impl HtmlDocument {
    /// Reads and parses the file at `path`.
    ///
    /// Invalid UTF-8 is replaced rather than rejected; the HTML parser
    /// accepts any input.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Read`] if the file cannot be read.
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        let bytes = std::fs::read(path).map_err(|source| DocumentError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&String::from_utf8_lossy(&bytes)))
    }

    /// Parses HTML from a string.
    #[must_use]
    pub fn parse(html: &str) -> Self {
        Self {
            root: kuchikiki::parse_html().one(html),
        }
    }

    /// Removes known ad blocks and tracking images.
    pub fn clean(&self) {
        let mut doomed: Vec<NodeRef> = Vec::new();

        // Inoreader wraps its ad in a <center> around a <div> with a marker text.
        if let Ok(divs) = self.root.select("body div") {
            for div in divs {
                if !div.text_contents().contains(INOREADER_AD_TEXT) {
                    continue;
                }
                let center = div.as_node().ancestors().find(|node| {
                    node.as_element()
                        .is_some_and(|element| &*element.name.local == "center")
                });
                if let Some(center) = center
                    && !doomed.contains(&center)
                {
                    doomed.push(center);
                }
            }
        }

        if let Ok(images) = self.root.select(SOLIDOT_AD_SELECTOR) {
            doomed.extend(images.map(|img| img.as_node().clone()));
        }

        if !doomed.is_empty() {
            debug!(removed = doomed.len(), "removed ad nodes");
        }
        for node in doomed {
            node.detach();
        }
    }

    /// Every `<img>` element in document order.
    #[must_use]
    pub fn images(&self) -> Vec<ImageElement> {
        self.root
            .select("img")
            .map(|images| images.map(ImageElement).collect())
            .unwrap_or_default()
    }

    /// `src` values of every `<img>`, in document order.
    #[must_use]
    pub fn image_sources(&self) -> Vec<String> {
        self.images().iter().map(ImageElement::src).collect()
    }

    /// Trimmed `<title>` text, if non-empty.
    #[must_use]
    pub fn title(&self) -> Option<String> {
        let title = self.root.select_first("title").ok()?;
        let text = title.text_contents();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }

    /// Children of `<body>` serialized as well-formed XHTML.
    ///
    /// Void elements are self-closed, text is escaped with the XML entities
    /// only (so U+00A0 stays a raw character), and comments are dropped.
    #[must_use]
    pub fn body_xhtml(&self) -> String {
        let mut out = String::new();
        if let Ok(body) = self.root.select_first("body") {
            for child in body.as_node().children() {
                write_xhtml(&child, &mut out);
            }
        }
        out
    }
}

fn write_xhtml(node: &NodeRef, out: &mut String) {
    if let Some(text) = node.as_text() {
        escape_xml(&text.borrow(), false, out);
    } else if let Some(element) = node.as_element() {
        write_element(node, element, out);
    }
}

fn write_element(node: &NodeRef, element: &ElementData, out: &mut String) {
    let name = &*element.name.local;
    let ns = &*element.name.ns;
    out.push('<');
    out.push_str(name);

    let attributes = element.attributes.borrow();
    // SVG and MathML subtrees need their own default namespace in XHTML.
    let foreign_root = ns != HTML_NS
        && node
            .parent()
            .and_then(|parent| parent.as_element().map(|p| &*p.name.ns == ns))
            != Some(true);
    if foreign_root {
        if !attributes.map.keys().any(|key| &*key.local == "xmlns") {
            let _ = write!(out, r#" xmlns="{ns}""#);
        }
        let declares_xlink = attributes
            .map
            .iter()
            .any(|(key, attr)| &*key.local == "xlink" && attr.prefix.is_some());
        if !declares_xlink {
            let _ = write!(out, r#" xmlns:xlink="{XLINK_NS}""#);
        }
    }

    for (key, attr) in &attributes.map {
        if !is_xml_name(&key.local) {
            continue;
        }
        out.push(' ');
        if let Some(prefix) = &attr.prefix {
            out.push_str(prefix);
            out.push(':');
        }
        out.push_str(&key.local);
        out.push_str("=\"");
        escape_xml(&attr.value, true, out);
        out.push('"');
    }

    let void = ns == HTML_NS && VOID_ELEMENTS.contains(&name);
    if void || (ns != HTML_NS && node.first_child().is_none()) {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in node.children() {
        write_xhtml(&child, out);
    }
    let _ = write!(out, "</{name}>");
}

fn escape_xml(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            // Not allowed in XML 1.0.
            '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' => {}
            _ => out.push(c),
        }
    }
}

/// Attribute names HTML accepts but XML does not (`@click`, `[x]`) are dropped.
fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
