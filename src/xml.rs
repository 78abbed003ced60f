//! Tag-scoped XML element reader.
//!
//! Builds a small element tree with `quick-xml` so record fields can be read
//! from explicit paths inside their own block. The builder tolerates the
//! damage seen in concatenated E-utilities payloads: mismatched or stray end
//! tags and unclosed elements are recovered from deterministically instead of
//! failing the whole record.

use crate::error::{PubmedError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Name of the synthetic root wrapping all top-level elements
const DOCUMENT: &str = "#document";

/// Child node of an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// XML element with attributes and ordered children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    fn new(name: impl Into<String>, attributes: Vec<(String, String)>) -> Self {
        Self {
            name: name.into(),
            attributes,
            children: Vec::new(),
        }
    }

    fn from_start(start: &BytesStart<'_>) -> Self {
        let name = String::from_utf8_lossy(start.name().as_ref()).to_string();
        let attributes = start
            .attributes()
            .flatten()
            .map(|attr| {
                let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
                let value = attr
                    .unescape_value()
                    .map(|v| v.to_string())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).to_string());
                (key, value)
            })
            .collect();
        Self::new(name, attributes)
    }

    /// Parse a document into a synthetic root element holding every
    /// top-level element.
    pub fn parse(xml: &str) -> Result<Element> {
        let mut reader = Reader::from_str(xml);
        let config = reader.config_mut();
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        let mut stack = vec![Element::new(DOCUMENT, Vec::new())];

        loop {
            match reader.read_event() {
                Ok(Event::Start(start)) => stack.push(Element::from_start(&start)),
                Ok(Event::Empty(start)) => {
                    let element = Element::from_start(&start);
                    push_child(&mut stack, Node::Element(element));
                }
                Ok(Event::End(end)) => {
                    let name = String::from_utf8_lossy(end.name().as_ref()).to_string();
                    close(&mut stack, &name);
                }
                Ok(Event::Text(text)) => {
                    let value = text
                        .unescape()
                        .map(|v| v.to_string())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&text).to_string());
                    push_child(&mut stack, Node::Text(value));
                }
                Ok(Event::CData(data)) => {
                    let value = String::from_utf8_lossy(&data).to_string();
                    push_child(&mut stack, Node::Text(value));
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(PubmedError::Parse(format!(
                        "XML error at byte {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
            }
        }

        // Unclosed elements are closed at end of input
        while stack.len() > 1 {
            fold_top(&mut stack);
        }
        stack
            .pop()
            .ok_or_else(|| PubmedError::Parse("empty element stack".to_string()))
    }

    /// Value of an attribute
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Direct child elements
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// First direct child with the given name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.name == name)
    }

    /// All direct children with the given name, in document order
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements().filter(move |e| e.name == name)
    }

    /// Follow a path of child names, taking the first match at each step.
    pub fn path(&self, names: &[&str]) -> Option<&Element> {
        names.iter().try_fold(self, |element, name| element.child(name))
    }

    /// First descendant with the given name, depth-first in document order
    pub fn descendant(&self, name: &str) -> Option<&Element> {
        for child in self.elements() {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.descendant(name) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants with the given name, in document order
    pub fn descendants(&self, name: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        self.collect_descendants(name, &mut found);
        found
    }

    fn collect_descendants<'a>(&'a self, name: &str, found: &mut Vec<&'a Element>) {
        for child in self.elements() {
            if child.name == name {
                found.push(child);
            }
            child.collect_descendants(name, found);
        }
    }

    /// Concatenated text of this element and its descendants, unmodified
    pub fn raw_text(&self) -> String {
        let mut out = String::new();
        self.append_text(&mut out);
        out
    }

    fn append_text(&self, out: &mut String) {
        for node in &self.children {
            match node {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) => e.append_text(out),
            }
        }
    }

    /// Text content with whitespace runs collapsed to single spaces
    pub fn text(&self) -> String {
        self.raw_text().split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

fn push_child(stack: &mut [Element], node: Node) {
    if let Some(top) = stack.last_mut() {
        top.children.push(node);
    }
}

/// Pop the innermost element into its parent
fn fold_top(stack: &mut Vec<Element>) {
    if stack.len() > 1 {
        if let Some(done) = stack.pop() {
            push_child(stack, Node::Element(done));
        }
    }
}

/// Close the innermost open element named `name`. An end tag that matches
/// no open element is ignored; elements opened inside the matched one are
/// closed with it.
fn close(stack: &mut Vec<Element>, name: &str) {
    let Some(pos) = stack.iter().rposition(|e| e.name == name) else {
        return;
    };
    if pos == 0 {
        return;
    }
    while stack.len() > pos {
        fold_top(stack);
    }
}
