/// Document tree produced by the Textile parser
use crate::error::ParseError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    /// Text that is already safe to emit as HTML (escaped or deliberate passthrough)
    Text(String),
    Element(Element),
    /// Raw block text still waiting for the inline parser
    Unparsed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    /// `None` marks a self-closing element such as `<br />`
    pub children: Option<Vec<Node>>,
    pub attributes: BTreeMap<String, String>,
    pub generated_id: Option<String>,
}

/// Callbacks used to walk a finished tree
pub trait NodeVisitor {
    fn visit_text(&mut self, text: &str);

    /// Returning `false` skips the element's children (and `visit_element_after`)
    fn visit_element_before(&mut self, element: &Element) -> bool;

    fn visit_element_after(&mut self, element: &Element);
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    pub fn text_content(&self) -> String {
        match self {
            Node::Text(text) | Node::Unparsed(text) => text.clone(),
            Node::Element(element) => element.text_content(),
        }
    }

    pub fn accept(&self, visitor: &mut dyn NodeVisitor) {
        match self {
            Node::Text(text) => visitor.visit_text(text),
            Node::Element(element) => element.accept(visitor),
            // Substituted by the document before rendering; render as-is if it slips through
            Node::Unparsed(text) => visitor.visit_text(text),
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            _ => None,
        }
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl Element {
    pub fn new(tag: impl Into<String>, children: Vec<Node>) -> Self {
        Element {
            tag: tag.into(),
            children: Some(children),
            attributes: BTreeMap::new(),
            generated_id: None,
        }
    }

    /// A self-closing element with no children list at all
    pub fn empty(tag: impl Into<String>) -> Self {
        Element {
            tag: tag.into(),
            children: None,
            attributes: BTreeMap::new(),
            generated_id: None,
        }
    }

    /// An element holding a single text child
    pub fn text(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Element::new(tag, vec![Node::Text(text.into())])
    }

    /// An element whose content still has to go through the inline parser
    pub fn unparsed(tag: impl Into<String>, raw: impl Into<String>) -> Self {
        Element::new(tag, vec![Node::Unparsed(raw.into())])
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_none()
    }

    pub fn children(&self) -> &[Node] {
        self.children.as_deref().unwrap_or(&[])
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Append a child, refusing to turn a self-closing element into a container
    pub fn push(&mut self, node: Node) -> Result<(), ParseError> {
        match self.children.as_mut() {
            Some(children) => {
                children.push(node);
                Ok(())
            }
            None => Err(ParseError::SelfClosing(self.tag.clone())),
        }
    }

    pub fn text_content(&self) -> String {
        self.children().iter().map(Node::text_content).collect()
    }

    pub fn accept(&self, visitor: &mut dyn NodeVisitor) {
        if visitor.visit_element_before(self) {
            for child in self.children() {
                child.accept(visitor);
            }
            visitor.visit_element_after(self);
        }
    }
}

/// Alignment markers shared by headings, paragraphs and images
pub fn alignment(marker: &str) -> Option<&'static str> {
    match marker {
        "<" => Some("left"),
        ">" => Some("right"),
        "=" => Some("center"),
        "<>" => Some("justify"),
        _ => None,
    }
}
