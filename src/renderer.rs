/// HTML renderer for the Textile document tree
use crate::ast::{Element, Node, NodeVisitor};

/// Tags that start on their own line and are followed by a newline
const BLOCK_TAGS: &[&str] = &[
    "blockquote", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ol", "p", "pre", "ul",
];

/// Tags whose opening tag is followed by a newline
const CONTAINER_TAGS: &[&str] = &["blockquote", "ol", "ul"];

pub struct HtmlRenderer;

impl HtmlRenderer {
    pub fn new() -> Self {
        HtmlRenderer
    }

    pub fn render(&self, nodes: &[Node]) -> String {
        let mut writer = HtmlWriter::default();
        for node in nodes {
            node.accept(&mut writer);
            writer.end_line();
        }
        writer.buffer
    }
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default)]
struct HtmlWriter {
    buffer: String,
}

impl HtmlWriter {
    fn end_line(&mut self) {
        if !self.buffer.is_empty() && !self.buffer.ends_with('\n') {
            self.buffer.push('\n');
        }
    }

    fn write_open_tag(&mut self, element: &Element) {
        self.buffer.push('<');
        self.buffer.push_str(&element.tag);

        let generated = element
            .generated_id
            .as_deref()
            .filter(|_| !element.attributes.contains_key("id"));
        let mut attributes: Vec<(&str, &str)> = element
            .attributes
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .chain(generated.map(|id| ("id", id)))
            .collect();
        attributes.sort_unstable();

        for (name, value) in attributes {
            self.buffer.push(' ');
            self.buffer.push_str(name);
            self.buffer.push_str("=\"");
            self.buffer.push_str(&escape_html(value));
            self.buffer.push('"');
        }
    }
}

impl NodeVisitor for HtmlWriter {
    fn visit_text(&mut self, text: &str) {
        // Text nodes are stored ready for output
        self.buffer.push_str(text);
    }

    fn visit_element_before(&mut self, element: &Element) -> bool {
        let tag = element.tag.as_str();
        if BLOCK_TAGS.contains(&tag) {
            self.end_line();
        }
        self.write_open_tag(element);

        if element.is_empty() {
            self.buffer.push_str(" />");
            return false;
        }
        self.buffer.push('>');
        if CONTAINER_TAGS.contains(&tag) {
            self.buffer.push('\n');
        }
        true
    }

    fn visit_element_after(&mut self, element: &Element) {
        let tag = element.tag.as_str();
        if CONTAINER_TAGS.contains(&tag) {
            self.end_line();
        }
        self.buffer.push_str("</");
        self.buffer.push_str(tag);
        self.buffer.push('>');
        if BLOCK_TAGS.contains(&tag) {
            self.buffer.push('\n');
        }
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
