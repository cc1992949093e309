/// Document-level coordination: block pass, inline pass and link references
use crate::ast::{Element, Node};
use crate::block_parser::BlockParser;
use crate::block_syntax::BlockSyntax;
use crate::inline_parser::InlineParser;
use crate::inline_syntax::InlineSyntax;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::LazyLock;
use unicode_casefold::UnicodeCaseFold;

/// Destinations must look like a URL: a scheme, an absolute or relative path,
/// a fragment, or a `www.` host
static LINK_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^[ \t]*\[([^\[\]]+)\]((?:[A-Za-z][A-Za-z0-9+.-]*:|/|#|\./|\.\./|www\.)\S*)(?:[ \t]+"([^"]*)")?[ \t]*$"#,
    )
    .unwrap()
});

static ENTITY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&#?[A-Za-z0-9]+;").unwrap());

/// Maps an unresolved link label (and title, if any) to a replacement node
pub type Resolver = Rc<dyn Fn(&str, Option<&str>) -> Option<Node>>;

/// A `[label]destination "title"` definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkReference {
    pub label: String,
    pub destination: String,
    pub title: Option<String>,
}

impl LinkReference {
    pub fn new(label: &str, destination: impl Into<String>, title: Option<String>) -> Self {
        LinkReference {
            label: normalize_label(label),
            destination: destination.into(),
            title,
        }
    }

    /// Recognise a definition occupying a whole line
    pub fn parse(line: &str) -> Option<Self> {
        let caps = LINK_REFERENCE.captures(line)?;
        Some(LinkReference::new(
            &caps[1],
            &caps[2],
            caps.get(3).map(|m| m.as_str().to_string()),
        ))
    }
}

/// Case-fold a label and collapse its internal whitespace
pub fn normalize_label(label: &str) -> String {
    label
        .chars()
        .case_fold()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}

/// Parser configuration
#[derive(Clone, Default)]
pub struct Options {
    /// Tried before the standard block syntaxes
    pub block_syntaxes: Vec<Rc<dyn BlockSyntax>>,
    /// Tried before the standard inline syntaxes
    pub inline_syntaxes: Vec<Rc<dyn InlineSyntax>>,
    pub link_resolver: Option<Resolver>,
    pub image_link_resolver: Option<Resolver>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block_syntax(mut self, syntax: Rc<dyn BlockSyntax>) -> Self {
        self.block_syntaxes.push(syntax);
        self
    }

    pub fn with_inline_syntax(mut self, syntax: Rc<dyn InlineSyntax>) -> Self {
        self.inline_syntaxes.push(syntax);
        self
    }

    pub fn with_link_resolver(
        mut self,
        resolver: impl Fn(&str, Option<&str>) -> Option<Node> + 'static,
    ) -> Self {
        self.link_resolver = Some(Rc::new(resolver));
        self
    }

    pub fn with_image_link_resolver(
        mut self,
        resolver: impl Fn(&str, Option<&str>) -> Option<Node> + 'static,
    ) -> Self {
        self.image_link_resolver = Some(Rc::new(resolver));
        self
    }
}

#[derive(Default)]
pub struct Document {
    options: Options,
    link_references: HashMap<String, LinkReference>,
}

impl Document {
    pub fn new(options: Options) -> Self {
        Document {
            options,
            link_references: HashMap::new(),
        }
    }

    pub fn block_syntaxes(&self) -> &[Rc<dyn BlockSyntax>] {
        &self.options.block_syntaxes
    }

    pub fn inline_syntaxes(&self) -> &[Rc<dyn InlineSyntax>] {
        &self.options.inline_syntaxes
    }

    pub fn link_resolver(&self) -> Option<&Resolver> {
        self.options.link_resolver.as_ref()
    }

    pub fn image_link_resolver(&self) -> Option<&Resolver> {
        self.options.image_link_resolver.as_ref()
    }

    /// Register a definition unless its label is already taken. Returns whether it was added.
    pub fn add_link_reference(&mut self, reference: LinkReference) -> bool {
        if self.link_references.contains_key(&reference.label) {
            log::debug!(
                "ignoring duplicate link reference [{}]",
                reference.label
            );
            return false;
        }
        self.link_references
            .insert(reference.label.clone(), reference);
        true
    }

    pub fn link_reference(&self, label: &str) -> Option<&LinkReference> {
        self.link_references.get(&normalize_label(label))
    }

    pub fn link_references(&self) -> &HashMap<String, LinkReference> {
        &self.link_references
    }

    /// Parse whole lines into a finished tree: block pass, then inline pass
    pub fn parse_lines(&mut self, lines: &[String]) -> Vec<Node> {
        let mut blocks = BlockParser::new(lines, self).parse_lines();
        self.resolve_inline(&mut blocks);

        let mut used_ids = HashSet::new();
        assign_heading_ids(&mut blocks, &mut used_ids);
        blocks
    }

    /// Run the inline parser over a single run of text
    pub fn parse_inline(&self, text: &str) -> Vec<Node> {
        InlineParser::new(text, self).parse()
    }

    /// Replace every unparsed node with its inline parse, keeping sibling order
    fn resolve_inline(&self, nodes: &mut Vec<Node>) {
        for node in std::mem::take(nodes) {
            match node {
                Node::Unparsed(raw) => nodes.extend(self.parse_inline(&raw)),
                Node::Element(mut element) => {
                    if let Some(children) = element.children.as_mut() {
                        self.resolve_inline(children);
                    }
                    nodes.push(Node::Element(element));
                }
                text => nodes.push(text),
            }
        }
    }
}

fn assign_heading_ids(nodes: &mut [Node], used: &mut HashSet<String>) {
    for node in nodes {
        let Node::Element(element) = node else {
            continue;
        };
        if is_heading(element) {
            let base = slugify(&element.text_content());
            if !base.is_empty() {
                let mut id = base.clone();
                let mut suffix = 0;
                while used.contains(&id) {
                    suffix += 1;
                    id = format!("{}-{}", base, suffix);
                }
                used.insert(id.clone());
                element.generated_id = Some(id);
            }
        }
        if let Some(children) = element.children.as_mut() {
            assign_heading_ids(children, used);
        }
    }
}

fn is_heading(element: &Element) -> bool {
    matches!(element.tag.as_str(), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// Lower-case alphanumeric words joined by `-`
fn slugify(text: &str) -> String {
    let text = ENTITY.replace_all(text, " ");
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<String>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(input: &[&str]) -> Vec<String> {
        input.iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  Foo   BAR\tbaz "), "foo bar baz");
        assert_eq!(normalize_label("STRASSE"), normalize_label("straße"));
    }

    #[test]
    fn test_link_reference_parse() {
        let reference = LinkReference::parse("[Docs]https://docs.rs \"Rust docs\"").unwrap();
        assert_eq!(reference.label, "docs");
        assert_eq!(reference.destination, "https://docs.rs");
        assert_eq!(reference.title.as_deref(), Some("Rust docs"));

        assert!(LinkReference::parse("[note] not a definition").is_none());
        assert!(LinkReference::parse("[citation]needed").is_none());
        assert!(LinkReference::parse("[WIP]!").is_none());
        assert_eq!(
            LinkReference::parse("[top]#contents").map(|r| r.destination),
            Some("#contents".to_string())
        );
        assert_eq!(
            LinkReference::parse("[site]www.example.com").map(|r| r.destination),
            Some("www.example.com".to_string())
        );
        assert!(LinkReference::parse("plain").is_none());
    }

    #[test]
    fn test_first_definition_wins() {
        let mut document = Document::default();
        assert!(document.add_link_reference(LinkReference::new("a", "/one", None)));
        assert!(!document.add_link_reference(LinkReference::new("A", "/two", None)));
        assert_eq!(document.link_reference("a").unwrap().destination, "/one");
        assert_eq!(document.link_references().len(), 1);
    }

    #[test]
    fn test_unparsed_content_is_replaced() {
        let mut document = Document::default();
        let blocks = document.parse_lines(&lines(&["h1. *Bold* title", "", "plain _words_ here"]));

        fn has_unparsed(nodes: &[Node]) -> bool {
            nodes.iter().any(|node| match node {
                Node::Unparsed(_) => true,
                Node::Element(element) => has_unparsed(element.children()),
                Node::Text(_) => false,
            })
        }
        assert!(!has_unparsed(&blocks));

        let paragraph = blocks[1].as_element().unwrap();
        assert_eq!(paragraph.children().len(), 3);
        assert_eq!(paragraph.children()[0], Node::text("plain "));
        assert_eq!(
            paragraph.children()[1],
            Node::Element(Element::new("em", vec![Node::text("words")]))
        );
        assert_eq!(paragraph.children()[2], Node::text(" here"));
    }

    #[test]
    fn test_nested_unparsed_content_is_replaced() {
        let mut document = Document::default();
        let blocks = document.parse_lines(&lines(&["bq. quoted *text*"]));
        let quote = blocks[0].as_element().unwrap();
        let paragraph = quote.children()[0].as_element().unwrap();
        assert_eq!(paragraph.children()[0], Node::text("quoted "));
        assert_eq!(
            paragraph.children()[1].as_element().map(|e| e.tag.as_str()),
            Some("strong")
        );
    }

    #[test]
    fn test_heading_ids_are_unique() {
        let mut document = Document::default();
        let blocks = document.parse_lines(&lines(&[
            "h1. Getting Started",
            "",
            "h2. Getting started!",
            "",
            "h3. Fish & Chips",
        ]));
        let ids: Vec<Option<&str>> = blocks
            .iter()
            .map(|block| block.as_element().unwrap().generated_id.as_deref())
            .collect();
        assert_eq!(
            ids,
            vec![
                Some("getting-started"),
                Some("getting-started-1"),
                Some("fish-chips")
            ]
        );
    }

    #[test]
    fn test_custom_block_syntax_runs_first() {
        struct Rule;
        static RULE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^----$").unwrap());

        impl BlockSyntax for Rule {
            fn pattern(&self) -> &Regex {
                &RULE
            }
            fn name(&self) -> &'static str {
                "rule"
            }
            fn parse(&self, parser: &mut BlockParser<'_>) -> Option<Node> {
                parser.advance();
                Some(Element::empty("hr").into())
            }
        }

        let mut document = Document::new(Options::new().with_block_syntax(Rc::new(Rule)));
        let blocks = document.parse_lines(&lines(&["above", "----", "below"]));
        let tags: Vec<&str> = blocks
            .iter()
            .filter_map(Node::as_element)
            .map(|element| element.tag.as_str())
            .collect();
        assert_eq!(tags, vec!["p", "hr", "p"]);
    }
}
