use regex::Regex;
use std::rc::Rc;
use textmark::ast::Node;
use textmark::block_parser::BlockParser;
use textmark::block_syntax::{BlockSyntax, HeadingSyntax};
use textmark::document::{Document, Options};
use textmark::renderer::HtmlRenderer;
use textmark::{parse, split_lines};

fn normalized(text: &str) -> String {
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

fn block_pass(input: &str) -> Vec<Node> {
    let lines = split_lines(input);
    let mut document = Document::default();
    BlockParser::new(&lines, &mut document).parse_lines()
}

#[test]
fn block_pass_preserves_content() {
    let blocks = block_pass(
        "First para line\ncontinues  here\n\nh2. Heading\n\nbq. Quoted words\n\n* item *one*",
    );
    let contents: Vec<String> = blocks
        .iter()
        .map(|block| normalized(&block.text_content()))
        .collect();
    assert_eq!(
        contents,
        vec![
            "First para line continues here",
            "Heading",
            "Quoted words",
            "item *one*",
        ]
    );
}

#[test]
fn rendering_plain_text_is_stable() {
    let input = "Plain words here\n\nAnother paragraph";
    let first = parse(input, Options::default());
    let html = HtmlRenderer::new().render(&first);

    let tags = Regex::new(r"<[^>]+>").unwrap();
    let extracted = tags.replace_all(&html, "");
    let reparsed_input = extracted
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<&str>>()
        .join("\n\n");
    let second = parse(&reparsed_input, Options::default());

    let text = |nodes: &[Node]| -> Vec<String> { nodes.iter().map(Node::text_content).collect() };
    assert_eq!(text(&first), text(&second));
}

#[test]
fn code_block_content_is_escaped() {
    let nodes = parse("bc. if x < 1", Options::default());
    let pre = nodes[0].as_element().unwrap();
    assert_eq!(pre.tag, "pre");
    let code = pre.children()[0].as_element().unwrap();
    assert_eq!(code.tag, "code");
    assert_eq!(code.text_content(), "if x &lt; 1");
}

#[test]
fn heading_only_parser() {
    let lines = split_lines("h1. Title One\n\nh2. Title Two");
    let mut document = Document::default();
    let syntaxes: Vec<Rc<dyn BlockSyntax>> = vec![Rc::new(HeadingSyntax)];
    let blocks = BlockParser::with_syntaxes(&lines, &mut document, syntaxes).parse_lines();
    let contents: Vec<String> = blocks.iter().map(Node::text_content).collect();
    assert_eq!(contents, vec!["Title One", "Title Two"]);
}

#[test]
fn ordered_list_continues_numbering() {
    let lines = split_lines("# one\n# two\n#_ three");
    let mut document = Document::default();
    let mut parser = BlockParser::new(&lines, &mut document);
    let blocks = parser.parse_lines();

    assert_eq!(blocks.len(), 1);
    let list = blocks[0].as_element().unwrap();
    assert_eq!(list.tag, "ol");
    assert_eq!(list.children().len(), 3);
    assert_eq!(parser.list_context().last_number, 3);
}

#[test]
fn unmatched_inline_markup_is_kept() {
    let nodes = Document::default().parse_inline("_open *inner* tail");
    assert_eq!(nodes[0], Node::text("_"));
    assert!(
        nodes
            .iter()
            .any(|node| node.as_element().is_some_and(|e| e.tag == "strong"))
    );
    let content: String = nodes.iter().map(Node::text_content).collect();
    assert_eq!(content, "_open inner tail");
}

#[test]
fn nested_blockquotes() {
    let nodes = parse(
        "bq.. outer\nbq. inner\ntext\n\nmore outer",
        Options::default(),
    );
    assert_eq!(nodes.len(), 1);
    let outer = nodes[0].as_element().unwrap();
    assert_eq!(outer.tag, "blockquote");
    assert!(
        outer
            .children()
            .iter()
            .any(|child| child.as_element().is_some_and(|e| e.tag == "blockquote"))
    );
}
