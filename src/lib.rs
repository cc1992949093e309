/// A Textile parser producing a document tree and HTML
pub mod ast;
pub mod block_parser;
pub mod block_syntax;
pub mod document;
pub mod error;
pub mod inline_parser;
pub mod inline_syntax;
pub mod renderer;

use ast::Node;
use document::{Document, Options};
use renderer::HtmlRenderer;

pub use error::ParseError;

/// Split text into lines with `\r\n` and `\r` normalised away
pub fn split_lines(input: &str) -> Vec<String> {
    input
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .map(str::to_string)
        .collect()
}

/// Parse Textile text into a finished document tree
pub fn parse(input: &str, options: Options) -> Vec<Node> {
    let mut document = Document::new(options);
    document.parse_lines(&split_lines(input))
}

/// Parse Textile text and render it to HTML
pub fn textile_to_html(textile: &str) -> String {
    let nodes = parse(textile, Options::default());
    HtmlRenderer::new().render(&nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert_eq!(textile_to_html(""), "");
    }

    #[test]
    fn test_heading_and_paragraph() {
        let result = textile_to_html("h1. Hello\r\n\r\nSome *strong* text\r\non two lines");
        assert_eq!(
            result,
            "<h1 id=\"hello\">Hello</h1>\n<p>Some <strong>strong</strong> text<br />\non two lines</p>\n"
        );
    }

    #[test]
    fn test_code_block() {
        assert_eq!(
            textile_to_html("bc. a <b> & c"),
            "<pre><code>a &lt;b&gt; &amp; c</code></pre>\n"
        );
    }

    #[test]
    fn test_ordered_list() {
        assert_eq!(
            textile_to_html("# one\n# _two_"),
            "<ol>\n<li>one</li>\n<li><em>two</em></li>\n</ol>\n"
        );
    }
}
