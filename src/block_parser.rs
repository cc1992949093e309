/// Block-level parser: walks input lines and dispatches to block syntaxes
use crate::ast::Node;
use crate::block_syntax::{self, BlockSyntax};
use crate::document::Document;
use crate::error::ParseError;
use regex::Regex;
use std::rc::Rc;

/// Numbering state carried between sibling ordered lists of one parser.
/// Nesting depth is tracked by the list syntax itself and lives only for one
/// list invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListContext {
    /// Number of the last item emitted by a top-level ordered list
    pub last_number: u32,
}

pub struct BlockParser<'a> {
    lines: &'a [String],
    pos: usize,
    pub document: &'a mut Document,
    syntaxes: Vec<Rc<dyn BlockSyntax>>,
    /// Set by the blank-line syntax; never reset within one parser
    pub encountered_blank_line: bool,
    list_context: ListContext,
}

impl<'a> BlockParser<'a> {
    /// Create a parser using the document's custom syntaxes followed by the standard set
    pub fn new(lines: &'a [String], document: &'a mut Document) -> Self {
        let mut syntaxes: Vec<Rc<dyn BlockSyntax>> = document.block_syntaxes().to_vec();
        syntaxes.extend(block_syntax::standard_syntaxes());
        Self::with_syntaxes(lines, document, syntaxes)
    }

    /// Create a parser restricted to exactly the given syntaxes, in order
    pub fn with_syntaxes(
        lines: &'a [String],
        document: &'a mut Document,
        syntaxes: Vec<Rc<dyn BlockSyntax>>,
    ) -> Self {
        BlockParser {
            lines,
            pos: 0,
            document,
            syntaxes,
            encountered_blank_line: false,
            list_context: ListContext::default(),
        }
    }

    /// A fresh parser over `lines` sharing this parser's document and syntaxes.
    /// Cursor and list numbering start over.
    pub fn child<'b>(&'b mut self, lines: &'b [String]) -> BlockParser<'b> {
        BlockParser {
            lines,
            pos: 0,
            document: &mut *self.document,
            syntaxes: self.syntaxes.clone(),
            encountered_blank_line: false,
            list_context: ListContext::default(),
        }
    }

    /// Parse every remaining line into block nodes
    pub fn parse_lines(&mut self) -> Vec<Node> {
        let mut blocks = Vec::new();

        while !self.is_done() {
            let start = self.pos;

            if let Some(syntax) = self.first_matching() {
                log::trace!("line {}: {}", self.pos + 1, syntax.name());
                if let Some(node) = syntax.parse(self) {
                    blocks.push(node);
                }
            }

            // Guarantee progress even if nothing matched or the rule did not consume
            if self.pos == start {
                log::debug!("no syntax consumed line {}, skipping it", self.pos + 1);
                self.advance();
            }
        }

        blocks
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.lines.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// The line under the cursor, or "" once the input is exhausted
    pub fn current(&self) -> &'a str {
        let lines: &'a [String] = self.lines;
        lines.get(self.pos).map(String::as_str).unwrap_or("")
    }

    pub fn next(&self) -> Option<&'a str> {
        let lines: &'a [String] = self.lines;
        lines.get(self.pos + 1).map(String::as_str)
    }

    /// The line `lines_ahead` past the cursor; `peek(0)` is the current line
    pub fn peek(&self, lines_ahead: isize) -> Result<Option<&'a str>, ParseError> {
        if lines_ahead < 0 {
            return Err(ParseError::NegativeLookahead(lines_ahead));
        }
        let lines: &'a [String] = self.lines;
        Ok(lines
            .get(self.pos + lines_ahead as usize)
            .map(String::as_str))
    }

    pub fn advance(&mut self) {
        self.pos += 1;
    }

    pub fn matches(&self, regex: &Regex) -> bool {
        !self.is_done() && regex.is_match(self.current())
    }

    pub fn matches_next(&self, regex: &Regex) -> bool {
        self.next().is_some_and(|line| regex.is_match(line))
    }

    /// First registered syntax able to parse the current line
    pub fn first_matching(&self) -> Option<Rc<dyn BlockSyntax>> {
        if self.is_done() {
            return None;
        }
        self.syntaxes
            .iter()
            .find(|syntax| syntax.can_parse(self))
            .cloned()
    }

    /// First syntax that would match `offset` lines ahead, without moving the cursor
    pub fn syntax_at(&mut self, offset: usize) -> Option<Rc<dyn BlockSyntax>> {
        let saved = self.pos;
        self.pos += offset;
        let found = self.first_matching();
        self.pos = saved;
        found
    }

    /// True at end of input or when a block-ending syntax claims the current line
    pub fn is_at_block_end(&self) -> bool {
        self.is_done()
            || self
                .syntaxes
                .iter()
                .any(|syntax| syntax.can_end_block() && syntax.can_parse(self))
    }

    pub fn list_context(&self) -> ListContext {
        self.list_context
    }

    pub fn set_list_context(&mut self, context: ListContext) {
        self.list_context = context;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_syntax::HeadingSyntax;

    fn lines(input: &[&str]) -> Vec<String> {
        input.iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn test_cursor_lookahead() {
        let input = lines(&["one", "two", "three"]);
        let mut document = Document::default();
        let mut parser = BlockParser::new(&input, &mut document);

        assert_eq!(parser.current(), "one");
        assert_eq!(parser.next(), Some("two"));
        assert_eq!(parser.peek(2), Ok(Some("three")));
        assert_eq!(parser.peek(3), Ok(None));
        assert_eq!(parser.peek(-1), Err(ParseError::NegativeLookahead(-1)));

        parser.advance();
        parser.advance();
        assert_eq!(parser.current(), "three");
        assert_eq!(parser.next(), None);
        parser.advance();
        assert!(parser.is_done());
        assert_eq!(parser.current(), "");
    }

    #[test]
    fn test_only_heading_syntax_registered() {
        let input = lines(&["h1. Title One", "", "h2. Title Two"]);
        let mut document = Document::default();
        let mut parser =
            BlockParser::with_syntaxes(&input, &mut document, vec![Rc::new(HeadingSyntax)]);
        let blocks = parser.parse_lines();

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text_content(), "Title One");
        assert_eq!(blocks[1].text_content(), "Title Two");
        assert!(parser.is_done());
    }

    #[test]
    fn test_unmatched_lines_are_skipped() {
        let input = lines(&["plain", "text"]);
        let mut document = Document::default();
        let mut parser = BlockParser::with_syntaxes(&input, &mut document, Vec::new());
        assert!(parser.parse_lines().is_empty());
        assert!(parser.is_done());
    }

    #[test]
    fn test_block_end_detection() {
        let input = lines(&["para", "h2. Heading", "# item", ""]);
        let mut document = Document::default();
        let mut parser = BlockParser::new(&input, &mut document);

        assert!(!parser.is_at_block_end());
        parser.advance();
        assert!(parser.is_at_block_end());
        // Lists continue a paragraph rather than ending it
        parser.advance();
        assert!(!parser.is_at_block_end());
        parser.advance();
        assert!(parser.is_at_block_end());
        parser.advance();
        assert!(parser.is_at_block_end());
    }

    #[test]
    fn test_blank_line_flag() {
        let input = lines(&["", "text"]);
        let mut document = Document::default();
        let mut parser = BlockParser::new(&input, &mut document);
        parser.parse_lines();
        assert!(parser.encountered_blank_line);
    }

    #[test]
    fn test_syntax_at_restores_cursor() {
        let input = lines(&["", "plain text"]);
        let mut document = Document::default();
        let mut parser = BlockParser::new(&input, &mut document);

        let found = parser.syntax_at(1);
        assert!(found.is_some_and(|syntax| syntax.is_fallback()));
        assert_eq!(parser.position(), 0);
        assert!(parser.syntax_at(5).is_none());
    }
}
