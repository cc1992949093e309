/// Inline parser built around a stack of open tags
use crate::ast::Node;
use crate::document::Document;
use crate::inline_syntax::{self, InlineMatch, InlineSyntax};
use crate::renderer::escape_html;
use std::rc::Rc;

/// An inline tag whose closing delimiter has not been seen yet
pub struct TagState {
    /// Offset of the opening delimiter
    pub start_pos: usize,
    /// Offset just past the opening delimiter
    pub end_pos: usize,
    /// `None` only for the root frame
    pub syntax: Option<Rc<dyn InlineSyntax>>,
    pub children: Vec<Node>,
}

impl TagState {
    fn root() -> Self {
        TagState {
            start_pos: 0,
            end_pos: 0,
            syntax: None,
            children: Vec::new(),
        }
    }
}

pub struct InlineParser<'a> {
    source: &'a str,
    document: &'a Document,
    syntaxes: Vec<Rc<dyn InlineSyntax>>,
    pos: usize,
    /// Start of text not yet flushed into a node
    start: usize,
    stack: Vec<TagState>,
}

impl<'a> InlineParser<'a> {
    pub fn new(source: &'a str, document: &'a Document) -> Self {
        let mut syntaxes: Vec<Rc<dyn InlineSyntax>> = document.inline_syntaxes().to_vec();
        syntaxes.extend(inline_syntax::standard_syntaxes());
        Self::with_syntaxes(source, document, syntaxes)
    }

    pub fn with_syntaxes(
        source: &'a str,
        document: &'a Document,
        syntaxes: Vec<Rc<dyn InlineSyntax>>,
    ) -> Self {
        InlineParser {
            source,
            document,
            syntaxes,
            pos: 0,
            start: 0,
            stack: Vec::new(),
        }
    }

    pub fn parse(mut self) -> Vec<Node> {
        self.stack.push(TagState::root());

        while !self.is_done() {
            if self.try_close_open_tag() {
                continue;
            }
            if self.try_syntaxes() {
                continue;
            }
            self.advance_char();
        }

        // Whatever is still open never found its closer
        self.write_text();
        self.collapse_above(0);
        self.stack
            .pop()
            .map(|root| root.children)
            .unwrap_or_default()
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.source.len()
    }

    /// Unconsumed input from the cursor on
    pub fn rest(&self) -> &'a str {
        let source: &'a str = self.source;
        &source[self.pos..]
    }

    pub fn char_before(&self) -> Option<char> {
        self.source[..self.pos].chars().next_back()
    }

    /// Number of frames above the root
    pub fn open_tags(&self) -> usize {
        self.stack.len().saturating_sub(1)
    }

    fn advance_char(&mut self) {
        self.pos += self.rest().chars().next().map_or(1, char::len_utf8);
    }

    fn consume(&mut self, len: usize) {
        self.pos += len;
        self.start = self.pos;
    }

    fn push_node(&mut self, node: Node) {
        if let Some(top) = self.stack.last_mut() {
            top.children.push(node);
        }
    }

    /// Flush pending plain text into the innermost frame
    fn write_text(&mut self) {
        if self.pos > self.start {
            let text = escape_html(&self.source[self.start..self.pos]);
            self.push_node(Node::Text(text));
        }
        self.start = self.pos;
    }

    fn try_syntaxes(&mut self) -> bool {
        for index in 0..self.syntaxes.len() {
            let syntax = Rc::clone(&self.syntaxes[index]);
            let Some(found) = syntax.try_match(self) else {
                continue;
            };

            self.write_text();
            match found {
                InlineMatch::Emit { nodes, len } => {
                    for node in nodes {
                        self.push_node(node);
                    }
                    self.consume(len);
                }
                InlineMatch::Open { len } => {
                    self.stack.push(TagState {
                        start_pos: self.pos,
                        end_pos: self.pos + len,
                        syntax: Some(syntax),
                        children: Vec::new(),
                    });
                    self.consume(len);
                }
            }
            return true;
        }
        false
    }

    /// Check open frames, innermost first, for a closing delimiter at the cursor
    fn try_close_open_tag(&mut self) -> bool {
        for index in (1..self.stack.len()).rev() {
            let Some(syntax) = self.stack[index].syntax.clone() else {
                continue;
            };
            if syntax.matches_end(self, &self.stack[index]) {
                self.close_tag(index, syntax);
                return true;
            }
        }
        false
    }

    fn close_tag(&mut self, index: usize, syntax: Rc<dyn InlineSyntax>) {
        self.write_text();
        // Frames opened inside this one but never closed lose their markup
        self.collapse_above(index);

        let Some(state) = self.stack.pop() else {
            return;
        };
        match syntax.close(self, state) {
            Ok((node, len)) => {
                self.push_node(node);
                self.consume(len);
            }
            Err(state) => {
                log::trace!(
                    "{} closer at {} failed validation",
                    syntax.name(),
                    self.pos
                );
                self.degrade(state);
                // The rejected closer stays behind as ordinary text
                self.start = self.pos;
                self.advance_char();
            }
        }
    }

    /// Degrade every frame above `index`, innermost first
    fn collapse_above(&mut self, index: usize) {
        while self.stack.len() > index + 1 {
            if let Some(state) = self.stack.pop() {
                self.degrade(state);
            }
        }
    }

    /// Turn a frame back into literal text, handing its children to the new top
    fn degrade(&mut self, state: TagState) {
        let opener = &self.source[state.start_pos..state.end_pos];
        log::debug!("unmatched inline delimiter {:?} at {}", opener, state.start_pos);

        let text = Node::Text(escape_html(opener));
        if let Some(top) = self.stack.last_mut() {
            top.children.push(text);
            top.children.extend(state.children);
        }
    }
}
