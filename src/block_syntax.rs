/// Block syntaxes: one recognizer plus builder per Textile block production
use crate::ast::{Element, Node, alignment};
use crate::block_parser::{BlockParser, ListContext};
use crate::document::LinkReference;
use crate::error::ParseError;
use crate::renderer::escape_html;
use regex::Regex;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::LazyLock;

static BLANK_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[ \t]*$").unwrap());

/// Any line that explicitly opens a new Textile block
static BLOCK_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:h[1-6]|p|bq|bc|pre|notextile|###)(?:<>|<|>|=)?\.{1,2}(?::\S+)?(?:[ \t]|$)")
        .unwrap()
});

static ANY_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^").unwrap());

static COMMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^###(\.\.?)(?:[ \t]|$)").unwrap());

static HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^h([1-6])(<>|<|>|=)?\.(?:[ \t]+(.*))?$").unwrap());

static LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^notextile(\.\.?)(?:[ \t]+(.*))?$").unwrap());

static CODE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(pre|bc)(\.\.?)?(?:[ \t]+(.*))?$").unwrap());

static BLOCKQUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^bq(\.\.?)(?::(\S+))?(?:[ \t]+(.*))?$").unwrap());

static LIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([#*]+)([0-9]+|_)?(?:\(([^()]*)\))?(?:\[([A-Za-z]{2}(?:-[A-Za-z]{2})?)\])?(?:\{([^{}]*)\})?\.?[ \t]+(.*)$",
    )
    .unwrap()
});

static EXPLICIT_PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^p(<>|<|>|=)?\.(?:[ \t]+(.*))?$").unwrap());

static HTML_RAW_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[ ]{0,3}<(?:pre|script|style)(?:[ \t>]|$)").unwrap());
static HTML_RAW_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</(?:pre|script|style)>").unwrap());
static HTML_COMMENT_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ ]{0,3}<!--").unwrap());
static HTML_COMMENT_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"-->").unwrap());
static HTML_PI_START: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[ ]{0,3}<\?").unwrap());
static HTML_PI_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\?>").unwrap());
static HTML_DECLARATION_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ ]{0,3}<![A-Za-z]").unwrap());
static HTML_DECLARATION_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r">").unwrap());
static HTML_CDATA_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[ ]{0,3}<!\[CDATA\[").unwrap());
static HTML_CDATA_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\]\]>").unwrap());
static HTML_KNOWN_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^[ ]{0,3}</?(?:address|article|aside|blockquote|body|caption|center|col|colgroup|dd|details|dialog|dir|div|dl|dt|fieldset|figcaption|figure|footer|form|frame|frameset|h[1-6]|head|header|hr|html|iframe|legend|li|link|main|menu|nav|noframes|ol|optgroup|option|p|param|section|summary|table|tbody|td|tfoot|th|thead|title|tr|ul)(?:[ \t]|/?>|$)",
    )
    .unwrap()
});
static HTML_OTHER_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^[ ]{0,3}(?:<[A-Za-z][A-Za-z0-9-]*(?:[ \t]+[A-Za-z_:][A-Za-z0-9_.:-]*(?:[ \t]*=[ \t]*(?:[^ \t"'=<>`]+|'[^']*'|"[^"]*"))?)*[ \t]*/?>|</[A-Za-z][A-Za-z0-9-]*[ \t]*>)[ \t]*$"#,
    )
    .unwrap()
});

pub trait BlockSyntax {
    /// Pattern tested against the current line by the default `can_parse`
    fn pattern(&self) -> &Regex;

    /// Short name used in trace logging
    fn name(&self) -> &'static str;

    fn can_parse(&self, parser: &BlockParser<'_>) -> bool {
        self.pattern().is_match(parser.current())
    }

    /// Whether a line this syntax accepts terminates a preceding open block
    fn can_end_block(&self) -> bool {
        true
    }

    /// Whether this is the catch-all paragraph syntax
    fn is_fallback(&self) -> bool {
        false
    }

    /// Consume lines starting at the cursor, optionally producing a node
    fn parse(&self, parser: &mut BlockParser<'_>) -> Option<Node>;
}

/// Standard syntaxes in priority order
pub fn standard_syntaxes() -> Vec<Rc<dyn BlockSyntax>> {
    vec![
        Rc::new(BlankLineSyntax),
        Rc::new(CommentSyntax),
        Rc::new(HtmlBlockSyntax::raw_text()),
        Rc::new(HtmlBlockSyntax::comment()),
        Rc::new(HtmlBlockSyntax::processing_instruction()),
        Rc::new(HtmlBlockSyntax::cdata()),
        Rc::new(HtmlBlockSyntax::declaration()),
        Rc::new(HtmlBlockSyntax::known_tag()),
        Rc::new(HtmlBlockSyntax::other_tag()),
        Rc::new(HeadingSyntax),
        Rc::new(LiteralSyntax),
        Rc::new(CodeBlockSyntax),
        Rc::new(BlockquoteSyntax),
        Rc::new(ListSyntax),
        Rc::new(ParagraphSyntax),
    ]
}

pub fn is_blank(line: &str) -> bool {
    BLANK_LINE.is_match(line)
}

/// Whether a line opens a new block with an explicit Textile signature
pub fn is_block_start(line: &str) -> bool {
    BLOCK_START.is_match(line)
}

/// Collect the body of a dotted block whose marker line sits at the cursor.
///
/// Inline text on the marker line is the whole body for single-dot blocks.
/// Without it, a single-dot block runs to the next blank line. Extended (`..`)
/// blocks keep going, blank lines included, until a line opens a new block.
fn collect_body(parser: &mut BlockParser<'_>, extended: bool, inline: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    parser.advance();

    if let Some(text) = inline.filter(|text| !text.trim().is_empty()) {
        lines.push(text.to_string());
        if !extended {
            return lines;
        }
    }

    while !parser.is_done() {
        let line = parser.current();
        if extended && is_block_start(line) {
            break;
        }
        if !extended && is_blank(line) {
            break;
        }
        lines.push(line.to_string());
        parser.advance();
    }

    while lines.last().is_some_and(|line| is_blank(line)) {
        lines.pop();
    }
    lines
}

/// Take lines up to (not including) the next blank line
fn collect_until_blank(parser: &mut BlockParser<'_>, lines: &mut Vec<String>) {
    while !parser.is_done() && !is_blank(parser.current()) {
        lines.push(parser.current().to_string());
        parser.advance();
    }
}

/// Decode `(class#id)`, `[lang]` and `{style}` modifiers into attributes
pub fn block_attributes(
    class_id: Option<&str>,
    lang: Option<&str>,
    style: Option<&str>,
) -> BTreeMap<String, String> {
    let mut attributes = BTreeMap::new();

    if let Some(class_id) = class_id.map(str::trim).filter(|s| !s.is_empty()) {
        let (class, id) = match class_id.split_once('#') {
            Some((class, id)) => (class.trim(), Some(id.trim())),
            None => (class_id, None),
        };
        if !class.is_empty() {
            attributes.insert("class".to_string(), class.to_string());
        }
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            attributes.insert("id".to_string(), id.to_string());
        }
    }
    if let Some(lang) = lang {
        attributes.insert("lang".to_string(), lang.to_string());
    }
    if let Some(style) = style.map(str::trim).filter(|s| !s.is_empty()) {
        attributes.insert("style".to_string(), style.trim_end_matches(';').to_string());
    }

    attributes
}

fn text_align(marker: Option<&str>) -> Option<String> {
    marker
        .and_then(alignment)
        .map(|align| format!("text-align:{}", align))
}

pub struct BlankLineSyntax;

impl BlockSyntax for BlankLineSyntax {
    fn pattern(&self) -> &Regex {
        &BLANK_LINE
    }

    fn name(&self) -> &'static str {
        "blank line"
    }

    fn parse(&self, parser: &mut BlockParser<'_>) -> Option<Node> {
        parser.encountered_blank_line = true;
        parser.advance();
        None
    }
}

/// `###.` swallows lines to the next blank line, `###..` to the next block start
pub struct CommentSyntax;

impl BlockSyntax for CommentSyntax {
    fn pattern(&self) -> &Regex {
        &COMMENT
    }

    fn name(&self) -> &'static str {
        "comment"
    }

    fn parse(&self, parser: &mut BlockParser<'_>) -> Option<Node> {
        let extended = COMMENT
            .captures(parser.current())
            .is_some_and(|caps| &caps[1] == "..");
        parser.advance();

        while !parser.is_done() {
            let line = parser.current();
            if (extended && is_block_start(line)) || (!extended && is_blank(line)) {
                break;
            }
            parser.advance();
        }
        None
    }
}

enum HtmlBlockEnd {
    Pattern(&'static Regex),
    BlankLine,
}

/// Raw HTML passed through untouched as a single text node
pub struct HtmlBlockSyntax {
    name: &'static str,
    start: &'static Regex,
    end: HtmlBlockEnd,
    ends_block: bool,
}

impl HtmlBlockSyntax {
    /// `<pre>`, `<script>` and `<style>`, which may contain blank lines
    pub fn raw_text() -> Self {
        Self::terminated("raw html", &HTML_RAW_START, &HTML_RAW_END)
    }

    pub fn comment() -> Self {
        Self::terminated("html comment", &HTML_COMMENT_START, &HTML_COMMENT_END)
    }

    pub fn processing_instruction() -> Self {
        Self::terminated("processing instruction", &HTML_PI_START, &HTML_PI_END)
    }

    pub fn declaration() -> Self {
        Self::terminated("html declaration", &HTML_DECLARATION_START, &HTML_DECLARATION_END)
    }

    pub fn cdata() -> Self {
        Self::terminated("cdata", &HTML_CDATA_START, &HTML_CDATA_END)
    }

    /// A known block-level tag, running to the next blank line
    pub fn known_tag() -> Self {
        HtmlBlockSyntax {
            name: "html block",
            start: &HTML_KNOWN_TAG,
            end: HtmlBlockEnd::BlankLine,
            ends_block: true,
        }
    }

    /// Any other complete tag alone on its line; cannot interrupt a paragraph
    pub fn other_tag() -> Self {
        HtmlBlockSyntax {
            name: "html tag",
            start: &HTML_OTHER_TAG,
            end: HtmlBlockEnd::BlankLine,
            ends_block: false,
        }
    }

    fn terminated(name: &'static str, start: &'static Regex, end: &'static Regex) -> Self {
        HtmlBlockSyntax {
            name,
            start,
            end: HtmlBlockEnd::Pattern(end),
            ends_block: true,
        }
    }
}

impl BlockSyntax for HtmlBlockSyntax {
    fn pattern(&self) -> &Regex {
        self.start
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn can_end_block(&self) -> bool {
        self.ends_block
    }

    fn parse(&self, parser: &mut BlockParser<'_>) -> Option<Node> {
        let start_line = parser.position();
        let mut lines = Vec::new();

        match self.end {
            HtmlBlockEnd::Pattern(end) => {
                let mut terminated = false;
                // The terminator may sit on the opening line itself
                while !parser.is_done() {
                    let line = parser.current();
                    lines.push(line.to_string());
                    parser.advance();
                    if end.is_match(line) {
                        terminated = true;
                        break;
                    }
                }
                if !terminated {
                    log::debug!(
                        "{} at line {} is never closed, consumed to end of input",
                        self.name,
                        start_line + 1
                    );
                }
            }
            HtmlBlockEnd::BlankLine => collect_until_blank(parser, &mut lines),
        }

        Some(Node::Text(lines.join("\n")))
    }
}

/// `h1.` to `h6.`, with optional alignment
pub struct HeadingSyntax;

impl BlockSyntax for HeadingSyntax {
    fn pattern(&self) -> &Regex {
        &HEADING
    }

    fn name(&self) -> &'static str {
        "heading"
    }

    fn parse(&self, parser: &mut BlockParser<'_>) -> Option<Node> {
        let caps = HEADING.captures(parser.current())?;
        let tag = format!("h{}", &caps[1]);
        let text = caps.get(3).map_or("", |m| m.as_str()).trim();
        let mut heading = Element::unparsed(tag, text);
        if let Some(style) = text_align(caps.get(2).map(|m| m.as_str())) {
            heading = heading.with_attribute("style", style);
        }
        parser.advance();
        Some(heading.into())
    }
}

/// `notextile.` content is emitted exactly as written
pub struct LiteralSyntax;

impl BlockSyntax for LiteralSyntax {
    fn pattern(&self) -> &Regex {
        &LITERAL
    }

    fn name(&self) -> &'static str {
        "notextile"
    }

    fn parse(&self, parser: &mut BlockParser<'_>) -> Option<Node> {
        let caps = LITERAL.captures(parser.current())?;
        let extended = &caps[1] == "..";
        let inline = caps.get(2).map(|m| m.as_str());
        let lines = collect_body(parser, extended, inline);
        Some(Node::Text(lines.join("\n")))
    }
}

/// `pre` and `bc` blocks, escaped and never inline-parsed
pub struct CodeBlockSyntax;

impl BlockSyntax for CodeBlockSyntax {
    fn pattern(&self) -> &Regex {
        &CODE_BLOCK
    }

    fn name(&self) -> &'static str {
        "code block"
    }

    fn can_end_block(&self) -> bool {
        false
    }

    fn parse(&self, parser: &mut BlockParser<'_>) -> Option<Node> {
        let caps = CODE_BLOCK.captures(parser.current())?;
        let is_code = &caps[1] == "bc";
        // No dots behaves like one dot
        let extended = caps.get(2).is_some_and(|m| m.as_str() == "..");
        let inline = caps.get(3).map(|m| m.as_str());

        let lines = collect_body(parser, extended, inline);
        let literal = escape_html(&lines.join("\n"));

        let pre = if is_code {
            Element::new("pre", vec![Element::text("code", literal).into()])
        } else {
            Element::text("pre", literal)
        };
        Some(pre.into())
    }
}

/// `bq.` and `bq..`, with an optional `:cite` URL; the body is parsed recursively
pub struct BlockquoteSyntax;

impl BlockSyntax for BlockquoteSyntax {
    fn pattern(&self) -> &Regex {
        &BLOCKQUOTE
    }

    fn name(&self) -> &'static str {
        "blockquote"
    }

    fn parse(&self, parser: &mut BlockParser<'_>) -> Option<Node> {
        let caps = BLOCKQUOTE.captures(parser.current())?;
        let extended = &caps[1] == "..";
        let cite = caps.get(2).map(|m| m.as_str().to_string());
        let mut lines = Vec::new();
        if let Some(text) = caps.get(3).map(|m| m.as_str()).filter(|t| !t.trim().is_empty()) {
            lines.push(text.to_string());
        }
        parser.advance();
        collect_until_blank(parser, &mut lines);

        // Extended quotes keep absorbing paragraphs separated by single blank lines
        while extended && !parser.is_done() && is_blank(parser.current()) {
            match parser.syntax_at(1) {
                Some(syntax) if syntax.is_fallback() => {
                    lines.push(String::new());
                    parser.advance();
                    collect_until_blank(parser, &mut lines);
                }
                _ => break,
            }
        }

        let children = parser.child(&lines).parse_lines();
        let mut blockquote = Element::new("blockquote", children);
        if let Some(cite) = cite {
            blockquote = blockquote.with_attribute("cite", cite);
        }
        Some(blockquote.into())
    }
}

/// How a list item's marker asks to be numbered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Numbering {
    Next,
    Resume,
    Set(u32),
}

struct ListLine {
    markers: String,
    numbering: Numbering,
    attributes: BTreeMap<String, String>,
    text: String,
}

impl ListLine {
    fn parse(line: &str) -> Option<Self> {
        let caps = LIST_ITEM.captures(line)?;
        let numbering = match caps.get(2).map(|m| m.as_str()) {
            Some("_") => Numbering::Resume,
            Some(digits) => digits.parse().map_or(Numbering::Next, Numbering::Set),
            None => Numbering::Next,
        };
        Some(ListLine {
            markers: caps[1].to_string(),
            numbering,
            attributes: block_attributes(
                caps.get(3).map(|m| m.as_str()),
                caps.get(4).map(|m| m.as_str()),
                caps.get(5).map(|m| m.as_str()),
            ),
            text: caps[6].trim().to_string(),
        })
    }

    fn depth(&self) -> usize {
        self.markers.len()
    }

    /// The marker character deciding this item's list type
    fn marker(&self) -> char {
        self.markers.chars().last().unwrap_or('*')
    }
}

fn list_tag(marker: char) -> &'static str {
    match marker {
        '#' => "ol",
        _ => "ul",
    }
}

/// One list still accepting items while the list syntax walks its lines
struct OpenList {
    marker: char,
    depth: usize,
    element: Element,
    /// Number of the last item added, for ordered lists
    last_number: u32,
}

impl OpenList {
    fn open(marker: char, depth: usize, base: u32) -> Self {
        OpenList {
            marker,
            depth,
            element: Element::new(list_tag(marker), Vec::new()),
            last_number: base,
        }
    }

    fn item_count(&self) -> usize {
        self.element.children().len()
    }

    fn add_item(&mut self, line: ListLine) -> Result<(), ParseError> {
        let mut item = Element::unparsed("li", line.text);
        item.attributes = line.attributes;

        if self.marker == '#' {
            let natural = self.last_number.saturating_add(1);
            let number = match line.numbering {
                Numbering::Set(n) => n,
                Numbering::Next if self.item_count() == 0 => 1,
                Numbering::Next | Numbering::Resume => natural,
            };
            if self.item_count() == 0 {
                if number != 1 {
                    self.element
                        .attributes
                        .insert("start".to_string(), number.to_string());
                }
            } else if number != natural {
                item = item.with_attribute("value", number.to_string());
            }
            self.last_number = number;
        }

        self.element.push(item.into())
    }
}

/// `#` and `*` lists, nesting by marker run length
pub struct ListSyntax;

impl ListSyntax {
    /// Close the innermost open list, attaching it to its parent's last item
    fn close_innermost(stack: &mut Vec<OpenList>) -> Result<(), ParseError> {
        let Some(inner) = stack.pop() else {
            return Ok(());
        };
        if let Some(parent) = stack.last_mut()
            && let Some(Node::Element(item)) = parent
                .element
                .children
                .as_mut()
                .and_then(|items| items.last_mut())
        {
            item.push(inner.element.into())?;
        }
        Ok(())
    }

    fn build(
        parser: &mut BlockParser<'_>,
        context: &mut ListContext,
    ) -> Result<Option<Node>, ParseError> {
        let Some(first) = ListLine::parse(parser.current()) else {
            return Ok(None);
        };
        let root_depth = first.depth();
        let root_marker = first.marker();
        let mut stack: Vec<OpenList> = Vec::new();

        while !parser.is_done() {
            let Some(line) = ListLine::parse(parser.current()) else {
                break;
            };
            let depth = line.depth();
            if depth < root_depth {
                break;
            }

            while stack.last().is_some_and(|open| open.depth > depth) {
                Self::close_innermost(&mut stack)?;
            }

            if let Some(open) = stack.last()
                && open.depth == depth
                && open.marker != line.marker()
            {
                // A different list type at the top level starts a sibling list
                if stack.len() == 1 {
                    break;
                }
                Self::close_innermost(&mut stack)?;
            }

            if stack.last().is_none_or(|open| open.depth < depth) {
                let base = match (stack.is_empty(), line.numbering) {
                    (true, Numbering::Resume) => context.last_number,
                    _ => 0,
                };
                stack.push(OpenList::open(line.marker(), depth, base));
            }

            if let Some(open) = stack.last_mut() {
                open.add_item(line)?;
            }
            parser.advance();
        }

        while stack.len() > 1 {
            Self::close_innermost(&mut stack)?;
        }
        let Some(root) = stack.pop() else {
            return Ok(None);
        };
        if root_marker == '#' {
            context.last_number = root.last_number;
        }
        Ok(Some(root.element.into()))
    }
}

impl BlockSyntax for ListSyntax {
    fn pattern(&self) -> &Regex {
        &LIST_ITEM
    }

    fn name(&self) -> &'static str {
        "list"
    }

    fn can_end_block(&self) -> bool {
        false
    }

    fn parse(&self, parser: &mut BlockParser<'_>) -> Option<Node> {
        let mut context = parser.list_context();
        let list = Self::build(parser, &mut context);
        parser.set_list_context(context);
        list.unwrap_or_else(|error| {
            log::debug!("list at line {} abandoned: {}", parser.position(), error);
            None
        })
    }
}

/// Fallback: everything up to the next block-ending line becomes a paragraph
pub struct ParagraphSyntax;

impl BlockSyntax for ParagraphSyntax {
    fn pattern(&self) -> &Regex {
        &ANY_LINE
    }

    fn name(&self) -> &'static str {
        "paragraph"
    }

    fn can_parse(&self, _parser: &BlockParser<'_>) -> bool {
        true
    }

    fn can_end_block(&self) -> bool {
        false
    }

    fn is_fallback(&self) -> bool {
        true
    }

    fn parse(&self, parser: &mut BlockParser<'_>) -> Option<Node> {
        let mut style = None;
        let mut lines = Vec::new();

        let first = parser.current();
        match EXPLICIT_PARAGRAPH.captures(first) {
            Some(caps) => {
                style = text_align(caps.get(1).map(|m| m.as_str()));
                lines.push(caps.get(2).map_or("", |m| m.as_str()));
            }
            None => lines.push(first),
        }
        parser.advance();

        while !parser.is_at_block_end() && !parser.matches(&EXPLICIT_PARAGRAPH) {
            lines.push(parser.current());
            parser.advance();
        }

        let mut text_lines = Vec::new();
        for line in lines {
            match LinkReference::parse(line) {
                Some(reference) => {
                    parser.document.add_link_reference(reference);
                }
                None => text_lines.push(line.trim()),
            }
        }
        if text_lines.iter().all(|line| line.is_empty()) {
            return None;
        }

        let mut paragraph = Element::unparsed("p", text_lines.join("\n"));
        if let Some(style) = style {
            paragraph = paragraph.with_attribute("style", style);
        }
        Some(paragraph.into())
    }
}
