/// Inline syntaxes: substitutions and paired tags recognised inside blocks
use crate::ast::{Element, Node, alignment};
use crate::block_syntax::block_attributes;
use crate::inline_parser::{InlineParser, TagState};
use crate::renderer::escape_html;
use regex::Regex;
use std::rc::Rc;
use std::sync::LazyLock;

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^&(?:#[0-9]{1,7}|#[xX][0-9A-Fa-f]{1,6}|[A-Za-z][A-Za-z0-9]{1,31});").unwrap()
});

static INLINE_HTML: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^(?:<[A-Za-z][A-Za-z0-9-]*(?:\s+[A-Za-z_:][A-Za-z0-9_.:-]*(?:\s*=\s*(?:[^\s"'=<>`]+|'[^']*'|"[^"]*"))?)*\s*/?>|</[A-Za-z][A-Za-z0-9-]*\s*>|<!--(?:[^-]|-[^-])*-->)"#,
    )
    .unwrap()
});

static NO_TEXTILE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^==(.+?)==").unwrap());

static CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^@([^@\n]+)@").unwrap());

static IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^!(<|>|=)?([^\s()!]+)(?:\(([^()]*)\))?!(?::([^\s<>"]+))?"#).unwrap()
});

static GLYPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\.\.\.|--|\([cC]\)|\([rR]\)|\((?:tm|TM)\))").unwrap());

static LINK_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"^[^\s<>"]+"#).unwrap());

static LINK_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(([^()]+)\)$").unwrap());

static TAG_MODIFIERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\(([^()\s]+)\))?(?:\{([^{}]+)\})?(?:\[([A-Za-z]{2}(?:-[A-Za-z]{2})?)\])?")
        .unwrap()
});

/// What a syntax wants done at the parser's position
#[derive(Debug, Clone, PartialEq)]
pub enum InlineMatch {
    /// Append `nodes` and skip `len` bytes
    Emit { nodes: Vec<Node>, len: usize },
    /// Open a tag frame whose opening delimiter is `len` bytes long
    Open { len: usize },
}

impl InlineMatch {
    fn node(node: impl Into<Node>, len: usize) -> Self {
        InlineMatch::Emit {
            nodes: vec![node.into()],
            len,
        }
    }
}

pub trait InlineSyntax {
    fn name(&self) -> &'static str;

    /// Test the opening pattern at the cursor
    fn try_match(&self, parser: &InlineParser<'_>) -> Option<InlineMatch>;

    /// Whether a frame this syntax opened is closed at the cursor
    fn matches_end(&self, _parser: &InlineParser<'_>, _state: &TagState) -> bool {
        false
    }

    /// Build the finished node and the closer's length, or return the frame
    /// unchanged when the closer does not validate
    fn close(&self, _parser: &InlineParser<'_>, state: TagState) -> Result<(Node, usize), TagState> {
        Err(state)
    }
}

/// Standard syntaxes in priority order
pub fn standard_syntaxes() -> Vec<Rc<dyn InlineSyntax>> {
    vec![
        Rc::new(LineBreakSyntax),
        Rc::new(EntitySyntax),
        Rc::new(InlineHtmlSyntax),
        Rc::new(NoTextileSyntax),
        Rc::new(CodeSyntax),
        Rc::new(ImageSyntax),
        Rc::new(GlyphSyntax),
        Rc::new(LinkSyntax),
        Rc::new(TagSyntax::new("**", "b")),
        Rc::new(TagSyntax::new("__", "i")),
        Rc::new(TagSyntax::new("??", "cite")),
        Rc::new(TagSyntax::new("*", "strong")),
        Rc::new(TagSyntax::new("_", "em")),
        Rc::new(TagSyntax::new("-", "del")),
        Rc::new(TagSyntax::new("+", "ins")),
        Rc::new(TagSyntax::new("^", "sup")),
        Rc::new(TagSyntax::new("~", "sub")),
        Rc::new(TagSyntax::new("%", "span")),
    ]
}

fn at_word_start(parser: &InlineParser<'_>) -> bool {
    parser.char_before().is_none_or(|c| !c.is_alphanumeric())
}

/// Strip trailing sentence punctuation that is almost never part of a URL
fn trim_url(url: &str) -> &str {
    let mut url = url.trim_end_matches(['.', ',', ';', ':', '!', '?']);
    while url.ends_with(')') && url.matches(')').count() > url.matches('(').count() {
        url = &url[..url.len() - 1];
    }
    url
}

/// Whether a link target is a bare label rather than a URL or path
fn is_label(target: &str) -> bool {
    !target.contains([':', '/', '.', '#', '?', '&'])
}

/// A newline inside a block becomes `<br />`
pub struct LineBreakSyntax;

impl InlineSyntax for LineBreakSyntax {
    fn name(&self) -> &'static str {
        "line break"
    }

    fn try_match(&self, parser: &InlineParser<'_>) -> Option<InlineMatch> {
        if !parser.rest().starts_with('\n') {
            return None;
        }
        Some(InlineMatch::Emit {
            nodes: vec![Element::empty("br").into(), Node::text("\n")],
            len: 1,
        })
    }
}

/// Character references pass through without double escaping
pub struct EntitySyntax;

impl InlineSyntax for EntitySyntax {
    fn name(&self) -> &'static str {
        "entity"
    }

    fn try_match(&self, parser: &InlineParser<'_>) -> Option<InlineMatch> {
        let found = ENTITY.find(parser.rest())?;
        Some(InlineMatch::node(Node::text(found.as_str()), found.len()))
    }
}

pub struct InlineHtmlSyntax;

impl InlineSyntax for InlineHtmlSyntax {
    fn name(&self) -> &'static str {
        "inline html"
    }

    fn try_match(&self, parser: &InlineParser<'_>) -> Option<InlineMatch> {
        let found = INLINE_HTML.find(parser.rest())?;
        Some(InlineMatch::node(Node::text(found.as_str()), found.len()))
    }
}

/// `==text==` is emitted exactly as written
pub struct NoTextileSyntax;

impl InlineSyntax for NoTextileSyntax {
    fn name(&self) -> &'static str {
        "notextile"
    }

    fn try_match(&self, parser: &InlineParser<'_>) -> Option<InlineMatch> {
        let caps = NO_TEXTILE.captures(parser.rest())?;
        let len = caps.get(0)?.len();
        Some(InlineMatch::node(Node::text(&caps[1]), len))
    }
}

/// `@code@`, escaped and never parsed further
pub struct CodeSyntax;

impl InlineSyntax for CodeSyntax {
    fn name(&self) -> &'static str {
        "code"
    }

    fn try_match(&self, parser: &InlineParser<'_>) -> Option<InlineMatch> {
        if !at_word_start(parser) {
            return None;
        }
        let caps = CODE.captures(parser.rest())?;
        let len = caps.get(0)?.len();
        let code = Element::text("code", escape_html(&caps[1]));
        Some(InlineMatch::node(code, len))
    }
}

/// `!src(alt)!` with optional alignment and a trailing `:url` link
pub struct ImageSyntax;

impl InlineSyntax for ImageSyntax {
    fn name(&self) -> &'static str {
        "image"
    }

    fn try_match(&self, parser: &InlineParser<'_>) -> Option<InlineMatch> {
        let caps = IMAGE.captures(parser.rest())?;
        let mut len = caps.get(0)?.len();
        let source = &caps[2];
        let alt = caps.get(3).map(|m| m.as_str());

        let document = parser.document();
        let image = match document.link_reference(source) {
            Some(reference) => {
                let title = alt.map(str::to_string).or(reference.title.clone());
                image_element(&reference.destination, alt, title.as_deref())
            }
            None => {
                let resolved = document
                    .image_link_resolver()
                    .filter(|_| is_label(source))
                    .and_then(|resolver| resolver(source, alt));
                match resolved {
                    Some(node) => node,
                    None => image_element(source, alt, alt),
                }
            }
        };

        let image = match (image, caps.get(1).and_then(|m| alignment(m.as_str()))) {
            (Node::Element(element), Some(align)) => element.with_attribute("align", align).into(),
            (image, _) => image,
        };

        let node = match caps.get(4) {
            Some(url) => {
                let href = trim_url(url.as_str());
                // Punctuation trimmed off the URL goes back to the text stream
                len -= url.len() - href.len();
                Element::new("a", vec![image])
                    .with_attribute("href", href)
                    .into()
            }
            None => image,
        };
        Some(InlineMatch::node(node, len))
    }
}

fn image_element(source: &str, alt: Option<&str>, title: Option<&str>) -> Node {
    let mut image = Element::empty("img")
        .with_attribute("src", source)
        .with_attribute("alt", alt.unwrap_or(""));
    if let Some(title) = title {
        image = image.with_attribute("title", title);
    }
    image.into()
}

/// Typographic replacements
pub struct GlyphSyntax;

impl InlineSyntax for GlyphSyntax {
    fn name(&self) -> &'static str {
        "glyph"
    }

    fn try_match(&self, parser: &InlineParser<'_>) -> Option<InlineMatch> {
        let found = GLYPH.find(parser.rest())?;
        let entity = match found.as_str().to_ascii_lowercase().as_str() {
            "..." => "&#8230;",
            "--" => "&#8212;",
            "(c)" => "&#169;",
            "(r)" => "&#174;",
            _ => "&#8482;",
        };
        Some(InlineMatch::node(Node::text(entity), found.len()))
    }
}

/// `"text(title)":url`, where `url` may also name a link reference
pub struct LinkSyntax;

impl LinkSyntax {
    /// Pull a trailing `(title)` off the link text
    fn take_title(parser: &InlineParser<'_>, state: &mut TagState) -> Option<String> {
        let inner = &parser.source()[state.end_pos..parser.pos()];
        let caps = LINK_TITLE.captures(inner)?;
        let suffix = escape_html(caps.get(0)?.as_str());

        let Some(Node::Text(last)) = state.children.last_mut() else {
            return None;
        };
        let kept = last.strip_suffix(suffix.as_str())?.len();
        last.truncate(kept);
        if last.is_empty() {
            state.children.pop();
        }
        Some(caps[1].to_string())
    }
}

impl InlineSyntax for LinkSyntax {
    fn name(&self) -> &'static str {
        "link"
    }

    fn try_match(&self, parser: &InlineParser<'_>) -> Option<InlineMatch> {
        let rest = parser.rest();
        let after = rest.strip_prefix('"')?;
        // Only worth opening when a closer can appear later on
        if after.starts_with(char::is_whitespace) || !after.contains("\":") {
            return None;
        }
        Some(InlineMatch::Open { len: 1 })
    }

    fn matches_end(&self, parser: &InlineParser<'_>, state: &TagState) -> bool {
        parser.pos() > state.end_pos && parser.rest().starts_with("\":")
    }

    fn close(&self, parser: &InlineParser<'_>, mut state: TagState) -> Result<(Node, usize), TagState> {
        let Some(found) = LINK_URL.find(&parser.rest()[2..]) else {
            return Err(state);
        };
        let target = trim_url(found.as_str());
        if target.is_empty() || state.children.is_empty() {
            return Err(state);
        }
        let len = 2 + target.len();

        let title = Self::take_title(parser, &mut state);
        let document = parser.document();
        let (href, title) = match document.link_reference(target) {
            Some(reference) => (
                reference.destination.clone(),
                title.or(reference.title.clone()),
            ),
            None => {
                if is_label(target)
                    && let Some(resolver) = document.link_resolver()
                    && let Some(node) = resolver(target, title.as_deref())
                {
                    return Ok((node, len));
                }
                (target.to_string(), title)
            }
        };

        let mut link = Element::new("a", state.children).with_attribute("href", href);
        if let Some(title) = title {
            link = link.with_attribute("title", title);
        }
        Ok((link.into(), len))
    }
}

/// A phrase modifier such as `*strong*` or `-deleted-`
pub struct TagSyntax {
    delimiter: &'static str,
    tag: &'static str,
}

impl TagSyntax {
    pub fn new(delimiter: &'static str, tag: &'static str) -> Self {
        TagSyntax { delimiter, tag }
    }
}

impl InlineSyntax for TagSyntax {
    fn name(&self) -> &'static str {
        self.tag
    }

    fn try_match(&self, parser: &InlineParser<'_>) -> Option<InlineMatch> {
        if !at_word_start(parser) {
            return None;
        }
        let after = parser.rest().strip_prefix(self.delimiter)?;
        let modifiers = TAG_MODIFIERS.find(after).map_or(0, |m| m.len());
        let content = &after[modifiers..];

        let next = content.chars().next()?;
        // `**` is never a pair of single `*` openers
        if next.is_whitespace() || self.delimiter.starts_with(next) {
            return None;
        }
        Some(InlineMatch::Open {
            len: self.delimiter.len() + modifiers,
        })
    }

    fn matches_end(&self, parser: &InlineParser<'_>, state: &TagState) -> bool {
        let Some(after) = parser.rest().strip_prefix(self.delimiter) else {
            return false;
        };
        parser.pos() > state.end_pos
            && parser.char_before().is_some_and(|c| !c.is_whitespace())
            && after.chars().next().is_none_or(|c| !c.is_alphanumeric())
    }

    fn close(&self, parser: &InlineParser<'_>, state: TagState) -> Result<(Node, usize), TagState> {
        if state.children.is_empty() {
            return Err(state);
        }
        let modifiers = &parser.source()[state.start_pos + self.delimiter.len()..state.end_pos];
        let mut element = Element::new(self.tag, state.children);
        if let Some(caps) = TAG_MODIFIERS.captures(modifiers) {
            element.attributes = block_attributes(
                caps.get(1).map(|m| m.as_str()),
                caps.get(3).map(|m| m.as_str()),
                caps.get(2).map(|m| m.as_str()),
            );
        }
        Ok((element.into(), self.delimiter.len()))
    }
}
