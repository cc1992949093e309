/// Errors raised by the parser's public contracts
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("cannot look ahead a negative number of lines: {0}")]
    NegativeLookahead(isize),
    #[error("<{0}> is self-closing and cannot take children")]
    SelfClosing(String),
}
