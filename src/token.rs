/// Token kinds produced by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Name that is not a keyword (`Run`, `get_Name`, `x`).
    Identifier,
    /// Reserved script keyword (`define`, `if`, `from`, ...).
    Keyword,
    /// Double-quoted string literal; the text is the contents without the
    /// delimiters and with `""` escapes left in place.
    Str,
    /// Punctuation. `==` and `!=` are single two-character tokens, every
    /// other punctuation character stands alone.
    Punct,
    /// End of input.
    Eof,
}

/// A single token with its kind, text, and the line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

impl Token {
    #[must_use]
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
        }
    }

    /// True for a keyword token with the given spelling.
    #[must_use]
    pub fn is_keyword(&self, name: &str) -> bool {
        self.kind == TokenKind::Keyword && self.text == name
    }

    /// True for a punctuation token with the given spelling.
    #[must_use]
    pub fn is_punct(&self, text: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == text
    }

    #[must_use]
    pub const fn is_identifier(&self) -> bool {
        matches!(self.kind, TokenKind::Identifier)
    }

    #[must_use]
    pub const fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }

    /// How the token reads in a diagnostic.
    #[must_use]
    pub fn describe(&self) -> &str {
        match self.kind {
            TokenKind::Eof => "eof",
            _ => &self.text,
        }
    }
}
