use std::fmt;

use crate::token::{Token, TokenKind};

/// Words with dedicated grammar productions.
pub const KEYWORDS: &[&str] = &[
    "and", "define", "do", "elif", "else", "end", "false", "for", "from", "if", "in", "is", "let",
    "not", "null", "or", "property", "return", "select", "self", "then", "true", "when", "where",
];

/// Words set aside for possible future use; scanning one is fatal.
const RESERVED: &[&str] = &[
    "assert",
    "case",
    "class",
    "except",
    "foreach",
    "match",
    "otherwise",
    "while",
];

/// Classifies a scan error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanErrorKind {
    /// A reserved word appeared in the script.
    ReservedWord(String),
    /// A string literal with no closing quote.
    UnterminatedString,
    /// A carriage return; scripts must use Unix line endings.
    WindowsLineEnding,
}

impl fmt::Display for ScanErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReservedWord(word) => {
                write!(f, "{word} is a reserved word")
            }
            Self::UnterminatedString => {
                write!(f, "expected a terminating '\"'")
            }
            Self::WindowsLineEnding => {
                write!(f, "scripts must use Unix line endings")
            }
        }
    }
}

/// Error produced while scanning.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at line {line}")]
pub struct ScanError {
    pub kind: ScanErrorKind,
    pub line: usize,
}

/// Scan a whole script into a token list (without the trailing eof token).
///
/// The parser pulls tokens one at a time instead; this is the convenient
/// form for tools and tests.
///
/// # Errors
///
/// Returns `ScanError` on reserved words, unterminated strings, or
/// carriage returns.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ScanError> {
    let mut scanner = Scanner::new(input)?;
    let mut tokens = Vec::new();
    while !scanner.token().is_eof() {
        tokens.push(scanner.token().clone());
        scanner.advance()?;
    }
    Ok(tokens)
}

/// Pull-based tokenizer over a script source string.
///
/// The scanner always holds one current token; `advance` replaces it and
/// `look_ahead` peeks further without moving the cursor.
pub struct Scanner<'a> {
    src: &'a str,
    input: &'a [u8],
    pos: usize,
    line: usize,
    token: Token,
}

impl<'a> Scanner<'a> {
    /// Create a scanner primed with the first token.
    ///
    /// # Errors
    ///
    /// Fails if the first token is already malformed.
    pub fn new(input: &'a str) -> Result<Self, ScanError> {
        Self::with_line(input, 1)
    }

    /// Like `new` but numbering lines from `line`. Used when re-scanning
    /// an interpolated string that starts mid-script.
    ///
    /// # Errors
    ///
    /// Fails if the first token is already malformed.
    pub fn with_line(input: &'a str, line: usize) -> Result<Self, ScanError> {
        let mut scanner = Self {
            src: input,
            input: input.as_bytes(),
            pos: 0,
            line,
            token: Token::new(TokenKind::Eof, "", line),
        };
        scanner.advance()?;
        Ok(scanner)
    }

    /// The current token.
    #[must_use]
    pub const fn token(&self) -> &Token {
        &self.token
    }

    /// Replace the current token with the next one.
    ///
    /// # Errors
    ///
    /// Returns `ScanError` if the next token is malformed.
    pub fn advance(&mut self) -> Result<(), ScanError> {
        self.token = self.scan()?;
        Ok(())
    }

    /// The token `n` positions past the current one, without advancing.
    /// `look_ahead(0)` is the current token.
    ///
    /// # Errors
    ///
    /// Returns `ScanError` if any token up to `n` is malformed.
    pub fn look_ahead(&self, n: usize) -> Result<Token, ScanError> {
        let mut probe = Self {
            src: self.src,
            input: self.input,
            pos: self.pos,
            line: self.line,
            token: self.token.clone(),
        };
        for _ in 0..n {
            probe.advance()?;
        }
        Ok(probe.token)
    }

    fn scan(&mut self) -> Result<Token, ScanError> {
        self.skip_trivia()?;

        let Some(&byte) = self.input.get(self.pos) else {
            return Ok(Token::new(TokenKind::Eof, "", self.line));
        };

        if byte == b'"' {
            self.scan_string()
        } else if byte.is_ascii_alphabetic() || byte == b'_' {
            self.scan_word()
        } else {
            Ok(self.scan_punct(byte))
        }
    }

    fn skip_trivia(&mut self) -> Result<(), ScanError> {
        while let Some(&byte) = self.input.get(self.pos) {
            match byte {
                b' ' | b'\t' => self.pos += 1,
                b'\n' => {
                    self.pos += 1;
                    self.line += 1;
                }
                b'\r' => {
                    return Err(ScanError {
                        kind: ScanErrorKind::WindowsLineEnding,
                        line: self.line,
                    });
                }
                b'#' => {
                    while self.input.get(self.pos).is_some_and(|&b| b != b'\n') {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn scan_word(&mut self) -> Result<Token, ScanError> {
        let start = self.pos;
        while self
            .input
            .get(self.pos)
            .is_some_and(|&b| b.is_ascii_alphanumeric() || b == b'_')
        {
            self.pos += 1;
        }

        let text = &self.src[start..self.pos];
        if RESERVED.contains(&text) {
            return Err(ScanError {
                kind: ScanErrorKind::ReservedWord(text.to_string()),
                line: self.line,
            });
        }

        let kind = if KEYWORDS.contains(&text) {
            TokenKind::Keyword
        } else {
            TokenKind::Identifier
        };
        Ok(Token::new(kind, text, self.line))
    }

    fn scan_string(&mut self) -> Result<Token, ScanError> {
        let start_line = self.line;
        self.pos += 1;
        let start = self.pos;

        loop {
            let Some(&byte) = self.input.get(self.pos) else {
                return Err(ScanError {
                    kind: ScanErrorKind::UnterminatedString,
                    line: start_line,
                });
            };
            match byte {
                b'"' => {
                    // A doubled quote is an escaped quote, kept as-is in
                    // the token text.
                    if self.input.get(self.pos + 1) == Some(&b'"') {
                        self.pos += 2;
                    } else {
                        break;
                    }
                }
                b'\r' => {
                    return Err(ScanError {
                        kind: ScanErrorKind::WindowsLineEnding,
                        line: self.line,
                    });
                }
                b'\n' => {
                    self.pos += 1;
                    self.line += 1;
                }
                _ => self.pos += 1,
            }
        }

        let text = &self.src[start..self.pos];
        self.pos += 1;
        Ok(Token::new(TokenKind::Str, text, start_line))
    }

    fn scan_punct(&mut self, byte: u8) -> Token {
        if (byte == b'=' || byte == b'!') && self.input.get(self.pos + 1) == Some(&b'=') {
            let text = &self.src[self.pos..self.pos + 2];
            self.pos += 2;
            return Token::new(TokenKind::Punct, text, self.line);
        }

        // Char-aware so a stray multi-byte character cannot split.
        let len = self.src[self.pos..]
            .chars()
            .next()
            .map_or(1, char::len_utf8);
        let text = &self.src[self.pos..self.pos + len];
        self.pos += len;
        Token::new(TokenKind::Punct, text, self.line)
    }
}
