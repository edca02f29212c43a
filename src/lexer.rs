//! Hand-written scanner for Simple source text.
//!
//! The lexer is a byte cursor over an immutable source buffer. It hands out
//! one token per call to [next_token](Lexer::next_token), supports a
//! non-consuming [peek_token](Lexer::peek_token), and can be
//! [reset](Lexer::reset) to an arbitrary byte offset so the interpreter and
//! compiler can re-scan a previously indexed line. All failures are
//! reported as [TokenKind::Error] tokens; the lexer itself never fails.

use crate::token::{Token, TokenKind, MAX_TOKEN_TEXT};

const KEYWORDS: &[(&str, TokenKind)] = &[
    ("rem", TokenKind::Rem),
    ("input", TokenKind::Input),
    ("print", TokenKind::Print),
    ("let", TokenKind::Let),
    ("goto", TokenKind::Goto),
    ("if", TokenKind::If),
    ("for", TokenKind::For),
    ("to", TokenKind::To),
    ("step", TokenKind::Step),
    ("next", TokenKind::Next),
    ("end", TokenKind::End),
];

/// Scanner state over one source buffer.
///
/// `start` marks the first byte of the token being scanned and `current`
/// the scan position; the text of a finished token is
/// `source[start..current]`.
pub struct Lexer<'a> {
    source: &'a str,
    start: usize,
    current: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Lexer<'a> {
        Lexer {
            source,
            start: 0,
            current: 0,
            line: 1,
            column: 1,
        }
    }

    /// Moves the cursor to `offset` and resets the column counter.
    ///
    /// The line counter is left untouched; callers that jump between lines
    /// track line numbers themselves.
    pub fn reset(&mut self, offset: usize) {
        self.start = offset;
        self.current = offset;
        self.column = 1;
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> u8 {
        let byte = self.source.as_bytes()[self.current];
        self.current += 1;
        self.column += 1;
        byte
    }

    fn peek_byte(&self) -> u8 {
        if self.is_at_end() {
            0
        } else {
            self.source.as_bytes()[self.current]
        }
    }

    fn peek_next_byte(&self) -> u8 {
        if self.current + 1 >= self.source.len() {
            0
        } else {
            self.source.as_bytes()[self.current + 1]
        }
    }

    fn matches(&mut self, expected: u8) -> bool {
        if self.is_at_end() || self.peek_byte() != expected {
            return false;
        }
        self.current += 1;
        self.column += 1;
        true
    }

    fn skip_whitespace(&mut self) {
        // Line feeds are not whitespace here; they become NEWLINE tokens.
        while matches!(self.peek_byte(), b' ' | b'\t' | b'\r') {
            self.advance();
        }
    }

    fn make_token(&self, kind: TokenKind) -> Token {
        let length = self.current - self.start;
        let mut end = self.start + length.min(MAX_TOKEN_TEXT);
        while !self.source.is_char_boundary(end) {
            end -= 1;
        }
        Token {
            kind,
            text: self.source[self.start..end].to_string(),
            line: self.line,
            column: self.column - length as u32,
        }
    }

    fn error_token(&self, message: &'static str) -> Token {
        Token {
            kind: TokenKind::Error(message),
            text: message.to_string(),
            line: self.line,
            column: self.column,
        }
    }

    fn scan_number(&mut self) -> Token {
        while self.peek_byte().is_ascii_digit() {
            self.advance();
        }

        let mut float = false;
        // A '.' extends the token only when a digit follows it, so that
        // e.g. `10.` lexes as the integer 10 followed by a stray dot.
        if self.peek_byte() == b'.' && self.peek_next_byte().is_ascii_digit() {
            float = true;
            self.advance();
            while self.peek_byte().is_ascii_digit() {
                self.advance();
            }
        }

        let value = self.source[self.start..self.current]
            .parse::<f64>()
            .unwrap_or(0.0);
        let kind = if float {
            TokenKind::Float(value)
        } else {
            TokenKind::Number(value)
        };
        self.make_token(kind)
    }

    fn scan_string(&mut self) -> Token {
        while self.peek_byte() != b'"' && !self.is_at_end() {
            if self.peek_byte() == b'\n' {
                return self.error_token("Unterminated string");
            }
            self.advance();
        }

        if self.is_at_end() {
            return self.error_token("Unterminated string");
        }

        // Closing quote.
        self.advance();
        self.make_token(TokenKind::Str)
    }

    fn scan_identifier(&mut self) -> Token {
        while self.peek_byte().is_ascii_alphanumeric() || self.peek_byte() == b'_' {
            self.advance();
        }

        let text = &self.source[self.start..self.current];
        for (spelling, kind) in KEYWORDS {
            if text.eq_ignore_ascii_case(spelling) {
                return self.make_token(kind.clone());
            }
        }
        self.make_token(TokenKind::Ident)
    }

    /// Scans and returns the next token, advancing the cursor past it.
    ///
    /// At the end of the buffer this returns an EOF token, and keeps
    /// returning one on every further call.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        self.start = self.current;

        if self.is_at_end() {
            return self.make_token(TokenKind::Eof);
        }

        let byte = self.advance();

        if byte == b'\n' {
            let token = self.make_token(TokenKind::Newline);
            self.line += 1;
            self.column = 1;
            return token;
        }

        if byte.is_ascii_digit() {
            return self.scan_number();
        }

        if byte.is_ascii_alphabetic() || byte == b'_' {
            return self.scan_identifier();
        }

        if byte == b'"' {
            return self.scan_string();
        }

        match byte {
            b'+' => self.make_token(TokenKind::Plus),
            b'-' => self.make_token(TokenKind::Minus),
            b'*' => self.make_token(TokenKind::Star),
            b'/' => self.make_token(TokenKind::Slash),
            b'%' => self.make_token(TokenKind::Percent),
            b'^' => self.make_token(TokenKind::Caret),
            b',' => self.make_token(TokenKind::Comma),
            b'(' => self.make_token(TokenKind::LParen),
            b')' => self.make_token(TokenKind::RParen),
            b'=' => {
                if self.matches(b'=') {
                    self.make_token(TokenKind::Eq)
                } else {
                    self.make_token(TokenKind::Assign)
                }
            }
            b'!' => {
                if self.matches(b'=') {
                    self.make_token(TokenKind::Ne)
                } else {
                    self.error_token("Expected '=' after '!'")
                }
            }
            b'<' => {
                if self.matches(b'=') {
                    self.make_token(TokenKind::Le)
                } else {
                    self.make_token(TokenKind::Lt)
                }
            }
            b'>' => {
                if self.matches(b'=') {
                    self.make_token(TokenKind::Ge)
                } else {
                    self.make_token(TokenKind::Gt)
                }
            }
            _ => self.error_token("Unexpected character"),
        }
    }

    /// Returns the next token without consuming it.
    ///
    /// The whole scanner state is saved around the scan, so observable
    /// state is unchanged afterwards.
    pub fn peek_token(&mut self) -> Token {
        let start = self.start;
        let current = self.current;
        let line = self.line;
        let column = self.column;

        let token = self.next_token();

        self.start = start;
        self.current = current;
        self.line = line;
        self.column = column;

        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(source);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token();
            let eof = token.kind == TokenKind::Eof;
            out.push(token.kind);
            if eof {
                break;
            }
        }
        out
    }

    #[test]
    fn operators_lex_in_order() {
        assert_eq!(
            kinds("<= == != >= < > ="),
            vec![
                TokenKind::Le,
                TokenKind::Eq,
                TokenKind::Ne,
                TokenKind::Ge,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::Assign,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_fold_case() {
        for spelling in &["rem", "REM", "Rem", "rEm"] {
            assert_eq!(kinds(spelling)[0], TokenKind::Rem);
        }
        for spelling in &["print", "PRINT", "Print"] {
            assert_eq!(kinds(spelling)[0], TokenKind::Print);
        }
        assert_eq!(
            kinds("input let goto if for to step next end"),
            vec![
                TokenKind::Input,
                TokenKind::Let,
                TokenKind::Goto,
                TokenKind::If,
                TokenKind::For,
                TokenKind::To,
                TokenKind::Step,
                TokenKind::Next,
                TokenKind::End,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers_and_floats() {
        let mut lexer = Lexer::new("123 3.14 10.");
        assert_eq!(lexer.next_token().kind, TokenKind::Number(123.0));
        assert_eq!(lexer.next_token().kind, TokenKind::Float(3.14));
        // The trailing dot does not extend the number.
        assert_eq!(lexer.next_token().kind, TokenKind::Number(10.0));
        assert_eq!(
            lexer.next_token().kind,
            TokenKind::Error("Unexpected character")
        );
    }

    #[test]
    fn string_includes_quotes() {
        let mut lexer = Lexer::new("\"hello\"");
        let token = lexer.next_token();
        assert_eq!(token.kind, TokenKind::Str);
        assert_eq!(token.text, "\"hello\"");
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let mut lexer = Lexer::new("\"oops\n10 end");
        let token = lexer.next_token();
        assert_eq!(token.kind, TokenKind::Error("Unterminated string"));
        assert_eq!(token.text, "Unterminated string");

        let mut lexer = Lexer::new("\"eof");
        assert_eq!(
            lexer.next_token().kind,
            TokenKind::Error("Unterminated string")
        );
    }

    #[test]
    fn bare_bang_is_an_error() {
        let mut lexer = Lexer::new("!");
        assert_eq!(
            lexer.next_token().kind,
            TokenKind::Error("Expected '=' after '!'")
        );
    }

    #[test]
    fn newline_advances_line_and_resets_column() {
        let mut lexer = Lexer::new("10 let\n20");
        let ten = lexer.next_token();
        assert_eq!((ten.line, ten.column), (1, 1));
        let keyword = lexer.next_token();
        assert_eq!((keyword.line, keyword.column), (1, 4));
        assert_eq!(lexer.next_token().kind, TokenKind::Newline);
        let twenty = lexer.next_token();
        assert_eq!((twenty.line, twenty.column), (2, 1));
    }

    #[test]
    fn peek_equals_next_and_leaves_state_alone() {
        let mut lexer = Lexer::new("10 print x, 3.5");
        loop {
            let peeked = lexer.peek_token();
            let peeked_again = lexer.peek_token();
            assert_eq!(peeked, peeked_again);
            let next = lexer.next_token();
            assert_eq!(peeked, next);
            if next.kind == TokenKind::Eof {
                break;
            }
        }
    }

    #[test]
    fn reset_replays_the_same_tokens() {
        let source = "10 let x = 1 + 2.5 % y";
        let mut lexer = Lexer::new(source);
        let first: Vec<_> = std::iter::from_fn(|| {
            let token = lexer.next_token();
            if token.kind == TokenKind::Eof {
                None
            } else {
                Some((token.kind, token.text))
            }
        })
        .collect();

        lexer.reset(0);
        let second: Vec<_> = std::iter::from_fn(|| {
            let token = lexer.next_token();
            if token.kind == TokenKind::Eof {
                None
            } else {
                Some((token.kind, token.text))
            }
        })
        .collect();

        assert_eq!(first, second);
    }

    #[test]
    fn eof_repeats() {
        let mut lexer = Lexer::new("");
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
        assert_eq!(lexer.next_token().kind, TokenKind::Eof);
    }
}
