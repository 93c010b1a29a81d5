//! Main lexer implementation for Oak.
//!
//! The [`Lexer`] converts module source text into [`Token`]s. Dispatch is on
//! the first character of each token. Whitespace and comments (`//` to end of
//! line, nesting `/* ... */`) are skipped before every token.

use std::sync::Arc;

use oak_core::{Constant, InfixIdentifier, Location, ParseError, ParseErrorKind, SourceFile};

use super::cursor::{Cursor, is_ident_continue, is_ident_start};
use super::token::{Token, TokenKind, lookup_keyword, lookup_symbol};

/// Lexer for Oak source code.
///
/// Lexing is fatal on the first error, like parsing: a module either tokenizes
/// completely or reports one located [`ParseError`].
pub struct Lexer<'src> {
    /// Low-level character cursor.
    cursor: Cursor<'src>,
    /// File used to build error locations.
    file: &'src Arc<SourceFile>,
}

impl<'src> Lexer<'src> {
    /// Create a new lexer for the given source file.
    pub fn new(file: &'src Arc<SourceFile>) -> Self {
        Self {
            cursor: Cursor::new(file.content()),
            file,
        }
    }

    /// Tokenize the whole file. The last token is always [`TokenKind::Eof`].
    pub fn tokenize(mut self) -> Result<Vec<Token<'src>>, ParseError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    /// Consume and return the next token.
    pub fn next_token(&mut self) -> Result<Token<'src>, ParseError> {
        self.skip_trivia()?;

        let start = self.cursor.offset();
        let Some(c) = self.cursor.peek() else {
            return Ok(Token::new(TokenKind::Eof, "", start, start));
        };

        match c {
            '"' => self.scan_string(start),
            '\'' => self.scan_char(start),
            c if c.is_ascii_digit() => self.scan_number(start),
            '_' if !self.cursor.peek_nth(1).is_some_and(is_ident_continue) => {
                self.cursor.advance();
                Ok(self.make_token(TokenKind::Underscore, start))
            }
            c if is_ident_start(c) || c == '_' => Ok(self.scan_identifier(start)),
            c if InfixIdentifier::is_infix_char(c) => Ok(self.scan_symbol(start)),
            _ => self.scan_punctuation(start),
        }
    }

    // =========================================
    // Internal helpers
    // =========================================

    fn make_token(&self, kind: TokenKind, start: u32) -> Token<'src> {
        Token::new(
            kind,
            self.cursor.slice_from(start),
            start,
            self.cursor.offset(),
        )
    }

    fn error(&self, kind: ParseErrorKind, start: u32, message: impl Into<String>) -> ParseError {
        let location = Location::new(self.file.clone(), start, self.cursor.offset().max(start));
        ParseError::new(kind, location, message)
    }

    // =========================================
    // Scanning: whitespace and comments
    // =========================================

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        if self.cursor.check_str("\u{FEFF}") {
            self.cursor.advance();
        }

        loop {
            self.cursor.eat_while(char::is_whitespace);
            if self.cursor.check_str("//") {
                self.cursor.eat_while(|c| c != '\n');
            } else if self.cursor.check_str("/*") {
                self.skip_block_comment()?;
            } else {
                return Ok(());
            }
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), ParseError> {
        let start = self.cursor.offset();
        let mut depth = 0u32;
        loop {
            if self.cursor.check_str("/*") {
                self.cursor.advance();
                self.cursor.advance();
                depth += 1;
            } else if self.cursor.check_str("*/") {
                self.cursor.advance();
                self.cursor.advance();
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            } else if self.cursor.advance().is_none() {
                return Err(self.error(
                    ParseErrorKind::UnterminatedComment,
                    start,
                    "block comment is never closed",
                ));
            }
        }
    }

    // =========================================
    // Scanning: names and symbols
    // =========================================

    /// Scan an identifier, keyword, or dotted qualified identifier.
    fn scan_identifier(&mut self, start: u32) -> Token<'src> {
        self.cursor.advance();
        self.cursor.eat_while(is_ident_continue);

        let mut qualified = false;
        while self.cursor.peek() == Some('.') && self.cursor.peek_nth(1).is_some_and(is_ident_start)
        {
            self.cursor.advance();
            self.cursor.eat_while(is_ident_continue);
            qualified = true;
        }

        let lexeme = self.cursor.slice_from(start);
        let kind = if qualified {
            TokenKind::Identifier
        } else {
            lookup_keyword(lexeme).unwrap_or(TokenKind::Identifier)
        };
        self.make_token(kind, start)
    }

    /// Scan a run of operator characters, stopping before a comment opener.
    fn scan_symbol(&mut self, start: u32) -> Token<'src> {
        self.cursor.advance();
        while self.cursor.check(InfixIdentifier::is_infix_char)
            && !self.cursor.check_str("//")
            && !self.cursor.check_str("/*")
        {
            self.cursor.advance();
        }
        let kind = lookup_symbol(self.cursor.slice_from(start));
        self.make_token(kind, start)
    }

    fn scan_punctuation(&mut self, start: u32) -> Result<Token<'src>, ParseError> {
        let c = self.cursor.advance().unwrap_or_default();
        let kind = match c {
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '\\' => TokenKind::Backslash,
            other => {
                return Err(self.error(
                    ParseErrorKind::UnexpectedCharacter,
                    start,
                    format!("'{}'", other.escape_default()),
                ));
            }
        };
        Ok(self.make_token(kind, start))
    }

    // =========================================
    // Scanning: numbers
    // =========================================

    fn scan_number(&mut self, start: u32) -> Result<Token<'src>, ParseError> {
        if self.cursor.peek() == Some('0') {
            let radix = match self.cursor.peek_nth(1) {
                Some('x' | 'X') => Some(16),
                Some('b' | 'B') => Some(2),
                Some('o' | 'O') => Some(8),
                _ => None,
            };
            if let Some(radix) = radix {
                return self.scan_radix_number(start, radix);
            }
        }
        self.scan_decimal_number(start)
    }

    fn scan_radix_number(&mut self, start: u32, radix: u32) -> Result<Token<'src>, ParseError> {
        self.cursor.advance();
        self.cursor.advance();
        let digits_start = self.cursor.offset();
        self.cursor.eat_while(|c| c.is_digit(radix) || c == '_');

        let digits: String = self
            .cursor
            .slice_from(digits_start)
            .chars()
            .filter(|c| *c != '_')
            .collect();
        if digits.is_empty() {
            return Err(self.error(
                ParseErrorKind::InvalidNumber,
                start,
                "expected digits after radix prefix",
            ));
        }
        let value = i64::from_str_radix(&digits, radix).map_err(|e| {
            self.error(ParseErrorKind::InvalidNumber, start, e.to_string())
        })?;
        Ok(self
            .make_token(TokenKind::IntLiteral, start)
            .with_value(Constant::Int(value)))
    }

    fn scan_decimal_number(&mut self, start: u32) -> Result<Token<'src>, ParseError> {
        self.eat_decimal_digits();

        let mut is_float = false;
        if self.cursor.peek() == Some('.') && self.cursor.peek_nth(1).is_some_and(|c| c.is_ascii_digit())
        {
            self.cursor.advance();
            self.eat_decimal_digits();
            is_float = true;
        }

        if matches!(self.cursor.peek(), Some('e' | 'E')) {
            let has_exponent = match self.cursor.peek_nth(1) {
                Some(c) if c.is_ascii_digit() => true,
                Some('+' | '-') => self.cursor.peek_nth(2).is_some_and(|c| c.is_ascii_digit()),
                _ => false,
            };
            if has_exponent {
                self.cursor.advance();
                if matches!(self.cursor.peek(), Some('+' | '-')) {
                    self.cursor.advance();
                }
                self.eat_decimal_digits();
                is_float = true;
            }
        }

        let text: String = self
            .cursor
            .slice_from(start)
            .chars()
            .filter(|c| *c != '_')
            .collect();
        if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| self.error(ParseErrorKind::InvalidNumber, start, "malformed float"))?;
            Ok(self
                .make_token(TokenKind::FloatLiteral, start)
                .with_value(Constant::Float(value)))
        } else {
            // 2^63 wraps to i64::MIN; the parser only accepts it after a unary minus.
            let magnitude = text
                .parse::<u64>()
                .ok()
                .filter(|v| *v <= i64::MIN.unsigned_abs())
                .ok_or_else(|| {
                    self.error(
                        ParseErrorKind::InvalidNumber,
                        start,
                        "integer literal does not fit in 64 bits",
                    )
                })?;
            Ok(self
                .make_token(TokenKind::IntLiteral, start)
                .with_value(Constant::Int(magnitude as i64)))
        }
    }

    fn eat_decimal_digits(&mut self) {
        self.cursor.eat_while(|c| c.is_ascii_digit() || c == '_');
    }

    // =========================================
    // Scanning: characters and strings
    // =========================================

    fn scan_char(&mut self, start: u32) -> Result<Token<'src>, ParseError> {
        self.cursor.advance();
        let value = match self.cursor.peek() {
            Some('\\') => self.scan_escape()?,
            Some('\'') | Some('\n') | None => {
                return Err(self.error(
                    ParseErrorKind::InvalidCharLiteral,
                    start,
                    "empty character literal",
                ));
            }
            Some(c) => {
                self.cursor.advance();
                c
            }
        };
        if !self.cursor.eat('\'') {
            return Err(self.error(
                ParseErrorKind::InvalidCharLiteral,
                start,
                "character literal must hold exactly one character",
            ));
        }
        Ok(self
            .make_token(TokenKind::CharLiteral, start)
            .with_value(Constant::Char(value)))
    }

    fn scan_string(&mut self, start: u32) -> Result<Token<'src>, ParseError> {
        self.cursor.advance();
        let mut value = String::new();
        loop {
            match self.cursor.peek() {
                None => {
                    return Err(self.error(
                        ParseErrorKind::UnterminatedString,
                        start,
                        "string is never closed",
                    ));
                }
                Some('"') => {
                    self.cursor.advance();
                    break;
                }
                Some('\\') => value.push(self.scan_escape()?),
                Some(c) => {
                    self.cursor.advance();
                    value.push(c);
                }
            }
        }
        Ok(self
            .make_token(TokenKind::StringLiteral, start)
            .with_value(Constant::String(value)))
    }

    /// Decode one escape sequence starting at the backslash.
    fn scan_escape(&mut self) -> Result<char, ParseError> {
        let start = self.cursor.offset();
        self.cursor.advance();
        let c = self.cursor.advance();
        let decoded = match c {
            Some('n') => '\n',
            Some('t') => '\t',
            Some('r') => '\r',
            Some('0') => '\0',
            Some('\\') => '\\',
            Some('"') => '"',
            Some('\'') => '\'',
            Some('u') => return self.scan_unicode_escape(start),
            _ => {
                return Err(self.error(
                    ParseErrorKind::InvalidEscape,
                    start,
                    format!("unknown escape '{}'", self.cursor.slice_from(start)),
                ));
            }
        };
        Ok(decoded)
    }

    /// `\u{1F600}`
    fn scan_unicode_escape(&mut self, start: u32) -> Result<char, ParseError> {
        if !self.cursor.eat('{') {
            return Err(self.error(ParseErrorKind::InvalidEscape, start, "expected '{' after \\u"));
        }
        let digits = self.cursor.eat_while(|c| c.is_ascii_hexdigit());
        if !self.cursor.eat('}') {
            return Err(self.error(ParseErrorKind::InvalidEscape, start, "expected '}'"));
        }
        u32::from_str_radix(digits, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| {
                self.error(
                    ParseErrorKind::InvalidEscape,
                    start,
                    "not a unicode scalar value",
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let file = SourceFile::new("t.oak", source);
        Lexer::new(&file)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn values(source: &str) -> Vec<Constant> {
        let file = SourceFile::new("t.oak", source);
        Lexer::new(&file)
            .tokenize()
            .unwrap()
            .into_iter()
            .filter_map(|t| t.value)
            .collect()
    }

    fn lex_error(source: &str) -> ParseError {
        let file = SourceFile::new("t.oak", source);
        Lexer::new(&file).tokenize().unwrap_err()
    }

    #[test]
    fn keywords_and_identifiers() {
        use TokenKind::*;
        assert_eq!(
            kinds("module Main def left"),
            vec![Module, Identifier, Def, Identifier, Eof]
        );
    }

    #[test]
    fn qualified_identifier_is_one_token() {
        let file = SourceFile::new("t.oak", "Oak.Base.add r.x");
        let tokens = Lexer::new(&file).tokenize().unwrap();
        assert_eq!(tokens[0].lexeme, "Oak.Base.add");
        assert_eq!(tokens[1].lexeme, "r.x");
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
    }

    #[test]
    fn dot_after_paren_is_separate() {
        use TokenKind::*;
        assert_eq!(
            kinds("f(x).y .z"),
            vec![
                Identifier, LeftParen, Identifier, RightParen, Dot, Identifier, Dot, Identifier,
                Eof
            ]
        );
    }

    #[test]
    fn symbols() {
        use TokenKind::*;
        assert_eq!(
            kinds("= == : :: | || -> \\ _ _x +"),
            vec![
                Equal, Operator, Colon, Operator, Bar, Operator, Arrow, Backslash, Underscore,
                Identifier, Operator, Eof
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        use TokenKind::*;
        assert_eq!(
            kinds("a // line\n/* outer /* inner */ still */ b +/* c */d"),
            vec![Identifier, Identifier, Operator, Identifier, Eof]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            values("42 1_000 0xff 0b101 0o17 1.5 2e3 1.5e-1"),
            vec![
                Constant::Int(42),
                Constant::Int(1000),
                Constant::Int(255),
                Constant::Int(5),
                Constant::Int(15),
                Constant::Float(1.5),
                Constant::Float(2000.0),
                Constant::Float(0.15),
            ]
        );
    }

    #[test]
    fn integer_followed_by_dot_is_not_float() {
        use TokenKind::*;
        assert_eq!(kinds("1.x"), vec![IntLiteral, Dot, Identifier, Eof]);
    }

    #[test]
    fn strings_and_chars_decode_escapes() {
        assert_eq!(
            values(r#"'a' '\n' "x\ty\"" '\u{41}'"#),
            vec![
                Constant::Char('a'),
                Constant::Char('\n'),
                Constant::String("x\ty\"".into()),
                Constant::Char('A'),
            ]
        );
    }

    #[test]
    fn lexical_errors_are_located() {
        let err = lex_error("def x = \"abc");
        assert_eq!(err.kind, ParseErrorKind::UnterminatedString);
        assert_eq!(err.location.start(), 8);

        let err = lex_error("/* never closed");
        assert_eq!(err.kind, ParseErrorKind::UnterminatedComment);

        let err = lex_error("'ab'");
        assert_eq!(err.kind, ParseErrorKind::InvalidCharLiteral);

        let err = lex_error("\"\\q\"");
        assert_eq!(err.kind, ParseErrorKind::InvalidEscape);

        let err = lex_error("x @");
        assert_eq!(err.kind, ParseErrorKind::UnexpectedCharacter);
        assert_eq!(err.location.start(), 2);

        let err = lex_error("99999999999999999999");
        assert_eq!(err.kind, ParseErrorKind::InvalidNumber);

        let err = lex_error("9223372036854775809");
        assert_eq!(err.kind, ParseErrorKind::InvalidNumber);
    }

    #[test]
    fn largest_magnitude_wraps_to_min() {
        assert_eq!(
            values("9223372036854775807 9223372036854775808"),
            vec![Constant::Int(i64::MAX), Constant::Int(i64::MIN)]
        );
    }
}
