//! Parser state and token helpers.
//!
//! The grammar itself lives in the `*_parser` sibling modules, each adding
//! methods to [`Parser`].

use std::sync::Arc;

use oak_core::{Constant, Location, PackageIdentifier, ParseError, ParseErrorKind, SourceFile};

use crate::ast::module::Module;
use crate::lexer::{Lexer, Token, TokenKind};

/// Recursive-descent parser over a pre-lexed token buffer.
///
/// Parsing is fatal on the first error: there is no recovery within a module.
pub struct Parser<'src> {
    pub(crate) file: &'src Arc<SourceFile>,
    tokens: Vec<Token<'src>>,
    position: usize,
}

impl<'src> Parser<'src> {
    /// Lex `file` and create a parser positioned at its first token.
    pub fn new(file: &'src Arc<SourceFile>) -> Result<Self, ParseError> {
        let tokens = Lexer::new(file).tokenize()?;
        Ok(Parser {
            file,
            tokens,
            position: 0,
        })
    }

    /// Parse the whole file as a module belonging to `package`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn parse(mut self, package: PackageIdentifier) -> Result<Module, ParseError> {
        let module = self.parse_module_body(package)?;
        tracing::debug!(
            module = %module.name,
            definitions = module.definitions.len(),
            "parsed module"
        );
        Ok(module)
    }

    // =========================================
    // Token access
    // =========================================

    /// The current token.
    #[inline]
    pub(crate) fn peek(&self) -> &Token<'src> {
        self.peek_nth(0)
    }

    /// The token `n` positions ahead; the trailing EOF repeats forever.
    #[inline]
    pub(crate) fn peek_nth(&self, n: usize) -> &Token<'src> {
        let index = (self.position + n).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    /// Consume and return the current token.
    pub(crate) fn advance(&mut self) -> Token<'src> {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.position += 1;
        }
        token
    }

    /// Check whether the current token has the given kind.
    #[inline]
    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    /// Check whether the current token is the given operator symbol.
    #[inline]
    pub(crate) fn check_operator(&self, symbol: &str) -> bool {
        let token = self.peek();
        token.kind == TokenKind::Operator && token.lexeme == symbol
    }

    /// Check whether the current token is the given contextual word.
    #[inline]
    pub(crate) fn check_word(&self, word: &str) -> bool {
        let token = self.peek();
        token.kind == TokenKind::Identifier && token.lexeme == word
    }

    /// Consume the current token if it has the given kind.
    pub(crate) fn eat(&mut self, kind: TokenKind) -> Option<Token<'src>> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    /// Consume a token of the given kind or fail.
    pub(crate) fn expect(
        &mut self,
        kind: TokenKind,
        context: &str,
    ) -> Result<Token<'src>, ParseError> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(format!("expected {} {}", kind, context)))
        }
    }

    // =========================================
    // Locations and errors
    // =========================================

    /// Location of a single token.
    pub(crate) fn location_of(&self, token: &Token<'_>) -> Location {
        Location::new(self.file.clone(), token.start, token.end)
    }

    /// Location from `start` up to the end of the last consumed token.
    pub(crate) fn location_from(&self, start: u32) -> Location {
        let end = if self.position == 0 {
            start
        } else {
            self.tokens[self.position - 1].end.max(start)
        };
        Location::new(self.file.clone(), start, end)
    }

    /// Start offset of the current token.
    #[inline]
    pub(crate) fn start(&self) -> u32 {
        self.peek().start
    }

    /// An error at the current token.
    pub(crate) fn unexpected(&self, message: impl Into<String>) -> ParseError {
        let token = self.peek();
        let kind = if token.kind == TokenKind::Eof {
            ParseErrorKind::UnexpectedEof
        } else {
            ParseErrorKind::UnexpectedToken
        };
        let message = format!("{}, found {}", message.into(), describe(token));
        ParseError::new(kind, self.location_of(token), message)
    }

    /// Decoded value of a literal token. The magnitude `9223372036854775808`
    /// only fits in 64 bits when `negated`.
    pub(crate) fn literal_value(
        &self,
        token: &Token<'_>,
        negated: bool,
    ) -> Result<Constant, ParseError> {
        match &token.value {
            Some(Constant::Int(i64::MIN)) if !negated => Err(ParseError::new(
                ParseErrorKind::InvalidNumber,
                self.location_of(token),
                "integer literal does not fit in 64 bits",
            )),
            Some(value) => Ok(value.clone()),
            None => Ok(Constant::Unit),
        }
    }

    /// An error of a given kind at the current token.
    pub(crate) fn error_here(&self, kind: ParseErrorKind, message: impl Into<String>) -> ParseError {
        ParseError::new(kind, self.location_of(self.peek()), message)
    }
}

fn describe(token: &Token<'_>) -> String {
    match token.kind {
        TokenKind::Identifier | TokenKind::Operator => format!("'{}'", token.lexeme),
        kind if kind.is_literal() => format!("{} {}", kind, token.lexeme),
        kind => kind.to_string(),
    }
}
