//! Pattern parsing.

use oak_core::{Constant, Identifier, ParseError, ParseErrorKind, QualifiedIdentifier};

use super::parser::Parser;
use crate::ast::pattern::{Pattern, PatternKind};
use crate::lexer::TokenKind;

impl<'src> Parser<'src> {
    /// Parse a full pattern: `p as name: Type`.
    pub(crate) fn parse_pattern(&mut self) -> Result<Pattern, ParseError> {
        let start = self.start();
        let mut pattern = self.parse_cons_pattern()?;

        while self.eat(TokenKind::As).is_some() {
            let name = self.parse_identifier("after 'as'")?;
            pattern = Pattern::new(
                PatternKind::Alias {
                    name,
                    nested: Box::new(pattern),
                },
                self.location_from(start),
            );
        }

        if self.eat(TokenKind::Colon).is_some() {
            let ty = self.parse_type()?;
            pattern.declared_type = Some(ty);
            pattern.location = self.location_from(start);
        }
        Ok(pattern)
    }

    /// Parse a comma-separated pattern list up to `close`.
    pub(crate) fn parse_pattern_list(
        &mut self,
        close: TokenKind,
    ) -> Result<Vec<Pattern>, ParseError> {
        let mut patterns = Vec::new();
        if self.check(close) {
            return Ok(patterns);
        }
        loop {
            patterns.push(self.parse_pattern()?);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        Ok(patterns)
    }

    /// `head | tail`, right associative.
    fn parse_cons_pattern(&mut self) -> Result<Pattern, ParseError> {
        let start = self.start();
        let head = self.parse_primary_pattern()?;
        if self.eat(TokenKind::Bar).is_some() {
            let tail = self.parse_cons_pattern()?;
            return Ok(Pattern::new(
                PatternKind::Cons {
                    head: Box::new(head),
                    tail: Box::new(tail),
                },
                self.location_from(start),
            ));
        }
        Ok(head)
    }

    fn parse_primary_pattern(&mut self) -> Result<Pattern, ParseError> {
        let start = self.start();
        match self.peek().kind {
            TokenKind::Underscore => {
                self.advance();
                Ok(Pattern::new(PatternKind::Any, self.location_from(start)))
            }
            TokenKind::Identifier => {
                let token = self.advance();
                let name = QualifiedIdentifier::new(token.lexeme);
                if name.is_uppercase() {
                    let values = if self.eat(TokenKind::LeftParen).is_some() {
                        let values = self.parse_pattern_list(TokenKind::RightParen)?;
                        self.expect(TokenKind::RightParen, "to close option pattern")?;
                        values
                    } else {
                        Vec::new()
                    };
                    Ok(Pattern::new(
                        PatternKind::Option { name, values },
                        self.location_from(start),
                    ))
                } else if name.is_qualified() {
                    Err(ParseError::new(
                        ParseErrorKind::ExpectedPattern,
                        self.location_of(&token),
                        "a pattern variable cannot be qualified",
                    ))
                } else {
                    Ok(Pattern::new(
                        PatternKind::Named(Identifier::new(token.lexeme)),
                        self.location_of(&token),
                    ))
                }
            }
            kind if kind.is_literal() => {
                let token = self.advance();
                let value = self.literal_value(&token, false)?;
                Ok(Pattern::new(
                    PatternKind::Const(value),
                    self.location_of(&token),
                ))
            }
            TokenKind::Operator if self.check_operator("-") => {
                self.advance();
                let token = self.advance();
                let value = match (token.kind, self.literal_value(&token, true)?) {
                    (TokenKind::IntLiteral, Constant::Int(v)) => Constant::Int(v.wrapping_neg()),
                    (TokenKind::FloatLiteral, Constant::Float(v)) => Constant::Float(-v),
                    _ => {
                        return Err(ParseError::new(
                            ParseErrorKind::ExpectedPattern,
                            self.location_from(start),
                            "expected number after '-' in pattern",
                        ));
                    }
                };
                Ok(Pattern::new(
                    PatternKind::Const(value),
                    self.location_from(start),
                ))
            }
            TokenKind::LeftParen => {
                self.advance();
                if self.eat(TokenKind::RightParen).is_some() {
                    return Ok(Pattern::new(
                        PatternKind::Const(Constant::Unit),
                        self.location_from(start),
                    ));
                }
                let mut items = self.parse_pattern_list(TokenKind::RightParen)?;
                self.expect(TokenKind::RightParen, "to close pattern")?;
                if items.len() == 1 {
                    Ok(items.remove(0))
                } else {
                    Ok(Pattern::new(
                        PatternKind::Tuple(items),
                        self.location_from(start),
                    ))
                }
            }
            TokenKind::LeftBracket => {
                self.advance();
                let items = self.parse_pattern_list(TokenKind::RightBracket)?;
                self.expect(TokenKind::RightBracket, "to close list pattern")?;
                Ok(Pattern::new(
                    PatternKind::List(items),
                    self.location_from(start),
                ))
            }
            TokenKind::LeftBrace => {
                self.advance();
                let mut fields = Vec::new();
                loop {
                    let token = self.peek().clone();
                    let name = self.parse_identifier("for record pattern field")?;
                    fields.push((name, self.location_of(&token)));
                    if self.eat(TokenKind::Comma).is_none() {
                        break;
                    }
                }
                self.expect(TokenKind::RightBrace, "to close record pattern")?;
                Ok(Pattern::new(
                    PatternKind::Record(fields),
                    self.location_from(start),
                ))
            }
            _ => Err(self.error_here(
                ParseErrorKind::ExpectedPattern,
                format!("expected pattern, found {}", self.peek().kind),
            )),
        }
    }
}
