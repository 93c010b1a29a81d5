//! Type expression parsing.

use oak_core::{Identifier, ParseError, ParseErrorKind, QualifiedIdentifier};

use super::parser::Parser;
use crate::ast::types::Type;
use crate::lexer::TokenKind;

impl<'src> Parser<'src> {
    /// Parse a type expression.
    ///
    /// ```text
    /// ()            unit
    /// (A, B): R     function
    /// (A, B)        tuple
    /// (A)           parenthesized
    /// { x: A }      record
    /// Name[A, B]    named, possibly qualified
    /// a             type parameter
    /// ```
    pub(crate) fn parse_type(&mut self) -> Result<Type, ParseError> {
        let start = self.start();
        match self.peek().kind {
            TokenKind::LeftParen => {
                self.advance();
                if self.eat(TokenKind::RightParen).is_some() {
                    return Ok(Type::Unit {
                        location: self.location_from(start),
                    });
                }
                let mut items = vec![self.parse_type()?];
                while self.eat(TokenKind::Comma).is_some() {
                    items.push(self.parse_type()?);
                }
                self.expect(TokenKind::RightParen, "to close type")?;

                if self.eat(TokenKind::Colon).is_some() {
                    let ret = self.parse_type()?;
                    Ok(Type::Func {
                        params: items,
                        ret: Box::new(ret),
                        location: self.location_from(start),
                    })
                } else if items.len() == 1 {
                    Ok(items.remove(0))
                } else {
                    Ok(Type::Tuple {
                        items,
                        location: self.location_from(start),
                    })
                }
            }
            TokenKind::LeftBrace => {
                self.advance();
                let mut fields = Vec::new();
                if !self.check(TokenKind::RightBrace) {
                    loop {
                        let name = self.parse_identifier("for record field")?;
                        self.expect(TokenKind::Colon, "after record field name")?;
                        let ty = self.parse_type()?;
                        if fields.iter().any(|(existing, _)| *existing == name) {
                            return Err(self.error_here(
                                ParseErrorKind::ExpectedType,
                                format!("duplicate record field '{}'", name),
                            ));
                        }
                        fields.push((name, ty));
                        if self.eat(TokenKind::Comma).is_none() {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RightBrace, "to close record type")?;
                Ok(Type::Record {
                    fields,
                    location: self.location_from(start),
                })
            }
            TokenKind::Identifier => {
                let token = self.advance();
                let name = QualifiedIdentifier::new(token.lexeme);
                if name.is_uppercase() {
                    let args = self.parse_type_args()?;
                    Ok(Type::Named {
                        name,
                        args,
                        location: self.location_from(start),
                    })
                } else if name.is_qualified() {
                    Err(ParseError::new(
                        ParseErrorKind::ExpectedType,
                        self.location_of(&token),
                        "type names must start with an uppercase letter",
                    ))
                } else {
                    Ok(Type::Parameter {
                        name: Identifier::new(token.lexeme),
                        location: self.location_of(&token),
                    })
                }
            }
            _ => Err(self.error_here(
                ParseErrorKind::ExpectedType,
                format!("expected type, found {}", self.peek().kind),
            )),
        }
    }

    /// Parse optional `[A, B]` type arguments.
    pub(crate) fn parse_type_args(&mut self) -> Result<Vec<Type>, ParseError> {
        let mut args = Vec::new();
        if self.eat(TokenKind::LeftBracket).is_some() {
            loop {
                args.push(self.parse_type()?);
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RightBracket, "to close type arguments")?;
        }
        Ok(args)
    }

    /// Parse optional `[a, b]` type parameter names.
    pub(crate) fn parse_type_params(&mut self) -> Result<Vec<Identifier>, ParseError> {
        let mut params = Vec::new();
        if self.eat(TokenKind::LeftBracket).is_some() {
            loop {
                let name = self.parse_identifier("for type parameter")?;
                if name.is_uppercase() {
                    return Err(self.error_here(
                        ParseErrorKind::ExpectedIdentifier,
                        format!("type parameter '{}' must be lowercase", name),
                    ));
                }
                params.push(name);
                if self.eat(TokenKind::Comma).is_none() {
                    break;
                }
            }
            self.expect(TokenKind::RightBracket, "to close type parameters")?;
        }
        Ok(params)
    }

    /// Parse an unqualified identifier.
    pub(crate) fn parse_identifier(&mut self, context: &str) -> Result<Identifier, ParseError> {
        let token = self.peek();
        if token.kind == TokenKind::Identifier && !token.lexeme.contains('.') {
            let token = self.advance();
            Ok(Identifier::new(token.lexeme))
        } else {
            Err(ParseError::new(
                ParseErrorKind::ExpectedIdentifier,
                self.location_of(token),
                format!("expected identifier {}", context),
            ))
        }
    }
}
