//! Expression parsing.
//!
//! Operator chains are collected into a flat [`ExprKind::BinOp`]; unary minus,
//! application and field access bind tighter than any infix operator.

use oak_core::{
    Constant, FullIdentifier, Identifier, InfixIdentifier, ParseError, ParseErrorKind,
    QualifiedIdentifier,
};

use super::parser::Parser;
use crate::ast::expr::*;
use crate::ast::pattern::Pattern;
use crate::ast::types::Type;
use crate::lexer::TokenKind;

/// One clause of a `let ... in` chain.
enum LetClause {
    Value {
        pattern: Pattern,
        value: Expr,
        start: u32,
    },
    Function {
        name: Identifier,
        params: Vec<Pattern>,
        return_type: Option<Type>,
        body: Expr,
        start: u32,
    },
}

impl<'src> Parser<'src> {
    /// Parse an expression, including any operator chain.
    pub(crate) fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        let first = self.parse_unary()?;
        if !self.check(TokenKind::Operator) {
            return Ok(first);
        }

        let mut items = vec![BinOpItem::Operand(first)];
        while self.check(TokenKind::Operator) {
            let token = self.advance();
            items.push(BinOpItem::Infix {
                op: InfixIdentifier::new(token.lexeme),
                location: self.location_of(&token),
            });
            items.push(BinOpItem::Operand(self.parse_unary()?));
        }
        Ok(Expr::new(
            ExprKind::BinOp {
                items,
                in_parentheses: false,
            },
            self.location_from(start),
        ))
    }

    /// Parse a comma-separated expression list up to `close`.
    fn parse_expr_list(&mut self, close: TokenKind) -> Result<Vec<Expr>, ParseError> {
        let mut exprs = Vec::new();
        if self.check(close) {
            return Ok(exprs);
        }
        loop {
            exprs.push(self.parse_expr()?);
            if self.eat(TokenKind::Comma).is_none() {
                break;
            }
        }
        Ok(exprs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.check_operator("-") {
            let start = self.start();
            self.advance();
            if self.peek().value == Some(Constant::Int(i64::MIN)) {
                let token = self.advance();
                let literal = Expr::new(
                    ExprKind::Const(self.literal_value(&token, true)?),
                    self.location_of(&token),
                );
                return Ok(Expr::new(
                    ExprKind::Negate(Box::new(literal)),
                    self.location_from(start),
                ));
            }
            let operand = self.parse_unary()?;
            return Ok(Expr::new(
                ExprKind::Negate(Box::new(operand)),
                self.location_from(start),
            ));
        }
        self.parse_postfix()
    }

    /// Application `f(a)` and field access `e.x.y`.
    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat(TokenKind::LeftParen).is_some() {
                let args = self.parse_expr_list(TokenKind::RightParen)?;
                self.expect(TokenKind::RightParen, "to close argument list")?;
                if args.is_empty() {
                    return Err(self.error_here(
                        ParseErrorKind::ExpectedExpression,
                        "a call needs at least one argument; pass () for unit",
                    ));
                }
                expr = Expr::new(
                    ExprKind::Apply {
                        func: Box::new(expr),
                        args,
                    },
                    self.location_from(start),
                );
            } else if self.check(TokenKind::Dot) && self.peek_nth(1).kind == TokenKind::Identifier
            {
                self.advance();
                let token = self.advance();
                for segment in token.lexeme.split('.') {
                    expr = Expr::new(
                        ExprKind::Access {
                            record: Box::new(expr),
                            field: Identifier::new(segment),
                        },
                        self.location_from(start),
                    );
                }
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        match self.peek().kind {
            kind if kind.is_literal() => {
                let token = self.advance();
                let value = self.literal_value(&token, false)?;
                Ok(Expr::new(ExprKind::Const(value), self.location_of(&token)))
            }
            TokenKind::Identifier => {
                let token = self.advance();
                Ok(Expr::new(
                    ExprKind::Var(QualifiedIdentifier::new(token.lexeme)),
                    self.location_of(&token),
                ))
            }
            TokenKind::Dot => {
                self.advance();
                let field = self.parse_identifier("after '.' in accessor")?;
                Ok(Expr::new(
                    ExprKind::Accessor(field),
                    self.location_from(start),
                ))
            }
            TokenKind::LeftParen => self.parse_parenthesized(),
            TokenKind::LeftBracket => {
                self.advance();
                let items = self.parse_expr_list(TokenKind::RightBracket)?;
                self.expect(TokenKind::RightBracket, "to close list")?;
                Ok(Expr::new(ExprKind::List(items), self.location_from(start)))
            }
            TokenKind::LeftBrace => self.parse_record(),
            TokenKind::Backslash => self.parse_lambda(),
            TokenKind::If => {
                self.advance();
                let condition = self.parse_expr()?;
                self.expect(TokenKind::Then, "after 'if' condition")?;
                let positive = self.parse_expr()?;
                self.expect(TokenKind::Else, "after 'then' branch")?;
                let negative = self.parse_expr()?;
                Ok(Expr::new(
                    ExprKind::If {
                        condition: Box::new(condition),
                        positive: Box::new(positive),
                        negative: Box::new(negative),
                    },
                    self.location_from(start),
                ))
            }
            TokenKind::Let => self.parse_let(),
            TokenKind::Select => self.parse_select(),
            TokenKind::Native => {
                self.advance();
                let token = self.expect(TokenKind::StringLiteral, "naming the native function")?;
                let name = match token.value {
                    Some(Constant::String(name)) => FullIdentifier::new(name),
                    _ => FullIdentifier::new(token.lexeme.trim_matches('"')),
                };
                self.expect(TokenKind::LeftParen, "before native arguments")?;
                let args = self.parse_expr_list(TokenKind::RightParen)?;
                self.expect(TokenKind::RightParen, "to close native arguments")?;
                Ok(Expr::new(
                    ExprKind::Call { name, args },
                    self.location_from(start),
                ))
            }
            _ => Err(self.error_here(
                ParseErrorKind::ExpectedExpression,
                format!("expected expression, found {}", self.peek().kind),
            )),
        }
    }

    /// `()`, `(op)`, `(e)`, `(a, b)`
    fn parse_parenthesized(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        self.advance();

        if self.eat(TokenKind::RightParen).is_some() {
            return Ok(Expr::new(
                ExprKind::Const(Constant::Unit),
                self.location_from(start),
            ));
        }

        if self.check(TokenKind::Operator) && self.peek_nth(1).kind == TokenKind::RightParen {
            let token = self.advance();
            self.advance();
            return Ok(Expr::new(
                ExprKind::InfixVar(InfixIdentifier::new(token.lexeme)),
                self.location_from(start),
            ));
        }

        let mut items = self.parse_expr_list(TokenKind::RightParen)?;
        self.expect(TokenKind::RightParen, "to close parenthesized expression")?;
        if items.len() == 1 {
            let mut inner = items.remove(0);
            if let ExprKind::BinOp { in_parentheses, .. } = &mut inner.kind {
                *in_parentheses = true;
            }
            inner.location = self.location_from(start);
            Ok(inner)
        } else {
            Ok(Expr::new(ExprKind::Tuple(items), self.location_from(start)))
        }
    }

    /// `{ x = 1 }` or `{ r | x = 1 }`
    fn parse_record(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        self.advance();

        if self.check(TokenKind::Identifier) && self.peek_nth(1).kind == TokenKind::Bar {
            let record = QualifiedIdentifier::new(self.advance().lexeme);
            self.advance();
            let fields = self.parse_record_fields()?;
            self.expect(TokenKind::RightBrace, "to close record update")?;
            return Ok(Expr::new(
                ExprKind::Update { record, fields },
                self.location_from(start),
            ));
        }

        let fields = if self.check(TokenKind::RightBrace) {
            Vec::new()
        } else {
            self.parse_record_fields()?
        };
        self.expect(TokenKind::RightBrace, "to close record")?;
        Ok(Expr::new(ExprKind::Record(fields), self.location_from(start)))
    }

    fn parse_record_fields(&mut self) -> Result<Vec<RecordField>, ParseError> {
        let mut fields: Vec<RecordField> = Vec::new();
        loop {
            let start = self.start();
            let name = self.parse_identifier("for record field")?;
            if fields.iter().any(|f| f.name == name) {
                return Err(ParseError::new(
                    ParseErrorKind::ExpectedExpression,
                    self.location_from(start),
                    format!("duplicate record field '{}'", name),
                ));
            }
            self.expect(TokenKind::Equal, "after record field name")?;
            let value = self.parse_expr()?;
            fields.push(RecordField {
                name,
                value,
                location: self.location_from(start),
            });
            if self.eat(TokenKind::Comma).is_none() {
                return Ok(fields);
            }
        }
    }

    /// `\(p, q): T -> body`
    fn parse_lambda(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        self.advance();
        self.expect(TokenKind::LeftParen, "before lambda parameters")?;
        let params = self.parse_pattern_list(TokenKind::RightParen)?;
        self.expect(TokenKind::RightParen, "to close lambda parameters")?;
        if params.is_empty() {
            return Err(ParseError::new(
                ParseErrorKind::ExpectedPattern,
                self.location_from(start),
                "a lambda needs at least one parameter",
            ));
        }
        let return_type = if self.eat(TokenKind::Colon).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(TokenKind::Arrow, "before lambda body")?;
        let body = self.parse_expr()?;
        Ok(Expr::new(
            ExprKind::Lambda {
                params,
                return_type,
                body: Box::new(body),
            },
            self.location_from(start),
        ))
    }

    /// `let p = v let f(x) = w in e`
    fn parse_let(&mut self) -> Result<Expr, ParseError> {
        let mut clauses = Vec::new();
        loop {
            let start = self.start();
            self.expect(TokenKind::Let, "to start binding")?;

            let is_function = self.check(TokenKind::Identifier)
                && self.peek_nth(1).kind == TokenKind::LeftParen
                && !QualifiedIdentifier::new(self.peek().lexeme).is_uppercase();

            if is_function {
                let name = self.parse_identifier("for local function")?;
                self.advance();
                let params = self.parse_pattern_list(TokenKind::RightParen)?;
                self.expect(TokenKind::RightParen, "to close parameters")?;
                if params.is_empty() {
                    return Err(ParseError::new(
                        ParseErrorKind::ExpectedPattern,
                        self.location_from(start),
                        "a local function needs at least one parameter",
                    ));
                }
                let return_type = if self.eat(TokenKind::Colon).is_some() {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                self.expect(TokenKind::Equal, "before local function body")?;
                let body = self.parse_expr()?;
                clauses.push(LetClause::Function {
                    name,
                    params,
                    return_type,
                    body,
                    start,
                });
            } else {
                let pattern = self.parse_pattern()?;
                self.expect(TokenKind::Equal, "after let pattern")?;
                let value = self.parse_expr()?;
                clauses.push(LetClause::Value {
                    pattern,
                    value,
                    start,
                });
            }

            if !self.check(TokenKind::Let) {
                break;
            }
        }
        self.expect(TokenKind::In, "after let bindings")?;
        let mut nested = self.parse_expr()?;

        for clause in clauses.into_iter().rev() {
            nested = match clause {
                LetClause::Value {
                    pattern,
                    value,
                    start,
                } => Expr::new(
                    ExprKind::Let {
                        pattern,
                        value: Box::new(value),
                        nested: Box::new(nested),
                    },
                    self.location_from(start),
                ),
                LetClause::Function {
                    name,
                    params,
                    return_type,
                    body,
                    start,
                } => {
                    let location = self.location_from(start);
                    Expr::new(
                        ExprKind::Function(Box::new(LocalFunction {
                            name,
                            params,
                            return_type,
                            body,
                            nested,
                            location: location.clone(),
                        })),
                        location,
                    )
                }
            };
        }
        Ok(nested)
    }

    /// `select e case p -> body ... end`
    fn parse_select(&mut self) -> Result<Expr, ParseError> {
        let start = self.start();
        self.advance();
        let condition = self.parse_expr()?;

        let mut cases = Vec::new();
        while self.check(TokenKind::Case) {
            let case_start = self.start();
            self.advance();
            let pattern = self.parse_pattern()?;
            self.expect(TokenKind::Arrow, "after case pattern")?;
            let body = self.parse_expr()?;
            cases.push(SelectCase {
                pattern,
                body,
                location: self.location_from(case_start),
            });
        }
        if cases.is_empty() {
            return Err(self.unexpected("expected 'case'"));
        }
        self.expect(TokenKind::End, "to close select")?;
        Ok(Expr::new(
            ExprKind::Select {
                condition: Box::new(condition),
                cases,
            },
            self.location_from(start),
        ))
    }
}
