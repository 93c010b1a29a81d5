//! Module header and top-level declaration parsing.

use std::collections::BTreeSet;

use oak_core::{
    FullIdentifier, Identifier, InfixIdentifier, PackageIdentifier, ParseError, ParseErrorKind,
    QualifiedIdentifier,
};

use super::parser::Parser;
use crate::ast::expr::{Expr, ExprKind};
use crate::ast::module::*;
use crate::ast::pattern::{Pattern, PatternKind};
use crate::ast::types::{DataOption, Type};
use crate::lexer::TokenKind;

impl<'src> Parser<'src> {
    /// `module Name import* (alias | infix | def | type)*`
    pub(crate) fn parse_module_body(
        &mut self,
        package: PackageIdentifier,
    ) -> Result<Module, ParseError> {
        self.expect(TokenKind::Module, "at start of file")?;
        let name_token = self.expect(TokenKind::Identifier, "for module name")?;
        let name = QualifiedIdentifier::new(name_token.lexeme);

        let mut module = Module {
            name,
            location: self.location_of(&name_token),
            file: self.file.clone(),
            imports: Vec::new(),
            aliases: Vec::new(),
            infix_fns: Vec::new(),
            definitions: Vec::new(),
            data_types: Vec::new(),
            package,
            referenced_packages: BTreeSet::new(),
        };

        while self.check(TokenKind::Import) {
            let import = self.parse_import()?;
            module.imports.push(import);
        }

        loop {
            match self.peek().kind {
                TokenKind::Eof => break,
                TokenKind::Alias => {
                    let alias = self.parse_alias(&module.name)?;
                    module.aliases.push(alias);
                }
                TokenKind::Infix => {
                    let infix = self.parse_infix()?;
                    module.infix_fns.push(infix);
                }
                TokenKind::Def => {
                    let definition = self.parse_definition(&module.name)?;
                    module.definitions.push(definition);
                }
                TokenKind::Type => {
                    let data_type = self.parse_data_type()?;
                    module.data_types.push(data_type);
                }
                TokenKind::Import => {
                    return Err(self.error_here(
                        ParseErrorKind::ExpectedDeclaration,
                        "imports must come before all declarations",
                    ));
                }
                _ => {
                    return Err(self.error_here(
                        ParseErrorKind::ExpectedDeclaration,
                        format!(
                            "expected 'alias', 'infix', 'def' or 'type', found {}",
                            self.peek().kind
                        ),
                    ));
                }
            }
        }
        Ok(module)
    }

    /// `import A.B as X exposing (a, (+), T)`
    fn parse_import(&mut self) -> Result<Import, ParseError> {
        let start = self.start();
        self.advance();
        let module_token = self.expect(TokenKind::Identifier, "for imported module")?;
        let module = QualifiedIdentifier::new(module_token.lexeme);

        let alias = if self.eat(TokenKind::As).is_some() {
            Some(self.parse_identifier("after 'as'")?)
        } else {
            None
        };

        let exposing = if self.eat(TokenKind::Exposing).is_some() {
            self.expect(TokenKind::LeftParen, "after 'exposing'")?;
            let exposing = if self.check_operator("*") {
                self.advance();
                Exposing::All
            } else {
                let mut names = Vec::new();
                loop {
                    names.push(self.parse_exposed_name()?);
                    if self.eat(TokenKind::Comma).is_none() {
                        break;
                    }
                }
                Exposing::Names(names)
            };
            self.expect(TokenKind::RightParen, "to close exposing list")?;
            exposing
        } else {
            Exposing::Nothing
        };

        Ok(Import {
            module,
            alias,
            exposing,
            location: self.location_from(start),
        })
    }

    /// `name` or `(op)`
    fn parse_exposed_name(
        &mut self,
    ) -> Result<(Identifier, oak_core::Location), ParseError> {
        let start = self.start();
        if self.eat(TokenKind::LeftParen).is_some() {
            let op = self.expect(TokenKind::Operator, "in exposing list")?;
            self.expect(TokenKind::RightParen, "after operator")?;
            return Ok((Identifier::new(op.lexeme), self.location_from(start)));
        }
        let name = self.parse_identifier("in exposing list")?;
        Ok((name, self.location_from(start)))
    }

    fn parse_hidden(&mut self) -> bool {
        self.eat(TokenKind::Hidden).is_some()
    }

    /// `alias hidden? native Name[a]` or `alias hidden? Name[a] = type`
    fn parse_alias(&mut self, module: &QualifiedIdentifier) -> Result<Alias, ParseError> {
        let start = self.start();
        self.advance();
        let hidden = self.parse_hidden();
        let native = self.eat(TokenKind::Native).is_some();

        let name_token = self.peek().clone();
        let name = self.parse_identifier("for alias name")?;
        if !name.is_uppercase() {
            return Err(ParseError::new(
                ParseErrorKind::InvalidDeclaration,
                self.location_of(&name_token),
                format!("type name '{}' must start with an uppercase letter", name),
            ));
        }
        let params = self.parse_type_params()?;

        let ty = if native {
            let location = self.location_from(start);
            Type::Native {
                name: FullIdentifier::from_parts(module, &name),
                args: params
                    .iter()
                    .map(|p| Type::Parameter {
                        name: p.clone(),
                        location: location.clone(),
                    })
                    .collect(),
                location,
            }
        } else {
            self.expect(TokenKind::Equal, "after alias name")?;
            self.parse_type()?
        };

        Ok(Alias {
            name,
            params,
            ty,
            hidden,
            location: self.location_of(&name_token),
        })
    }

    /// `infix hidden? (op): (left 6) = name`
    fn parse_infix(&mut self) -> Result<Infix, ParseError> {
        self.advance();
        let hidden = self.parse_hidden();
        self.expect(TokenKind::LeftParen, "before operator")?;
        let op = self.expect(TokenKind::Operator, "in infix declaration")?;
        self.expect(TokenKind::RightParen, "after operator")?;
        self.expect(TokenKind::Colon, "after operator")?;
        self.expect(TokenKind::LeftParen, "before associativity")?;

        let associativity = if self.check_word("left") {
            Associativity::Left
        } else if self.check_word("right") {
            Associativity::Right
        } else if self.check_word("non") {
            Associativity::Non
        } else {
            return Err(self.unexpected("expected 'left', 'right' or 'non'"));
        };
        self.advance();

        let precedence_token = self.expect(TokenKind::IntLiteral, "for precedence")?;
        let precedence = match precedence_token.value {
            Some(oak_core::Constant::Int(v)) => v,
            _ => 0,
        };
        self.expect(TokenKind::RightParen, "after precedence")?;
        self.expect(TokenKind::Equal, "before aliased definition")?;
        let alias = self.parse_identifier("naming the operator's definition")?;

        Ok(Infix {
            name: InfixIdentifier::new(op.lexeme),
            associativity,
            precedence,
            alias,
            hidden,
            location: self.location_of(&op),
        })
    }

    /// `def hidden? native? name(params)?: type? = body`
    fn parse_definition(&mut self, module: &QualifiedIdentifier) -> Result<Definition, ParseError> {
        self.advance();
        let mut flags = DefinitionFlags::empty();
        if self.parse_hidden() {
            flags |= DefinitionFlags::HIDDEN;
        }
        let native = self.eat(TokenKind::Native).is_some();
        if native {
            flags |= DefinitionFlags::NATIVE;
        }

        let name_token = self.peek().clone();
        let name = self.parse_identifier("for definition name")?;
        let location = self.location_of(&name_token);

        let mut params = Vec::new();
        if self.eat(TokenKind::LeftParen).is_some() {
            params = self.parse_pattern_list(TokenKind::RightParen)?;
            self.expect(TokenKind::RightParen, "to close parameters")?;
            if params.is_empty() {
                return Err(ParseError::new(
                    ParseErrorKind::InvalidDeclaration,
                    location,
                    "a function needs at least one parameter; remove the parentheses for a value",
                ));
            }
        }

        if native {
            self.expect(TokenKind::Colon, "after native definition")?;
            let return_type = self.parse_type()?;
            let (params, args) = native_arguments(params);
            let body = Expr::new(
                ExprKind::Call {
                    name: FullIdentifier::from_parts(module, &name),
                    args: args
                        .into_iter()
                        .map(|arg| {
                            Expr::new(ExprKind::Var(QualifiedIdentifier::new(arg)), location.clone())
                        })
                        .collect(),
                },
                location.clone(),
            );
            return Ok(Definition {
                name,
                params,
                return_type: Some(return_type),
                body,
                flags,
                location,
            });
        }

        let return_type = if self.eat(TokenKind::Colon).is_some() {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(TokenKind::Equal, "before definition body")?;
        let body = self.parse_expr()?;

        Ok(Definition {
            name,
            params,
            return_type,
            body,
            flags,
            location,
        })
    }

    /// `type hidden? Name[a] = hidden? Opt(T) | ...`
    fn parse_data_type(&mut self) -> Result<DataType, ParseError> {
        self.advance();
        let hidden = self.parse_hidden();
        let name_token = self.peek().clone();
        let name = self.parse_identifier("for data type name")?;
        if !name.is_uppercase() {
            return Err(ParseError::new(
                ParseErrorKind::InvalidDeclaration,
                self.location_of(&name_token),
                format!("data type '{}' must start with an uppercase letter", name),
            ));
        }
        let params = self.parse_type_params()?;
        self.expect(TokenKind::Equal, "after data type name")?;

        let mut options: Vec<DataOption> = Vec::new();
        loop {
            let option_hidden = self.parse_hidden();
            let option_token = self.peek().clone();
            let option_name = self.parse_identifier("for data option")?;
            if !option_name.is_uppercase() {
                return Err(ParseError::new(
                    ParseErrorKind::InvalidDeclaration,
                    self.location_of(&option_token),
                    format!("option '{}' must start with an uppercase letter", option_name),
                ));
            }
            if options.iter().any(|o| o.name == option_name) {
                return Err(ParseError::new(
                    ParseErrorKind::InvalidDeclaration,
                    self.location_of(&option_token),
                    format!("option '{}' is declared twice", option_name),
                ));
            }
            let mut values = Vec::new();
            if self.eat(TokenKind::LeftParen).is_some() {
                loop {
                    values.push(self.parse_type()?);
                    if self.eat(TokenKind::Comma).is_none() {
                        break;
                    }
                }
                self.expect(TokenKind::RightParen, "to close option values")?;
            }
            options.push(DataOption {
                name: option_name,
                values,
                hidden: option_hidden,
                location: self.location_of(&option_token),
            });
            if self.eat(TokenKind::Bar).is_none() {
                break;
            }
        }

        Ok(DataType {
            name,
            params,
            options,
            hidden,
            location: self.location_of(&name_token),
        })
    }
}

/// Native definitions forward their parameters to the runtime by name;
/// unnamed parameter patterns get a synthesized `_n<i>` alias.
fn native_arguments(params: Vec<Pattern>) -> (Vec<Pattern>, Vec<String>) {
    let mut names = Vec::with_capacity(params.len());
    let params = params
        .into_iter()
        .enumerate()
        .map(|(i, pattern)| match &pattern.kind {
            PatternKind::Named(name) => {
                names.push(name.to_string());
                pattern
            }
            _ => {
                let name = format!("_n{i}");
                names.push(name.clone());
                let location = pattern.location.clone();
                Pattern::new(
                    PatternKind::Alias {
                        name: Identifier::new(name),
                        nested: Box::new(pattern),
                    },
                    location,
                )
            }
        })
        .collect();
    (params, names)
}
