//! Token types for the Oak lexer.

use std::fmt;

use lazy_static::lazy_static;
use oak_core::Constant;
use rustc_hash::FxHashMap;

/// A token from the source code.
///
/// The lexeme borrows from the module source; literal tokens also carry
/// their decoded value.
#[derive(Clone, PartialEq)]
pub struct Token<'src> {
    /// The type of token.
    pub kind: TokenKind,
    /// The source text of this token.
    pub lexeme: &'src str,
    /// Start byte offset.
    pub start: u32,
    /// End byte offset (exclusive).
    pub end: u32,
    /// Decoded value of a literal token.
    pub value: Option<Constant>,
}

impl<'src> Token<'src> {
    /// Create a new token.
    #[inline]
    pub fn new(kind: TokenKind, lexeme: &'src str, start: u32, end: u32) -> Self {
        Self {
            kind,
            lexeme,
            start,
            end,
            value: None,
        }
    }

    /// Attach a decoded literal value.
    #[inline]
    pub fn with_value(mut self, value: Constant) -> Self {
        self.value = Some(value);
        self
    }
}

impl fmt::Debug for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}({:?} @ {}..{})",
            self.kind, self.lexeme, self.start, self.end
        )
    }
}

/// All token types of the Oak language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // =========================================
    // Literals
    // =========================================
    /// `42`, `0xff`, `1_000`
    IntLiteral,
    /// `3.14`, `1e10`
    FloatLiteral,
    /// `'c'`
    CharLiteral,
    /// `"text"`
    StringLiteral,

    // =========================================
    // Names
    // =========================================
    /// A possibly dotted identifier: `map`, `List.map`, `r.x.y`
    Identifier,
    /// A run of operator characters other than the reserved `=`, `:`, `|`, `->`
    Operator,

    // =========================================
    // Keywords
    // =========================================
    Module,
    Import,
    As,
    Exposing,
    Alias,
    Hidden,
    Native,
    Infix,
    Def,
    Type,
    If,
    Then,
    Else,
    Let,
    In,
    Select,
    Case,
    End,

    // =========================================
    // Punctuation
    // =========================================
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    /// `:`
    Colon,
    /// `=`
    Equal,
    /// `|`
    Bar,
    /// `->`
    Arrow,
    /// `\`
    Backslash,
    /// `_`
    Underscore,

    /// End of input.
    Eof,
}

impl TokenKind {
    /// Get a human-readable description for diagnostics.
    pub fn description(&self) -> &'static str {
        use TokenKind::*;
        match self {
            IntLiteral => "integer literal",
            FloatLiteral => "float literal",
            CharLiteral => "character literal",
            StringLiteral => "string literal",
            Identifier => "identifier",
            Operator => "operator",
            Module => "'module'",
            Import => "'import'",
            As => "'as'",
            Exposing => "'exposing'",
            Alias => "'alias'",
            Hidden => "'hidden'",
            Native => "'native'",
            Infix => "'infix'",
            Def => "'def'",
            Type => "'type'",
            If => "'if'",
            Then => "'then'",
            Else => "'else'",
            Let => "'let'",
            In => "'in'",
            Select => "'select'",
            Case => "'case'",
            End => "'end'",
            LeftParen => "'('",
            RightParen => "')'",
            LeftBracket => "'['",
            RightBracket => "']'",
            LeftBrace => "'{'",
            RightBrace => "'}'",
            Comma => "','",
            Dot => "'.'",
            Colon => "':'",
            Equal => "'='",
            Bar => "'|'",
            Arrow => "'->'",
            Backslash => "'\\'",
            Underscore => "'_'",
            Eof => "end of file",
        }
    }

    /// Whether this token starts a top-level declaration.
    pub fn is_declaration_start(&self) -> bool {
        matches!(
            self,
            TokenKind::Alias | TokenKind::Infix | TokenKind::Def | TokenKind::Type
        )
    }

    /// Whether this token is a literal.
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            TokenKind::IntLiteral
                | TokenKind::FloatLiteral
                | TokenKind::CharLiteral
                | TokenKind::StringLiteral
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

lazy_static! {
    static ref KEYWORDS: FxHashMap<&'static str, TokenKind> = {
        use TokenKind::*;
        [
            ("module", Module),
            ("import", Import),
            ("as", As),
            ("exposing", Exposing),
            ("alias", Alias),
            ("hidden", Hidden),
            ("native", Native),
            ("infix", Infix),
            ("def", Def),
            ("type", Type),
            ("if", If),
            ("then", Then),
            ("else", Else),
            ("let", Let),
            ("in", In),
            ("select", Select),
            ("case", Case),
            ("end", End),
        ]
        .into_iter()
        .collect()
    };
}

/// Look up a keyword by its text.
///
/// `left`, `right` and `non` are contextual and lex as identifiers.
pub fn lookup_keyword(ident: &str) -> Option<TokenKind> {
    KEYWORDS.get(ident).copied()
}

/// Classify a run of operator characters.
pub fn lookup_symbol(symbol: &str) -> TokenKind {
    match symbol {
        "=" => TokenKind::Equal,
        ":" => TokenKind::Colon,
        "|" => TokenKind::Bar,
        "->" => TokenKind::Arrow,
        _ => TokenKind::Operator,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_lookup() {
        assert_eq!(lookup_keyword("select"), Some(TokenKind::Select));
        assert_eq!(lookup_keyword("exposing"), Some(TokenKind::Exposing));
        assert_eq!(lookup_keyword("left"), None);
        assert_eq!(lookup_keyword("Select"), None);
    }

    #[test]
    fn symbol_lookup() {
        assert_eq!(lookup_symbol("="), TokenKind::Equal);
        assert_eq!(lookup_symbol("=="), TokenKind::Operator);
        assert_eq!(lookup_symbol("|"), TokenKind::Bar);
        assert_eq!(lookup_symbol("||"), TokenKind::Operator);
        assert_eq!(lookup_symbol("->"), TokenKind::Arrow);
        assert_eq!(lookup_symbol("::"), TokenKind::Operator);
    }

    #[test]
    fn token_categories() {
        assert!(TokenKind::Def.is_declaration_start());
        assert!(!TokenKind::Let.is_declaration_start());
        assert!(TokenKind::StringLiteral.is_literal());
        assert!(!TokenKind::Identifier.is_literal());
    }
}
