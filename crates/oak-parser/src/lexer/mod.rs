//! Lexical analysis for Oak source code.
//!
//! Converts module source text into [`Token`]s carrying byte offsets into the
//! module's [`oak_core::SourceFile`].

mod cursor;
#[allow(clippy::module_inception)]
mod lexer;
mod token;

pub use cursor::{Cursor, is_ident_continue, is_ident_start};
pub use lexer::Lexer;
pub use token::{Token, TokenKind, lookup_keyword, lookup_symbol};
