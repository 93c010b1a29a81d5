//! Nominal identifier types.
//!
//! All identifiers are strings underneath, but each kind is a distinct type so
//! an unqualified name can never be passed where a resolved `module.name` is
//! expected.

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

macro_rules! identifier_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(String);

        impl $name {
            /// Wrap a string.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// The underlying text.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Unwrap into the underlying string.
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

identifier_type!(
    /// An unqualified name: `map`, `Maybe`, `x`.
    Identifier
);

identifier_type!(
    /// A dot-separated, module-relative path: `List.map`, `Oak.Base`.
    QualifiedIdentifier
);

identifier_type!(
    /// An absolute `module.name` produced by name resolution.
    FullIdentifier
);

identifier_type!(
    /// An operator symbol such as `+` or `<|`.
    InfixIdentifier
);

identifier_type!(
    /// A package name taken from its manifest.
    PackageIdentifier
);

identifier_type!(
    /// A data option identity: `DataFullName#OptionName`.
    DataOptionIdentifier
);

/// Characters that may form an infix operator symbol.
pub const INFIX_CHARS: &str = "!#$%&*+-/:;<=>?^|~`";

impl Identifier {
    /// Whether the name starts with an uppercase letter (type and option names).
    pub fn is_uppercase(&self) -> bool {
        self.0.chars().next().is_some_and(char::is_uppercase)
    }
}

impl QualifiedIdentifier {
    /// Whether the path contains more than one segment.
    pub fn is_qualified(&self) -> bool {
        self.0.contains('.')
    }

    /// The dot-separated segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// The last segment: `c` for `a.b.c`.
    pub fn last_segment(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// Split at the first dot: `a.b.c` becomes `("a", Some("b.c"))`.
    pub fn split_first(&self) -> (&str, Option<&str>) {
        match self.0.split_once('.') {
            Some((head, tail)) => (head, Some(tail)),
            None => (&self.0, None),
        }
    }

    /// Split at the last dot: `a.b.c` becomes `(Some("a.b"), "c")`.
    pub fn split_last(&self) -> (Option<&str>, &str) {
        match self.0.rsplit_once('.') {
            Some((init, last)) => (Some(init), last),
            None => (None, &self.0),
        }
    }

    /// Whether the last segment starts with an uppercase letter.
    pub fn is_uppercase(&self) -> bool {
        self.last_segment()
            .chars()
            .next()
            .is_some_and(char::is_uppercase)
    }
}

impl FullIdentifier {
    /// Join a module path and a name.
    pub fn from_parts(module: &QualifiedIdentifier, name: &str) -> Self {
        Self(format!("{}.{}", module, name))
    }

    /// The module part: `Oak.Base` for `Oak.Base.add`.
    pub fn module(&self) -> QualifiedIdentifier {
        match self.0.rsplit_once('.') {
            Some((module, _)) => QualifiedIdentifier::new(module),
            None => QualifiedIdentifier::default(),
        }
    }

    /// The unqualified definition name: `add` for `Oak.Base.add`.
    pub fn name(&self) -> Identifier {
        match self.0.rsplit_once('.') {
            Some((_, name)) => Identifier::new(name),
            None => Identifier::new(self.0.clone()),
        }
    }

    /// The unqualified name without allocating.
    pub fn short_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }
}

impl InfixIdentifier {
    /// Whether `ch` may appear in an operator symbol.
    pub fn is_infix_char(ch: char) -> bool {
        INFIX_CHARS.contains(ch)
    }
}

impl DataOptionIdentifier {
    /// Build `data#option`.
    pub fn from_parts(data: &FullIdentifier, option: &str) -> Self {
        Self(format!("{}#{}", data, option))
    }

    /// The data type part.
    pub fn data(&self) -> &str {
        self.0.split_once('#').map(|(data, _)| data).unwrap_or(&self.0)
    }

    /// The option name part.
    pub fn option(&self) -> &str {
        self.0
            .split_once('#')
            .map(|(_, option)| option)
            .unwrap_or_default()
    }
}
