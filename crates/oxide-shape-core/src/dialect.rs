//! SQL dialects.
//!
//! Builders produce generic SQL in which a few keywords are written as
//! placeholder tokens (`PRIMARY_KEY`, `AUTO_INCREMENT`, `NOT_NULL`). A single
//! substitution pass then rewrites those tokens for the target dialect.
//! The generic fallback leaves them in place.

use std::fmt;

/// Generic placeholder tokens and their SQLite and MySQL spellings.
const TOKENS: &[(&str, &str, &str)] = &[
    ("PRIMARY_KEY", "PRIMARY KEY", "PRIMARY KEY"),
    ("AUTO_INCREMENT", "AUTOINCREMENT", "AUTO_INCREMENT"),
    ("NOT_NULL", "NOT NULL", "NOT NULL"),
];

/// A supported SQL dialect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// SQLite.
    Sqlite,
    /// MySQL.
    Mysql,
    /// Fallback for unrecognized drivers. Generic tokens are kept verbatim.
    #[default]
    Generic,
}

impl Dialect {
    /// Resolves a driver name: `sqlite`/`sqlite3`, `mysql`, anything else is
    /// [`Dialect::Generic`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Self::Sqlite,
            "mysql" => Self::Mysql,
            _ => Self::Generic,
        }
    }

    /// Returns the name of the dialect.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Mysql => "mysql",
            Self::Generic => "generic",
        }
    }

    /// Returns the identifier quote character.
    #[must_use]
    pub const fn identifier_quote(self) -> char {
        match self {
            Self::Sqlite | Self::Mysql => '`',
            Self::Generic => '"',
        }
    }

    /// Quotes an identifier, doubling embedded quote characters.
    #[must_use]
    pub fn quote_identifier(self, name: &str) -> String {
        let quote = self.identifier_quote();
        let escaped = name.replace(quote, &format!("{quote}{quote}"));
        format!("{quote}{escaped}{quote}")
    }

    /// Column type written for a declared type.
    ///
    /// SQLite only accepts `AUTOINCREMENT` on a column typed exactly
    /// `INTEGER`.
    #[must_use]
    pub fn column_type(self, declared: &str, auto_increment: bool) -> &str {
        if auto_increment && self == Self::Sqlite {
            "INTEGER"
        } else {
            declared
        }
    }

    /// `LIMIT` value meaning "no limit", for an `OFFSET` without a limit.
    ///
    /// `None` if the dialect accepts a bare `OFFSET`.
    #[must_use]
    pub const fn unbounded_limit(self) -> Option<&'static str> {
        match self {
            Self::Sqlite => Some("-1"),
            Self::Mysql => Some("18446744073709551615"),
            Self::Generic => None,
        }
    }

    /// Keyword replacing a generic token, or `None` if the token is unknown
    /// or the dialect keeps it.
    #[must_use]
    pub fn keyword(self, token: &str) -> Option<&'static str> {
        let &(_, sqlite, mysql) = TOKENS.iter().find(|(generic, _, _)| *generic == token)?;
        match self {
            Self::Sqlite => Some(sqlite),
            Self::Mysql => Some(mysql),
            Self::Generic => None,
        }
    }

    /// Replaces whole-word generic tokens outside quoted regions.
    #[must_use]
    pub fn substitute(self, sql: &str) -> String {
        if self == Self::Generic {
            return String::from(sql);
        }

        let mut out = String::with_capacity(sql.len());
        let mut quote: Option<char> = None;
        let mut word = String::new();

        for c in sql.chars() {
            if quote.is_none() && (c.is_ascii_alphanumeric() || c == '_') {
                word.push(c);
                continue;
            }
            self.flush(&mut word, &mut out);
            match quote {
                Some(q) if q == c => quote = None,
                None if matches!(c, '\'' | '"' | '`') => quote = Some(c),
                _ => {}
            }
            out.push(c);
        }
        self.flush(&mut word, &mut out);
        out
    }

    fn flush(self, word: &mut String, out: &mut String) {
        if word.is_empty() {
            return;
        }
        out.push_str(self.keyword(word).unwrap_or(word.as_str()));
        word.clear();
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
