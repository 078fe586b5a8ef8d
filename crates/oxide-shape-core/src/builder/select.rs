//! SELECT builder.

use super::{render_predicates, require_table, Predicate, Statement};
use crate::dialect::Dialect;
use crate::error::{Result, ShapeError};
use crate::table::TableDescriptor;
use crate::value::{SqlValue, ToSqlValue};

/// Sort direction for `ORDER BY`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl Order {
    const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Projection {
    Columns,
    Count,
    Max(String),
}

#[derive(Debug, Clone)]
enum Source<'a> {
    Table(&'a TableDescriptor),
    Select(Box<Select<'a>>),
}

/// Builds `SELECT` over a table's columns.
///
/// Without explicit sources the table itself is the `FROM` target. Nested
/// selects are inlined as `(<sub>) AS <alias>` where the alias is the nested
/// builder's table name; their parameters come first, in composition order.
#[derive(Debug, Clone)]
pub struct Select<'a> {
    table: Option<&'a TableDescriptor>,
    alias: Option<String>,
    distinct: bool,
    projection: Projection,
    sources: Vec<Source<'a>>,
    filters: Vec<Predicate>,
    order_by: Vec<(String, Order)>,
    limit: Option<u64>,
    offset: Option<u64>,
    dialect: Dialect,
}

impl Default for Select<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Select<'a> {
    /// Creates a new SELECT builder.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            table: None,
            alias: None,
            distinct: false,
            projection: Projection::Columns,
            sources: Vec::new(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            dialect: Dialect::Generic,
        }
    }

    /// Sets the table whose columns are projected.
    #[must_use]
    pub const fn table(mut self, table: &'a TableDescriptor) -> Self {
        self.table = Some(table);
        self
    }

    /// Overrides the alias used when this builder is nested.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Adds `DISTINCT`.
    #[must_use]
    pub const fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Projects `COUNT(*)` instead of the columns.
    #[must_use]
    pub fn count(mut self) -> Self {
        self.projection = Projection::Count;
        self
    }

    /// Projects `MAX(<column>)` instead of the columns.
    #[must_use]
    pub fn max(mut self, column: &str) -> Self {
        self.projection = Projection::Max(String::from(column));
        self
    }

    /// Adds a table to the `FROM` list.
    #[must_use]
    pub fn from_table(mut self, table: &'a TableDescriptor) -> Self {
        self.sources.push(Source::Table(table));
        self
    }

    /// Adds a nested select to the `FROM` list.
    #[must_use]
    pub fn from_select(mut self, select: Select<'a>) -> Self {
        self.sources.push(Source::Select(Box::new(select)));
        self
    }

    /// Adds `<column> = ?`.
    #[must_use]
    pub fn filter(mut self, column: &str, value: impl ToSqlValue) -> Self {
        self.filters.push(Predicate::eq(column, value));
        self
    }

    /// Adds a raw predicate fragment with its parameters.
    #[must_use]
    pub fn filter_raw<I>(mut self, sql: &str, params: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToSqlValue,
    {
        self.filters.push(Predicate::raw(sql, params));
        self
    }

    /// Adds an `ORDER BY` column.
    #[must_use]
    pub fn order_by(mut self, column: &str, order: Order) -> Self {
        self.order_by.push((String::from(column), order));
        self
    }

    /// Sets `LIMIT`.
    #[must_use]
    pub const fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets `OFFSET`.
    #[must_use]
    pub const fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Sets the dialect used by [`Select::build`].
    #[must_use]
    pub const fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// The projected table, if set.
    #[must_use]
    pub const fn projected_table(&self) -> Option<&'a TableDescriptor> {
        self.table
    }

    /// Builds the statement for the configured dialect.
    ///
    /// # Errors
    ///
    /// Returns an error if a table is missing or a nested select has no
    /// usable alias.
    pub fn build(&self) -> Result<(String, Vec<SqlValue>)> {
        self.build_with(self.dialect)
    }

    fn alias_name(&self) -> Result<&str> {
        let table = self.table.ok_or(ShapeError::MissingTable)?;
        let alias = self.alias.as_deref().unwrap_or_else(|| table.remote_name());
        if alias.is_empty() {
            return Err(ShapeError::EmptyAlias);
        }
        Ok(alias)
    }
}

impl Statement for Select<'_> {
    fn build_with(&self, dialect: Dialect) -> Result<(String, Vec<SqlValue>)> {
        let table = require_table(self.table)?;
        let mut params = Vec::new();

        let projection = match &self.projection {
            Projection::Columns => super::column_list(dialect, table.fields()),
            Projection::Count => String::from("COUNT(*)"),
            Projection::Max(column) => format!("MAX({})", dialect.quote_identifier(column)),
        };

        let from = if self.sources.is_empty() {
            dialect.quote_identifier(table.remote_name())
        } else {
            let mut sources = Vec::with_capacity(self.sources.len());
            for source in &self.sources {
                match source {
                    Source::Table(t) => sources.push(dialect.quote_identifier(t.remote_name())),
                    Source::Select(sub) => {
                        let alias = sub.alias_name()?;
                        let (sql, sub_params) = sub.build_with(dialect)?;
                        params.extend(sub_params);
                        sources.push(format!("({sql}) AS {}", dialect.quote_identifier(alias)));
                    }
                }
            }
            sources.join(", ")
        };

        let mut sql = format!(
            "SELECT {}{projection} FROM {from}",
            if self.distinct { "DISTINCT " } else { "" }
        );

        let predicates = render_predicates(&self.filters, dialect, &mut params);
        if !predicates.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&predicates.join(" AND "));
        }

        if !self.order_by.is_empty() {
            let order: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, order)| {
                    format!("{} {}", dialect.quote_identifier(column), order.as_sql())
                })
                .collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        match (self.limit, self.offset) {
            (Some(limit), _) => sql.push_str(&format!(" LIMIT {limit}")),
            (None, Some(_)) => {
                if let Some(all) = dialect.unbounded_limit() {
                    sql.push_str(&format!(" LIMIT {all}"));
                }
            }
            (None, None) => {}
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        Ok((sql, params))
    }
}
