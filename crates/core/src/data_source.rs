use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataSourceError {
    #[error("{kind} `{name}` is not in the allow-list")]
    NotAllowed { kind: SourceKind, name: String },
    #[error("Please enter a SQL query!")]
    EmptyQuery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Table,
    View,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table => f.write_str("table"),
            Self::View => f.write_str("view"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    MySql,
    Sqlite,
}

impl SqlDialect {
    #[must_use]
    pub fn current_date_expr(self) -> &'static str {
        match self {
            Self::MySql => "CURDATE()",
            Self::Sqlite => "date('now')",
        }
    }

    #[must_use]
    pub fn limit_clause(self, limit: usize) -> String {
        match self {
            Self::MySql | Self::Sqlite => format!(" LIMIT {limit}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCap {
    Limit(usize),
    Unlimited,
}

/// A queryable object. Table and view names can only be obtained through an
/// [`AllowList`], so synthesized SQL never carries arbitrary text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSourceDescriptor {
    Table(AllowedName),
    View(AllowedName),
    RawQuery(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedName(String);

impl AllowedName {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AllowedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl DataSourceDescriptor {
    pub fn raw_query(text: impl Into<String>) -> Result<Self, DataSourceError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(DataSourceError::EmptyQuery);
        }
        Ok(Self::RawQuery(text))
    }

    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Table(name) | Self::View(name) => name.as_str(),
            Self::RawQuery(_) => "query",
        }
    }

    /// Raw queries pass through untouched and ignore `cap`.
    #[must_use]
    pub fn to_sql(&self, dialect: SqlDialect, cap: RowCap) -> String {
        match self {
            Self::Table(name) | Self::View(name) => select_all_sql(name, dialect, cap),
            Self::RawQuery(text) => text.clone(),
        }
    }
}

fn select_all_sql(name: &AllowedName, dialect: SqlDialect, cap: RowCap) -> String {
    match cap {
        RowCap::Limit(limit) => format!("SELECT * FROM {name}{}", dialect.limit_clause(limit)),
        RowCap::Unlimited => format!("SELECT * FROM {name}"),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AllowList {
    tables: Vec<String>,
    views: Vec<String>,
}

impl AllowList {
    #[must_use]
    pub fn new(tables: Vec<String>, views: Vec<String>) -> Self {
        Self { tables, views }
    }

    #[must_use]
    pub fn names(&self, kind: SourceKind) -> &[String] {
        match kind {
            SourceKind::Table => &self.tables,
            SourceKind::View => &self.views,
        }
    }

    pub fn table(&self, name: &str) -> Result<DataSourceDescriptor, DataSourceError> {
        self.resolve(SourceKind::Table, name)
    }

    pub fn view(&self, name: &str) -> Result<DataSourceDescriptor, DataSourceError> {
        self.resolve(SourceKind::View, name)
    }

    pub fn resolve(
        &self,
        kind: SourceKind,
        name: &str,
    ) -> Result<DataSourceDescriptor, DataSourceError> {
        let Some(allowed) = self.names(kind).iter().find(|allowed| *allowed == name) else {
            return Err(DataSourceError::NotAllowed {
                kind,
                name: name.to_string(),
            });
        };
        let allowed = AllowedName(allowed.clone());
        Ok(match kind {
            SourceKind::Table => DataSourceDescriptor::Table(allowed),
            SourceKind::View => DataSourceDescriptor::View(allowed),
        })
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
#[must_use]
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

#[cfg(test)]
mod tests {
    use super::{
        is_plain_identifier, AllowList, DataSourceDescriptor, DataSourceError, RowCap,
        SourceKind, SqlDialect,
    };
    use crate::config::Preset;

    fn food_allow_list() -> AllowList {
        let config = Preset::NamedInstance.config();
        AllowList::new(config.tables, config.views)
    }

    #[test]
    fn every_allow_listed_name_browses_with_the_row_cap() {
        let allow_list = food_allow_list();
        for kind in [SourceKind::Table, SourceKind::View] {
            for name in allow_list.names(kind) {
                let source = allow_list.resolve(kind, name).expect("allow-listed");
                for dialect in [SqlDialect::MySql, SqlDialect::Sqlite] {
                    assert_eq!(
                        source.to_sql(dialect, RowCap::Limit(50)),
                        format!("SELECT * FROM {name} LIMIT 50")
                    );
                }
            }
        }
    }

    #[test]
    fn unknown_names_are_rejected() {
        let allow_list = food_allow_list();
        let err = allow_list
            .table("CLAIMS; DROP TABLE CLAIMS")
            .expect_err("name outside the allow-list");
        assert_eq!(
            err,
            DataSourceError::NotAllowed {
                kind: SourceKind::Table,
                name: "CLAIMS; DROP TABLE CLAIMS".to_string()
            }
        );
        assert!(allow_list.view("CLAIMS").is_err(), "tables are not views");
    }

    #[test]
    fn raw_query_is_passed_through_and_ignores_cap() {
        let source = DataSourceDescriptor::raw_query("SELECT * FROM CLAIMS WHERE 1 = 1")
            .expect("non-empty query");
        assert_eq!(
            source.to_sql(SqlDialect::MySql, RowCap::Limit(50)),
            "SELECT * FROM CLAIMS WHERE 1 = 1"
        );
    }

    #[test]
    fn blank_raw_query_is_rejected() {
        assert_eq!(
            DataSourceDescriptor::raw_query("  \n\t"),
            Err(DataSourceError::EmptyQuery)
        );
    }

    #[test]
    fn unlimited_cap_drops_limit_clause() {
        let source = food_allow_list().view("Food_Claims").expect("allowed");
        assert_eq!(
            source.to_sql(SqlDialect::Sqlite, RowCap::Unlimited),
            "SELECT * FROM Food_Claims"
        );
    }

    #[test]
    fn identifier_check() {
        assert!(is_plain_identifier("Food_With_Provider"));
        assert!(is_plain_identifier("_x1"));
        assert!(!is_plain_identifier("1abc"));
        assert!(!is_plain_identifier(""));
        assert!(!is_plain_identifier("a b"));
        assert!(!is_plain_identifier("a;b"));
    }
}
