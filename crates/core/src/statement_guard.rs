use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data_source::SqlDialect;

/// What the playground lets through. `Unrestricted` is the read-only
/// deployment assumption: the database account is expected to be read-only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlaygroundPolicy {
    #[default]
    Unrestricted,
    ReadOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatementRejection {
    #[error("statement rejected: only one statement may run at a time")]
    MultipleStatements,
    #[error("statement rejected: write operation `{0}`")]
    Write(String),
    #[error("statement rejected: schema change `{0}`")]
    SchemaChange(String),
    #[error("statement rejected: transaction or session control `{0}`")]
    Control(String),
    #[error("statement rejected: `{0}` is not a read statement")]
    Unrecognized(String),
    #[error("statement rejected: no statement found")]
    Empty,
}

impl PlaygroundPolicy {
    pub fn check(self, sql: &str, dialect: SqlDialect) -> Result<(), StatementRejection> {
        match self {
            Self::Unrestricted => Ok(()),
            Self::ReadOnly => check_read_only(sql, dialect),
        }
    }
}

/// Admits one read statement, lexed the way `dialect` reads it.
pub fn check_read_only(sql: &str, dialect: SqlDialect) -> Result<(), StatementRejection> {
    Lexing::readings(dialect, sql)
        .into_iter()
        .try_for_each(|lexing| check_reading(sql, lexing))
}

fn check_reading(sql: &str, lexing: Lexing) -> Result<(), StatementRejection> {
    let statements = split_statements(sql, lexing);
    let statement = match statements.as_slice() {
        [] => return Err(StatementRejection::Empty),
        [single] => single,
        _ => return Err(StatementRejection::MultipleStatements),
    };

    let keyword = first_keyword(statement).ok_or(StatementRejection::Empty)?;
    if !is_read_keyword(&keyword) {
        return Err(classify_rejection(keyword));
    }

    let words = top_level_words(statement, lexing);
    if let Some(target) = words
        .iter()
        .find(|word| matches!(word.as_str(), "OUTFILE" | "DUMPFILE"))
    {
        return Err(StatementRejection::Write(format!("INTO {target}")));
    }

    match keyword.as_str() {
        // The statement after the CTE list is what runs.
        "WITH" => match main_verb(&words) {
            Some("SELECT") => Ok(()),
            Some(verb) => Err(classify_rejection(verb.to_string())),
            None => Err(StatementRejection::Unrecognized("WITH".to_string())),
        },
        // EXPLAIN ANALYZE executes its statement.
        "EXPLAIN" | "DESCRIBE" | "DESC" => match main_verb(&words) {
            None | Some("SELECT" | "TABLE" | "VALUES") => Ok(()),
            Some(verb) => Err(classify_rejection(verb.to_string())),
        },
        _ => Ok(()),
    }
}

fn classify_rejection(keyword: String) -> StatementRejection {
    match keyword.as_str() {
        "INSERT" | "UPDATE" | "DELETE" | "REPLACE" | "MERGE" | "UPSERT" | "LOAD" | "CALL"
        | "EXEC" | "EXECUTE" | "DO" => StatementRejection::Write(keyword),
        "CREATE" | "ALTER" | "DROP" | "TRUNCATE" | "RENAME" | "VACUUM" | "REINDEX"
        | "ANALYZE" | "OPTIMIZE" | "REPAIR" => StatementRejection::SchemaChange(keyword),
        "BEGIN" | "START" | "COMMIT" | "ROLLBACK" | "SAVEPOINT" | "RELEASE" | "LOCK"
        | "UNLOCK" | "SET" | "GRANT" | "REVOKE" | "ATTACH" | "DETACH" | "PRAGMA" | "USE" => {
            StatementRejection::Control(keyword)
        }
        _ => StatementRejection::Unrecognized(keyword),
    }
}

fn is_read_keyword(keyword: &str) -> bool {
    matches!(
        keyword,
        "SELECT" | "WITH" | "EXPLAIN" | "SHOW" | "DESCRIBE" | "DESC"
    )
}

/// First top-level verb after the leading keyword.
fn main_verb(words: &[String]) -> Option<&str> {
    words.iter().skip(1).map(String::as_str).find(|word| {
        matches!(
            *word,
            "SELECT" | "INSERT" | "UPDATE" | "DELETE" | "REPLACE" | "MERGE" | "TABLE" | "VALUES"
        )
    })
}

/// Lexical rules that decide where quotes, comments and statements end.
#[derive(Debug, Clone, Copy)]
#[allow(clippy::struct_excessive_bools)]
struct Lexing {
    backslash_escapes: bool,
    dash_comment_needs_space: bool,
    hash_comments: bool,
    executable_comments: bool,
    bracket_identifiers: bool,
}

impl Lexing {
    /// MySQL drops backslash escapes under `NO_BACKSLASH_ESCAPES`, so text
    /// with a backslash must pass under both readings.
    fn readings(dialect: SqlDialect, sql: &str) -> Vec<Self> {
        match dialect {
            SqlDialect::Sqlite => vec![Self {
                backslash_escapes: false,
                dash_comment_needs_space: false,
                hash_comments: false,
                executable_comments: false,
                bracket_identifiers: true,
            }],
            SqlDialect::MySql => {
                let escaped = Self {
                    backslash_escapes: true,
                    dash_comment_needs_space: true,
                    hash_comments: true,
                    executable_comments: true,
                    bracket_identifiers: false,
                };
                if sql.contains('\\') {
                    vec![
                        escaped,
                        Self {
                            backslash_escapes: false,
                            ..escaped
                        },
                    ]
                } else {
                    vec![escaped]
                }
            }
        }
    }

    fn closing_quote(self, ch: char) -> Option<char> {
        match ch {
            '\'' | '"' | '`' => Some(ch),
            '[' if self.bracket_identifiers => Some(']'),
            _ => None,
        }
    }

    /// MySQL only reads `--` as a comment when whitespace follows it.
    fn starts_dash_comment(self, after: Option<char>) -> bool {
        !self.dash_comment_needs_space
            || after.map_or(true, |ch| ch.is_whitespace() || ch.is_control())
    }
}

/// Index one past the quote that closes the one at `open_at`.
fn quoted_end(chars: &[char], open_at: usize, close: char, lexing: Lexing) -> usize {
    let escapes = lexing.backslash_escapes && chars[open_at] != '`';
    let mut index = open_at + 1;
    while index < chars.len() {
        let ch = chars[index];
        if escapes && ch == '\\' {
            index += 2;
            continue;
        }
        index += 1;
        if ch == close {
            return index;
        }
    }
    chars.len()
}

fn line_end(chars: &[char], from: usize) -> usize {
    chars[from..]
        .iter()
        .position(|ch| *ch == '\n')
        .map_or(chars.len(), |offset| from + offset)
}

fn block_comment_end(chars: &[char], from: usize) -> usize {
    chars[from..]
        .windows(2)
        .position(|pair| pair == ['*', '/'])
        .map_or(chars.len(), |offset| from + offset + 2)
}

fn push_statement(statements: &mut Vec<String>, current: &str) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
}

/// Splits on `;` outside quotes, dropping comments. MySQL `/*! ... */`
/// bodies are executed by the server, so they are kept as code.
fn split_statements(sql: &str, lexing: Lexing) -> Vec<String> {
    let chars = sql.chars().collect::<Vec<_>>();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];
        let next = chars.get(index + 1).copied();

        if let Some(close) = lexing.closing_quote(ch) {
            let end = quoted_end(&chars, index, close, lexing);
            current.extend(&chars[index..end]);
            index = end;
            continue;
        }

        match (ch, next) {
            ('-', Some('-')) if lexing.starts_dash_comment(chars.get(index + 2).copied()) => {
                index = line_end(&chars, index);
                current.push(' ');
            }
            ('#', _) if lexing.hash_comments => {
                index = line_end(&chars, index);
                current.push(' ');
            }
            ('/', Some('*')) if lexing.executable_comments && chars.get(index + 2) == Some(&'!') => {
                index += 3;
                current.push(' ');
            }
            ('/', Some('*')) => {
                index = block_comment_end(&chars, index + 2);
                current.push(' ');
            }
            (';', _) => {
                push_statement(&mut statements, &current);
                current.clear();
                index += 1;
            }
            _ => {
                current.push(ch);
                index += 1;
            }
        }
    }

    push_statement(&mut statements, &current);
    statements
}

fn first_keyword(statement: &str) -> Option<String> {
    statement
        .split(|ch: char| ch.is_whitespace() || ch == '(')
        .find(|token| !token.is_empty())
        .map(str::to_ascii_uppercase)
}

/// Upper-cased bare words outside quotes and parentheses.
fn top_level_words(statement: &str, lexing: Lexing) -> Vec<String> {
    let chars = statement.chars().collect::<Vec<_>>();
    let mut words = Vec::new();
    let mut word = String::new();
    let mut depth = 0_usize;
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];
        if let Some(close) = lexing.closing_quote(ch) {
            flush_word(&mut words, &mut word);
            index = quoted_end(&chars, index, close, lexing);
            continue;
        }
        index += 1;

        if ch.is_alphanumeric() || ch == '_' || ch == '$' {
            if depth == 0 {
                word.push(ch.to_ascii_uppercase());
            }
            continue;
        }
        flush_word(&mut words, &mut word);
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    flush_word(&mut words, &mut word);
    words
}

fn flush_word(words: &mut Vec<String>, word: &mut String) {
    if !word.is_empty() {
        words.push(std::mem::take(word));
    }
}
