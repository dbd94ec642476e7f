//! Column and table-name extraction from freeform dataset descriptions.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

const TABLE_NAME_MAX: usize = 50;

fn create_table_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?[^\s(]+\s*\(")
            .expect("valid regex")
    })
}

/// Column names described by `schema`.
///
/// Strings are read as DDL (`CREATE TABLE name (...)`), lists are taken as
/// column names already, objects contribute their keys. Anything else is empty.
pub fn extract_columns(schema: &Value) -> Vec<String> {
    match schema {
        Value::String(s) => columns_from_ddl(s),
        Value::Array(items) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Object(o) => o.get("name").and_then(|n| n.as_str()).map(str::to_string),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Value::Object(o) => o.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

pub fn columns_from_ddl(ddl: &str) -> Vec<String> {
    let Some(m) = create_table_re().find(ddl) else {
        return Vec::new();
    };
    let body = balanced_body(&ddl[m.end()..]);

    split_top_level(body)
        .into_iter()
        .map(str::trim)
        .filter(|def| !def.is_empty())
        .filter(|def| !is_table_constraint(def))
        .filter_map(|def| def.split_whitespace().next())
        .map(|tok| {
            tok.trim_matches(|c| matches!(c, '"' | '`' | '\'' | '[' | ']'))
                .to_string()
        })
        .filter(|name| !name.is_empty())
        .collect()
}

/// `PRIMARY KEY (..)`, `FOREIGN KEY (..)`, `CONSTRAINT ..`, `UNIQUE (..)`, `CHECK (..)`.
fn is_table_constraint(def: &str) -> bool {
    let up = def.to_ascii_uppercase();
    let mut words = up.split(|c: char| c.is_whitespace() || c == '(');
    match words.next() {
        Some("CONSTRAINT" | "UNIQUE" | "CHECK") => true,
        Some("PRIMARY" | "FOREIGN") => words.find(|w| !w.is_empty()) == Some("KEY"),
        _ => false,
    }
}

// Text up to the parenthesis closing the one just consumed.
fn balanced_body(rest: &str) -> &str {
    let mut depth = 1usize;
    for (i, c) in rest.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return &rest[..i];
                }
            }
            _ => {}
        }
    }
    rest
}

fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in body.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

/// Stable table-name slug for a dataset title.
pub fn table_name(title: Option<&str>, subject: &str) -> String {
    let slug = slugify(title.unwrap_or(""));
    if slug.is_empty() {
        return format!("{}_data", subject.to_lowercase());
    }
    slug
}

fn slugify(s: &str) -> String {
    let lowered = s.to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace())
        .collect();
    kept.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .take(TABLE_NAME_MAX)
        .collect()
}
