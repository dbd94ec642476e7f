//! Row-level persistence primitives used by the migration engine.
//!
//! The engine never writes SQL. It only inserts rows, selects rows by
//! equality / membership filters, and deletes rows by the same filters.

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

pub type Row = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown column {column} on {table}")]
    UnknownColumn { table: &'static str, column: String },
    #[error("refusing to delete from {0} without a filter")]
    UnfilteredDelete(&'static str),
    #[error("inserted row {id} not found in {table}")]
    MissingRow { table: &'static str, id: String },
    /// For `Store` implementations that refuse a write for their own reasons.
    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Text,
    Integer,
    Bool,
    Json,
}

#[derive(Debug, Clone, Copy)]
struct Column {
    name: &'static str,
    kind: ColumnKind,
}

const fn text(name: &'static str) -> Column {
    Column {
        name,
        kind: ColumnKind::Text,
    }
}

const fn int(name: &'static str) -> Column {
    Column {
        name,
        kind: ColumnKind::Integer,
    }
}

const fn flag(name: &'static str) -> Column {
    Column {
        name,
        kind: ColumnKind::Bool,
    }
}

const fn json(name: &'static str) -> Column {
    Column {
        name,
        kind: ColumnKind::Json,
    }
}

const PLAN_COLUMNS: &[Column] = &[
    text("id"),
    text("user_id"),
    text("profile_id"),
    text("jd_id"),
    json("content"),
    text("created_at"),
    text("updated_at"),
];

const EXERCISE_COLUMNS: &[Column] = &[
    text("id"),
    text("name"),
    text("description"),
    text("plan_id"),
    text("subject"),
    text("profile_id"),
    text("jd_id"),
    text("created_at"),
];

const DATASET_COLUMNS: &[Column] = &[
    text("id"),
    text("exercise_id"),
    text("name"),
    text("table_name"),
    json("columns"),
    json("schema_info"),
    text("creation_sql"),
    text("creation_python"),
    text("csv_data"),
    int("record_count"),
    text("subject_type"),
    text("created_at"),
];

const QUESTION_COLUMNS: &[Column] = &[
    text("id"),
    text("exercise_id"),
    text("dataset_id"),
    int("question_number"),
    text("text"),
    text("type"),
    text("language"),
    text("difficulty"),
    json("topics"),
    int("points"),
    json("content"),
    text("expected_output_table"),
    text("case_study_title"),
    text("created_at"),
];

const ANSWER_COLUMNS: &[Column] = &[
    text("id"),
    text("question_id"),
    text("answer_text"),
    flag("is_case_sensitive"),
    text("explanation"),
    text("created_at"),
];

const LINK_COLUMNS: &[Column] = &[
    text("id"),
    text("plan_id"),
    text("exercise_id"),
    text("question_id"),
    text("title"),
    text("description"),
    text("problem_statement"),
    text("business_problem"),
    text("case_study_context"),
    int("estimated_time_minutes"),
    text("difficulty"),
    json("topics"),
    text("created_at"),
];

/// The record sets the engine reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Plans,
    Exercises,
    Datasets,
    Questions,
    Answers,
    ProblemSolvingLinks,
}

impl Table {
    pub fn name(self) -> &'static str {
        match self {
            Table::Plans => "plans",
            Table::Exercises => "exercises",
            Table::Datasets => "datasets",
            Table::Questions => "questions",
            Table::Answers => "answers",
            Table::ProblemSolvingLinks => "problem_solving_links",
        }
    }

    fn columns(self) -> &'static [Column] {
        match self {
            Table::Plans => PLAN_COLUMNS,
            Table::Exercises => EXERCISE_COLUMNS,
            Table::Datasets => DATASET_COLUMNS,
            Table::Questions => QUESTION_COLUMNS,
            Table::Answers => ANSWER_COLUMNS,
            Table::ProblemSolvingLinks => LINK_COLUMNS,
        }
    }

    fn column(self, name: &str) -> Result<Column, StoreError> {
        self.columns()
            .iter()
            .copied()
            .find(|c| c.name == name)
            .ok_or_else(|| StoreError::UnknownColumn {
                table: self.name(),
                column: name.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(&'static str, Value),
    In(&'static str, Vec<Value>),
}

impl Filter {
    pub fn eq(column: &'static str, value: impl Into<Value>) -> Self {
        Filter::Eq(column, value.into())
    }

    pub fn any_of<I, V>(column: &'static str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::In(column, values.into_iter().map(Into::into).collect())
    }
}

/// Insert-returning-row, select-by-filter and delete-by-filter.
pub trait Store {
    fn insert(&self, table: Table, row: Row) -> Result<Row, StoreError>;
    fn select(&self, table: Table, filters: &[Filter]) -> Result<Vec<Row>, StoreError>;
    fn delete(&self, table: Table, filters: &[Filter]) -> Result<usize, StoreError>;
}

pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

fn to_sql(column: Column, value: &Value) -> Result<SqlValue, StoreError> {
    if value.is_null() {
        return Ok(SqlValue::Null);
    }
    Ok(match column.kind {
        ColumnKind::Text => match value {
            Value::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Text(other.to_string()),
        },
        ColumnKind::Integer => match value.as_i64() {
            Some(n) => SqlValue::Integer(n),
            None => match value.as_f64() {
                Some(f) => SqlValue::Integer(f.round() as i64),
                None => SqlValue::Null,
            },
        },
        ColumnKind::Bool => SqlValue::Integer(i64::from(value.as_bool().unwrap_or(false))),
        ColumnKind::Json => SqlValue::Text(serde_json::to_string(value)?),
    })
}

fn from_sql(column: Column, value: ValueRef<'_>) -> Result<Value, StoreError> {
    Ok(match (column.kind, value) {
        (_, ValueRef::Null) => Value::Null,
        (ColumnKind::Bool, ValueRef::Integer(n)) => Value::Bool(n != 0),
        (_, ValueRef::Integer(n)) => Value::from(n),
        (_, ValueRef::Real(f)) => Value::from(f),
        (ColumnKind::Json, ValueRef::Text(t)) => serde_json::from_slice(t)?,
        (_, ValueRef::Text(t)) => Value::String(String::from_utf8_lossy(t).into_owned()),
        (_, ValueRef::Blob(b)) => Value::String(String::from_utf8_lossy(b).into_owned()),
    })
}

fn where_clause(
    table: Table,
    filters: &[Filter],
) -> Result<(String, Vec<SqlValue>), StoreError> {
    let mut parts: Vec<String> = Vec::new();
    let mut binds: Vec<SqlValue> = Vec::new();
    for f in filters {
        match f {
            Filter::Eq(name, value) => {
                let col = table.column(name)?;
                if value.is_null() {
                    parts.push(format!("{} IS NULL", col.name));
                } else {
                    parts.push(format!("{} = ?", col.name));
                    binds.push(to_sql(col, value)?);
                }
            }
            Filter::In(name, values) => {
                let col = table.column(name)?;
                if values.is_empty() {
                    // Empty membership matches nothing.
                    parts.push("0".to_string());
                    continue;
                }
                let marks = vec!["?"; values.len()].join(", ");
                parts.push(format!("{} IN ({})", col.name, marks));
                for v in values {
                    binds.push(to_sql(col, v)?);
                }
            }
        }
    }
    if parts.is_empty() {
        return Ok((String::new(), binds));
    }
    Ok((format!(" WHERE {}", parts.join(" AND ")), binds))
}

impl Store for SqliteStore<'_> {
    fn insert(&self, table: Table, mut row: Row) -> Result<Row, StoreError> {
        let existing = row_str(&row, "id")
            .filter(|v| !v.is_empty())
            .map(str::to_string);
        let id = match existing {
            Some(v) => v,
            None => {
                let v = Uuid::new_v4().to_string();
                row.insert("id".into(), Value::String(v.clone()));
                v
            }
        };
        if table.column("created_at").is_ok() && !row.contains_key("created_at") {
            row.insert(
                "created_at".into(),
                Value::String(chrono::Utc::now().to_rfc3339()),
            );
        }

        let mut names: Vec<&'static str> = Vec::with_capacity(row.len());
        let mut binds: Vec<SqlValue> = Vec::with_capacity(row.len());
        for (key, value) in &row {
            let col = table.column(key)?;
            names.push(col.name);
            binds.push(to_sql(col, value)?);
        }
        let marks = vec!["?"; names.len()].join(", ");
        let sql = format!(
            "INSERT INTO {}({}) VALUES({})",
            table.name(),
            names.join(", "),
            marks
        );
        self.conn.execute(&sql, params_from_iter(binds))?;

        self.select(table, &[Filter::eq("id", id.clone())])?
            .into_iter()
            .next()
            .ok_or(StoreError::MissingRow {
                table: table.name(),
                id,
            })
    }

    fn select(&self, table: Table, filters: &[Filter]) -> Result<Vec<Row>, StoreError> {
        let cols = table.columns();
        let names: Vec<&str> = cols.iter().map(|c| c.name).collect();
        let (clause, binds) = where_clause(table, filters)?;
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY rowid",
            names.join(", "),
            table.name(),
            clause
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut out = Vec::new();
        while let Some(r) = rows.next()? {
            let mut row = Row::new();
            for (i, col) in cols.iter().enumerate() {
                row.insert(col.name.to_string(), from_sql(*col, r.get_ref(i)?)?);
            }
            out.push(row);
        }
        Ok(out)
    }

    fn delete(&self, table: Table, filters: &[Filter]) -> Result<usize, StoreError> {
        if filters.is_empty() {
            return Err(StoreError::UnfilteredDelete(table.name()));
        }
        let (clause, binds) = where_clause(table, filters)?;
        let sql = format!("DELETE FROM {}{}", table.name(), clause);
        Ok(self.conn.execute(&sql, params_from_iter(binds))?)
    }
}

/// Reads a string column from a returned row.
pub fn row_str<'r>(row: &'r Row, key: &str) -> Option<&'r str> {
    row.get(key).and_then(|v| v.as_str())
}
