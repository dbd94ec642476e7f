//! Typed view over an AI-generated plan document.
//!
//! Plans arrive loosely structured. Shape sniffing happens here, once; the
//! rest of the crate works with [`SubjectContent`] and the canonical
//! [`CaseStudy`] / [`RawQuestion`] records.

use crate::schema;
use serde_json::{Map, Value};

pub type Object = Map<String, Value>;

pub const QUESTION_TEXT_KEYS: &[&str] = &["business_question", "question", "text", "prompt", "title"];
pub const EXPECTED_ANSWER_KEYS: &[&str] = &[
    "expected_approach",
    "hint",
    "answer",
    "answer_sql",
    "expected_answer",
];

/// Text of a JSON value when it carries something.
///
/// Strings are trimmed; numbers and bools render as text; non-empty
/// arrays and objects render as JSON. Null and blank values are `None`.
pub fn non_empty_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(a) if a.is_empty() => None,
        Value::Object(o) if o.is_empty() => None,
        other => serde_json::to_string(other).ok(),
    }
}

pub fn first_text(obj: &Object, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(non_empty_text))
}

fn text(obj: &Object, key: &str) -> Option<String> {
    obj.get(key).and_then(non_empty_text)
}

fn non_empty_array<'a>(obj: &'a Object, key: &str) -> Option<&'a Vec<Value>> {
    obj.get(key)
        .and_then(|v| v.as_array())
        .filter(|a| !a.is_empty())
}

fn int(obj: &Object, key: &str) -> Option<i64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => s
            .split_whitespace()
            .next()
            .and_then(|t| t.parse::<i64>().ok()),
        _ => None,
    }
}

/// Topics given either as a list or as a comma separated string.
pub fn topics(obj: &Object) -> Vec<String> {
    match obj.get("topics") {
        Some(Value::Array(items)) => items.iter().filter_map(non_empty_text).collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// A question in canonical form, whatever keys the generator used.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawQuestion {
    pub text: Option<String>,
    pub expected_approach: Option<String>,
    pub sample_output: Option<String>,
    pub sample_input: Option<String>,
    pub hint: Option<String>,
    pub difficulty: Option<String>,
    pub topics: Vec<String>,
    /// Original keys, consulted by the content field chains.
    pub fields: Object,
}

impl RawQuestion {
    pub fn from_value(v: &Value) -> Self {
        let fields = match v {
            Value::Object(o) => o.clone(),
            other => {
                let mut o = Object::new();
                if let Some(t) = non_empty_text(other) {
                    o.insert("question".into(), Value::String(t));
                }
                o
            }
        };
        Self::from_fields(fields)
    }

    pub fn from_fields(fields: Object) -> Self {
        RawQuestion {
            text: first_text(&fields, QUESTION_TEXT_KEYS),
            expected_approach: first_text(&fields, EXPECTED_ANSWER_KEYS),
            sample_output: text(&fields, "sample_output"),
            sample_input: text(&fields, "sample_input"),
            hint: text(&fields, "hint"),
            difficulty: text(&fields, "difficulty"),
            topics: topics(&fields),
            fields,
        }
    }
}

/// One dataset declared by a case study or a legacy subject.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetDef {
    pub name: Option<String>,
    pub description: Option<String>,
    pub columns: Vec<String>,
    pub schema: Option<Value>,
    pub creation_sql: Option<String>,
    pub creation_python: Option<String>,
    pub csv_data: Option<String>,
    pub record_count: Option<i64>,
}

impl DatasetDef {
    pub fn from_value(v: &Value) -> Option<Self> {
        let obj = v.as_object()?;
        let sample_rows = ["sample_rows", "rows", "sample_data", "data"]
            .iter()
            .find_map(|k| non_empty_array(obj, k));

        let declared = obj
            .get("columns")
            .map(schema::extract_columns)
            .unwrap_or_default();
        let columns = if !declared.is_empty() {
            declared
        } else if let Some(first) = sample_rows.and_then(|rows| rows.first()).and_then(|r| r.as_object()) {
            first.keys().cloned().collect()
        } else {
            ["schema", "dataset_schema", "creation_sql", "dataset_creation_sql"]
                .iter()
                .find_map(|k| {
                    let cols = obj.get(*k).map(schema::extract_columns).unwrap_or_default();
                    (!cols.is_empty()).then_some(cols)
                })
                .unwrap_or_default()
        };

        let csv_data = first_text(obj, &["csv_data", "csv", "dataset_csv_raw"])
            .or_else(|| {
                obj.get("sample_data")
                    .filter(|v| v.is_string())
                    .and_then(non_empty_text)
            })
            .or_else(|| sample_rows.and_then(|rows| rows_to_csv(rows)));

        Some(DatasetDef {
            name: first_text(obj, &["name", "title", "table_name"]),
            description: first_text(obj, &["description", "overview"]),
            columns,
            schema: ["schema", "dataset_schema"]
                .iter()
                .find_map(|k| obj.get(*k).filter(|v| non_empty_text(v).is_some()).cloned()),
            creation_sql: first_text(
                obj,
                &["creation_sql", "dataset_creation_sql", "data_creation_sql"],
            ),
            creation_python: first_text(obj, &["creation_python", "data_creation_python"]),
            csv_data,
            record_count: int(obj, "record_count").or_else(|| sample_rows.map(|r| r.len() as i64)),
        })
    }
}

/// Canonical case study.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaseStudy {
    pub title: Option<String>,
    pub description: Option<String>,
    pub dataset_overview: Option<String>,
    pub problem_statement: Option<String>,
    pub business_problem: Option<String>,
    pub solution_outline: Option<String>,
    pub dataset_schema: Option<Value>,
    pub dataset_creation_sql: Option<String>,
    pub dataset_creation_python: Option<String>,
    pub sample_data: Option<String>,
    pub datasets: Vec<DatasetDef>,
    pub questions: Vec<RawQuestion>,
    pub estimated_time_minutes: Option<i64>,
    pub difficulty: Option<String>,
    pub topics: Vec<String>,
    /// Original keys, consulted by the content field chains.
    pub fields: Object,
}

impl CaseStudy {
    pub fn from_value(v: &Value) -> Option<Self> {
        Some(Self::from_fields(v.as_object()?.clone()))
    }

    pub fn from_fields(fields: Object) -> Self {
        let sample_data = match fields.get("sample_data") {
            Some(Value::Array(rows)) => rows_to_csv(rows),
            Some(other) => non_empty_text(other),
            None => None,
        };
        CaseStudy {
            title: text(&fields, "title"),
            description: text(&fields, "description"),
            dataset_overview: text(&fields, "dataset_overview"),
            problem_statement: text(&fields, "problem_statement"),
            business_problem: text(&fields, "business_problem"),
            solution_outline: text(&fields, "solution_outline"),
            dataset_schema: fields
                .get("dataset_schema")
                .filter(|v| non_empty_text(v).is_some())
                .cloned(),
            dataset_creation_sql: first_text(&fields, &["dataset_creation_sql", "data_creation_sql"]),
            dataset_creation_python: first_text(
                &fields,
                &["dataset_creation_python", "data_creation_python"],
            ),
            sample_data,
            datasets: fields
                .get("datasets")
                .and_then(|v| v.as_array())
                .map(|a| a.iter().filter_map(DatasetDef::from_value).collect())
                .unwrap_or_default(),
            questions: fields
                .get("questions")
                .and_then(|v| v.as_array())
                .map(|a| a.iter().map(RawQuestion::from_value).collect())
                .unwrap_or_default(),
            estimated_time_minutes: int(&fields, "estimated_time_minutes"),
            difficulty: text(&fields, "difficulty"),
            topics: topics(&fields),
            fields,
        }
    }

    /// True when the case study describes a dataset of its own.
    pub fn has_inline_dataset(&self) -> bool {
        self.dataset_schema.is_some()
            || self.sample_data.is_some()
            || self.dataset_creation_sql.is_some()
    }
}

/// The flat form older plans used for a subject.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegacySubject {
    pub questions_raw: Vec<Value>,
    pub datasets: Vec<Value>,
}

/// How a subject's content is shaped.
#[derive(Debug, Clone, PartialEq)]
pub enum SubjectContent {
    CaseStudies(Vec<CaseStudy>),
    Legacy(LegacySubject),
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubjectPrep {
    pub name: String,
    /// Subject-level keys, the last link of every content field chain.
    pub fields: Object,
    pub content: SubjectContent,
}

impl SubjectPrep {
    pub fn parse(name: &str, v: &Value) -> Self {
        let fields = v.as_object().cloned().unwrap_or_default();

        let content = if let Some(items) = non_empty_array(&fields, "case_studies") {
            SubjectContent::CaseStudies(items.iter().filter_map(CaseStudy::from_value).collect())
        } else if let Some(items) = non_empty_array(&fields, "questions_raw") {
            SubjectContent::Legacy(LegacySubject {
                questions_raw: items.clone(),
                datasets: fields
                    .get("datasets")
                    .and_then(|v| v.as_array())
                    .cloned()
                    .unwrap_or_default(),
            })
        } else if let Some(single) = fields.get("questions_raw").and_then(non_empty_text) {
            SubjectContent::Legacy(LegacySubject {
                questions_raw: vec![Value::String(single)],
                datasets: Vec::new(),
            })
        } else {
            SubjectContent::Empty
        };

        SubjectPrep {
            name: name.to_string(),
            fields,
            content,
        }
    }

    /// The raw `case_studies` entries, ignoring any legacy form.
    pub fn structured_case_studies(&self) -> &[CaseStudy] {
        match &self.content {
            SubjectContent::CaseStudies(items) => items,
            _ => &[],
        }
    }
}

/// A plan document reduced to what the migration needs.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanContent {
    /// Subjects in document order.
    pub subjects: Vec<SubjectPrep>,
}

impl PlanContent {
    /// `None` when the document has no `subject_prep` map.
    pub fn from_value(v: &Value) -> Option<Self> {
        let prep = v.get("subject_prep")?.as_object()?;
        Some(PlanContent {
            subjects: prep
                .iter()
                .map(|(name, data)| SubjectPrep::parse(name, data))
                .collect(),
        })
    }
}

/// CSV text for a list of row objects, header taken from the first row.
pub fn rows_to_csv(rows: &[Value]) -> Option<String> {
    let header: Vec<String> = rows.first()?.as_object()?.keys().cloned().collect();
    if header.is_empty() {
        return None;
    }
    let mut out = String::new();
    out.push_str(
        &header
            .iter()
            .map(|h| csv_field(h))
            .collect::<Vec<_>>()
            .join(","),
    );
    for row in rows {
        let Some(obj) = row.as_object() else {
            continue;
        };
        let line = header
            .iter()
            .map(|h| match obj.get(h) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => csv_field(s),
                Some(other) => csv_field(&other.to_string()),
            })
            .collect::<Vec<_>>()
            .join(",");
        out.push('\n');
        out.push_str(&line);
    }
    Some(out)
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Data lines in CSV text, header excluded.
pub fn csv_record_count(csv: &str) -> i64 {
    let lines = csv.lines().filter(|l| !l.trim().is_empty()).count();
    lines.saturating_sub(1) as i64
}
