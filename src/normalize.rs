//! Reconciles the two historical subject shapes into one list of case studies.

use crate::plan::{
    first_text, rows_to_csv, CaseStudy, DatasetDef, LegacySubject, Object, RawQuestion,
    SubjectContent, SubjectPrep,
};
use serde_json::Value;

const LEGACY_SQL_KEYS: &[&str] = &["data_creation_sql", "dataset_creation_sql"];
const LEGACY_COLUMN_KEYS: &[&str] = &["dataset_columns", "columns"];

/// Canonical case studies for one subject.
///
/// Structured subjects pass through unchanged. A legacy subject becomes
/// exactly one synthesized case study. Anything else is empty.
pub fn case_studies(subject: &SubjectPrep) -> Vec<CaseStudy> {
    match &subject.content {
        SubjectContent::CaseStudies(items) => items.clone(),
        SubjectContent::Legacy(legacy) => vec![from_legacy(&subject.name, &subject.fields, legacy)],
        SubjectContent::Empty => Vec::new(),
    }
}

fn from_legacy(name: &str, fields: &Object, legacy: &LegacySubject) -> CaseStudy {
    let mut cs = Object::new();

    let title = first_text(fields, &["header_text"]).unwrap_or_else(|| format!("{name} Case Study"));
    cs.insert("title".into(), Value::String(title));

    if let Some(overview) = first_text(fields, &["dataset_description", "business_context"]) {
        cs.insert("dataset_overview".into(), Value::String(overview));
    }
    for (from, to) in [
        ("business_context", "description"),
        ("problem_statement", "problem_statement"),
        ("difficulty", "difficulty"),
        ("estimated_time_minutes", "estimated_time_minutes"),
    ] {
        if let Some(v) = fields.get(from).filter(|v| !v.is_null()) {
            cs.insert(to.into(), v.clone());
        }
    }

    let creation_sql = first_text(fields, LEGACY_SQL_KEYS);
    let raw_columns = LEGACY_COLUMN_KEYS
        .iter()
        .find_map(|k| fields.get(*k).filter(|v| v.as_array().is_some_and(|a| !a.is_empty())));
    if let Some(sql) = &creation_sql {
        cs.insert("dataset_schema".into(), Value::String(sql.clone()));
        cs.insert("dataset_creation_sql".into(), Value::String(sql.clone()));
    } else if let Some(cols) = raw_columns {
        cs.insert("dataset_schema".into(), cols.clone());
    }
    if let Some(py) = first_text(fields, &["data_creation_python"]) {
        cs.insert("dataset_creation_python".into(), Value::String(py));
    }

    let sample = first_text(fields, &["dataset_csv_raw"]).or_else(|| {
        fields
            .get("dataset_rows")
            .and_then(|v| v.as_array())
            .and_then(|rows| rows_to_csv(rows))
    });
    if let Some(csv) = sample {
        cs.insert("sample_data".into(), Value::String(csv));
    }

    let mut case_study = CaseStudy::from_fields(cs);
    case_study.datasets = legacy
        .datasets
        .iter()
        .filter_map(DatasetDef::from_value)
        .collect();
    case_study.questions = legacy
        .questions_raw
        .iter()
        .map(RawQuestion::from_value)
        .collect();
    case_study
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn subject(name: &str, v: Value) -> SubjectPrep {
        SubjectPrep::parse(name, &v)
    }

    #[test]
    fn structured_case_studies_pass_through() {
        let s = subject(
            "SQL",
            json!({
                "case_studies": [
                    { "title": "Retail", "questions": [{ "question": "q1" }] },
                    { "title": "Churn", "questions": [] }
                ],
                "questions_raw": ["ignored"]
            }),
        );
        let out = case_studies(&s);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title.as_deref(), Some("Retail"));
        assert_eq!(out[0].questions.len(), 1);
        assert_eq!(out[1].title.as_deref(), Some("Churn"));
    }

    #[test]
    fn legacy_subject_becomes_one_case_study() {
        let s = subject(
            "Python",
            json!({
                "business_context": "A subscription business",
                "dataset_columns": ["user_id", "plan"],
                "dataset_rows": [{ "user_id": 1, "plan": "pro" }],
                "data_creation_python": "df = pd.DataFrame()",
                "questions_raw": [
                    { "prompt": "Count users per plan", "expected_answer": "groupby" },
                    "Plot signups by week"
                ],
                "datasets": [{ "name": "events", "sample_rows": [{ "ts": 1, "kind": "login" }] }]
            }),
        );
        let out = case_studies(&s);
        assert_eq!(out.len(), 1);
        let cs = &out[0];
        assert_eq!(cs.title.as_deref(), Some("Python Case Study"));
        assert_eq!(cs.dataset_overview.as_deref(), Some("A subscription business"));
        assert_eq!(cs.dataset_schema, Some(json!(["user_id", "plan"])));
        assert_eq!(cs.sample_data.as_deref(), Some("user_id,plan\n1,pro"));
        assert_eq!(cs.dataset_creation_python.as_deref(), Some("df = pd.DataFrame()"));
        assert_eq!(cs.datasets.len(), 1);
        assert_eq!(cs.datasets[0].columns, vec!["ts", "kind"]);
        assert_eq!(cs.questions.len(), 2);
        assert_eq!(cs.questions[0].text.as_deref(), Some("Count users per plan"));
        assert_eq!(cs.questions[0].expected_approach.as_deref(), Some("groupby"));
        assert_eq!(cs.questions[1].text.as_deref(), Some("Plot signups by week"));
    }

    #[test]
    fn legacy_sql_wins_over_column_list_and_csv_over_rows() {
        let s = subject(
            "SQL",
            json!({
                "header_text": "Orders Deep Dive",
                "dataset_description": "Orders placed in 2023",
                "business_context": "unused for overview",
                "data_creation_sql": "CREATE TABLE orders (id INT, total REAL);",
                "dataset_columns": ["ignored"],
                "dataset_csv_raw": "id,total\n1,9.5",
                "dataset_rows": [{ "id": 2 }],
                "questions_raw": [{ "question": "Total revenue?" }]
            }),
        );
        let cs = &case_studies(&s)[0];
        assert_eq!(cs.title.as_deref(), Some("Orders Deep Dive"));
        assert_eq!(cs.dataset_overview.as_deref(), Some("Orders placed in 2023"));
        assert_eq!(
            cs.dataset_schema,
            Some(json!("CREATE TABLE orders (id INT, total REAL);"))
        );
        assert_eq!(
            cs.dataset_creation_sql.as_deref(),
            Some("CREATE TABLE orders (id INT, total REAL);")
        );
        assert_eq!(cs.sample_data.as_deref(), Some("id,total\n1,9.5"));
    }

    #[test]
    fn subject_without_either_shape_is_empty() {
        let s = subject("Excel", json!({ "notes": "nothing to migrate" }));
        assert!(case_studies(&s).is_empty());
        let s = subject("Excel", json!({ "case_studies": [], "questions_raw": [] }));
        assert!(case_studies(&s).is_empty());
    }
}
