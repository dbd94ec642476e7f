//! Plan migration: normalizes a stored plan document into exercises,
//! datasets, questions and answers.
//!
//! Subjects are processed in document order. A failure inside one subject is
//! recorded and the run moves on; only a missing plan or a plan without
//! `subject_prep` stops the run, and both are detected before any write.

use crate::error::MigrateError;
use crate::normalize;
use crate::plan::{csv_record_count, CaseStudy, DatasetDef, Object, PlanContent, RawQuestion, SubjectPrep};
use crate::problem_solving;
use crate::projector::{classify, project_answer, project_question, to_row, QuestionContext};
use crate::schema::{extract_columns, table_name};
use crate::store::{row_str, Filter, Store, Table};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRequest {
    pub plan_id: String,
    pub user_id: String,
    #[serde(default)]
    pub profile_id: Option<String>,
    #[serde(default)]
    pub jd_id: Option<String>,
    #[serde(default)]
    pub overwrite_existing: bool,
}

/// Counts, warnings and errors collected over one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationResult {
    pub plan_id: String,
    pub exercises_created: usize,
    pub questions_created: usize,
    pub datasets_created: usize,
    pub answers_created: usize,
    pub links_created: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl MigrationResult {
    pub fn new(plan_id: &str) -> Self {
        MigrationResult {
            plan_id: plan_id.to_string(),
            ..Default::default()
        }
    }

    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn warn(&mut self, message: String) {
        warn!(plan_id = %self.plan_id, "{}", message);
        self.warnings.push(message);
    }

    pub fn error(&mut self, message: String) {
        error!(plan_id = %self.plan_id, "{}", message);
        self.errors.push(message);
    }

    pub fn to_json(&self) -> Value {
        let mut v = json!(self);
        v["success"] = Value::Bool(self.success());
        v
    }
}

pub fn exercise_name(subject: &str, plan_id: &str) -> String {
    format!("{} - Plan {}", subject, plan_id)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetRecord {
    pub exercise_id: String,
    pub name: String,
    pub table_name: String,
    pub columns: Vec<String>,
    pub schema_info: Value,
    pub creation_sql: Option<String>,
    pub creation_python: Option<String>,
    pub csv_data: Option<String>,
    pub record_count: i64,
    pub subject_type: String,
}

/// Dataset described inline by the case study's own schema / sample fields.
pub fn inline_dataset(subject: &str, cs: &CaseStudy, exercise_id: &str) -> DatasetRecord {
    let mut columns = cs
        .dataset_schema
        .as_ref()
        .map(extract_columns)
        .unwrap_or_default();
    if columns.is_empty() {
        if let Some(sql) = &cs.dataset_creation_sql {
            columns = extract_columns(&Value::String(sql.clone()));
        }
    }
    let creation_sql = cs.dataset_creation_sql.clone().or_else(|| {
        cs.dataset_schema
            .as_ref()
            .and_then(|v| v.as_str())
            .filter(|s| s.to_ascii_uppercase().contains("CREATE TABLE"))
            .map(str::to_string)
    });

    DatasetRecord {
        exercise_id: exercise_id.to_string(),
        name: cs
            .title
            .clone()
            .unwrap_or_else(|| format!("{} Dataset", subject)),
        table_name: table_name(cs.title.as_deref(), subject),
        columns,
        schema_info: json!({
            "schema": cs.dataset_schema,
            "overview": cs.dataset_overview,
        }),
        creation_sql,
        creation_python: cs.dataset_creation_python.clone(),
        record_count: cs.sample_data.as_deref().map(csv_record_count).unwrap_or(0),
        csv_data: cs.sample_data.clone(),
        subject_type: classify(subject).question_type.to_string(),
    }
}

/// Dataset declared in a case study's `datasets[]`; `index` is its position there.
pub fn declared_dataset(
    subject: &str,
    cs: &CaseStudy,
    def: &DatasetDef,
    index: usize,
    exercise_id: &str,
) -> DatasetRecord {
    let name = def.name.clone().unwrap_or_else(|| {
        let base = cs.title.clone().unwrap_or_else(|| format!("{} Dataset", subject));
        format!("{} {}", base, index + 1)
    });
    let columns = if def.columns.is_empty() {
        def.creation_sql
            .as_ref()
            .map(|sql| extract_columns(&Value::String(sql.clone())))
            .unwrap_or_default()
    } else {
        def.columns.clone()
    };

    DatasetRecord {
        exercise_id: exercise_id.to_string(),
        table_name: table_name(Some(&name), subject),
        name,
        columns,
        schema_info: json!({
            "schema": def.schema,
            "description": def.description,
        }),
        creation_sql: def.creation_sql.clone(),
        creation_python: def.creation_python.clone(),
        record_count: def
            .record_count
            .or_else(|| def.csv_data.as_deref().map(csv_record_count))
            .unwrap_or(0),
        csv_data: def.csv_data.clone(),
        subject_type: classify(subject).question_type.to_string(),
    }
}

/// Questions a case study contributes, in order.
///
/// A "Problem Solving" case study without questions contributes one question
/// built from its problem statement.
pub fn case_study_questions(subject: &str, cs: &CaseStudy) -> Vec<RawQuestion> {
    if !cs.questions.is_empty() {
        return cs.questions.clone();
    }
    if !subject.trim().eq_ignore_ascii_case("problem solving") {
        return Vec::new();
    }
    let Some(statement) = cs.problem_statement.as_ref() else {
        return Vec::new();
    };
    let mut fields = Object::new();
    fields.insert("business_question".into(), json!(statement));
    fields.insert("question".into(), json!(statement));
    fields.insert(
        "expected_approach".into(),
        json!(cs.solution_outline.clone().unwrap_or_default()),
    );
    fields.insert("difficulty".into(), json!("Medium"));
    fields.insert("topics".into(), json!(["Problem Solving"]));
    vec![RawQuestion::from_fields(fields)]
}

pub fn migrate_plan(store: &dyn Store, req: &MigrationRequest) -> MigrationResult {
    let mut result = MigrationResult::new(&req.plan_id);

    let plan = match load_plan(store, req) {
        Ok(p) => p,
        Err(e) => {
            result.error(e.to_string());
            return result;
        }
    };
    info!(
        plan_id = %req.plan_id,
        subjects = plan.subjects.len(),
        overwrite = req.overwrite_existing,
        "migrating plan"
    );

    for subject in &plan.subjects {
        if let Err(e) = migrate_subject(store, req, subject, &mut result) {
            result.error(format!("Failed to process subject {}: {}", subject.name, e));
        }
    }

    problem_solving::persist(store, req, &plan, &mut result);

    info!(
        plan_id = %req.plan_id,
        exercises = result.exercises_created,
        questions = result.questions_created,
        datasets = result.datasets_created,
        answers = result.answers_created,
        errors = result.errors.len(),
        warnings = result.warnings.len(),
        "plan migration finished"
    );
    result
}

fn load_plan(store: &dyn Store, req: &MigrationRequest) -> Result<PlanContent, MigrateError> {
    let not_found = || MigrateError::PlanNotFound {
        plan_id: req.plan_id.clone(),
        user_id: req.user_id.clone(),
    };
    let rows = store.select(
        Table::Plans,
        &[
            Filter::eq("id", req.plan_id.clone()),
            Filter::eq("user_id", req.user_id.clone()),
        ],
    )?;
    let row = rows.into_iter().next().ok_or_else(not_found)?;
    if let Some(profile_id) = req.profile_id.as_deref() {
        if row_str(&row, "profile_id") != Some(profile_id) {
            return Err(not_found());
        }
    }

    let content = match row.get("content") {
        // Some writers store the document double-encoded.
        Some(Value::String(s)) => serde_json::from_str(s)?,
        Some(v) => v.clone(),
        None => Value::Null,
    };
    PlanContent::from_value(&content)
        .ok_or_else(|| MigrateError::MissingSubjectPrep(req.plan_id.clone()))
}

fn migrate_subject(
    store: &dyn Store,
    req: &MigrationRequest,
    subject: &SubjectPrep,
    result: &mut MigrationResult,
) -> Result<(), MigrateError> {
    let case_studies = normalize::case_studies(subject);
    if case_studies.is_empty() {
        result.warn(format!(
            "No case studies or questions found for subject {}",
            subject.name
        ));
        return Ok(());
    }

    let name = exercise_name(&subject.name, &req.plan_id);
    let existing = store.select(Table::Exercises, &[Filter::eq("name", name.clone())])?;
    if !existing.is_empty() {
        if !req.overwrite_existing {
            result.warn(format!(
                "Exercise '{}' already exists for subject {}; skipped",
                name, subject.name
            ));
            return Ok(());
        }
        let ids: Vec<String> = existing
            .iter()
            .filter_map(|r| row_str(r, "id").map(str::to_string))
            .collect();
        let cascade = collect_cascade(store, &ids)?;
        delete_cascade(store, &cascade)?;
        info!(
            subject = %subject.name,
            exercises = cascade.exercise_ids.len(),
            questions = cascade.question_ids.len(),
            "removed previous exercise set"
        );
    }

    let exercise = store.insert(
        Table::Exercises,
        to_row(&json!({
            "name": name,
            "description": format!("Interview preparation exercises for {}", subject.name),
            "plan_id": req.plan_id,
            "subject": subject.name,
            "profile_id": req.profile_id,
            "jd_id": req.jd_id,
        }))?,
    )?;
    result.exercises_created += 1;
    let exercise_id = row_str(&exercise, "id").unwrap_or_default().to_string();
    info!(
        subject = %subject.name,
        exercise_id = %exercise_id,
        case_studies = case_studies.len(),
        "exercise created"
    );

    let mut next_number = 1;
    for cs in &case_studies {
        next_number = migrate_case_study(store, subject, cs, &exercise_id, next_number, result);
    }
    Ok(())
}

/// Everything an overwrite has to remove, gathered before deleting anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cascade {
    pub exercise_ids: Vec<String>,
    pub question_ids: Vec<String>,
}

pub fn collect_cascade(store: &dyn Store, exercise_ids: &[String]) -> Result<Cascade, MigrateError> {
    let questions = store.select(
        Table::Questions,
        &[Filter::any_of("exercise_id", exercise_ids.iter().cloned())],
    )?;
    Ok(Cascade {
        exercise_ids: exercise_ids.to_vec(),
        question_ids: questions
            .iter()
            .filter_map(|r| row_str(r, "id").map(str::to_string))
            .collect(),
    })
}

/// Deletes answers, questions, datasets, then exercises. Stops at the first failure.
pub fn delete_cascade(store: &dyn Store, cascade: &Cascade) -> Result<(), MigrateError> {
    let question_ids = || cascade.question_ids.iter().cloned();
    let exercise_ids = || cascade.exercise_ids.iter().cloned();
    store.delete(Table::Answers, &[Filter::any_of("question_id", question_ids())])?;
    store.delete(Table::Questions, &[Filter::any_of("id", question_ids())])?;
    store.delete(Table::Datasets, &[Filter::any_of("exercise_id", exercise_ids())])?;
    store.delete(Table::Exercises, &[Filter::any_of("id", exercise_ids())])?;
    Ok(())
}

/// Creates one case study's datasets, questions and answers.
///
/// `first_number` is the question number the case study starts at; the
/// returned value is where the next case study starts, advanced by the full
/// question count whether or not every insert succeeded.
pub fn migrate_case_study(
    store: &dyn Store,
    subject: &SubjectPrep,
    cs: &CaseStudy,
    exercise_id: &str,
    first_number: i64,
    result: &mut MigrationResult,
) -> i64 {
    let dataset_id = create_datasets(store, &subject.name, cs, exercise_id, result);

    let questions = case_study_questions(&subject.name, cs);
    for (offset, question) in questions.iter().enumerate() {
        let number = first_number + offset as i64;
        let ctx = QuestionContext {
            subject: &subject.name,
            subject_fields: &subject.fields,
            case_study: cs,
            exercise_id,
            dataset_id: dataset_id.as_deref(),
            question_number: number,
        };
        let record = project_question(question, &ctx);
        let inserted = to_row(&record)
            .map_err(MigrateError::from)
            .and_then(|row| store.insert(Table::Questions, row).map_err(MigrateError::from));
        let row = match inserted {
            Ok(row) => row,
            Err(e) => {
                result.error(format!(
                    "Failed to create question {} for subject {}: {}",
                    number, subject.name, e
                ));
                continue;
            }
        };
        result.questions_created += 1;

        let question_id = row_str(&row, "id").unwrap_or_default();
        let Some(answer) = project_answer(question, question_id) else {
            continue;
        };
        let inserted = to_row(&answer)
            .map_err(MigrateError::from)
            .and_then(|row| store.insert(Table::Answers, row).map_err(MigrateError::from));
        match inserted {
            Ok(_) => result.answers_created += 1,
            Err(e) => result.error(format!(
                "Failed to create answer for question {} of subject {}: {}",
                number, subject.name, e
            )),
        }
    }
    debug!(subject = %subject.name, first_number, questions = questions.len(), "case study processed");

    first_number + questions.len() as i64
}

/// Inserts the case study's datasets; returns the id of the first one created.
fn create_datasets(
    store: &dyn Store,
    subject: &str,
    cs: &CaseStudy,
    exercise_id: &str,
    result: &mut MigrationResult,
) -> Option<String> {
    let mut records = Vec::new();
    if cs.has_inline_dataset() {
        records.push(inline_dataset(subject, cs, exercise_id));
    }
    for (i, def) in cs.datasets.iter().enumerate() {
        records.push(declared_dataset(subject, cs, def, i, exercise_id));
    }

    let mut primary: Option<String> = None;
    for record in records {
        let inserted = to_row(&record)
            .map_err(MigrateError::from)
            .and_then(|row| store.insert(Table::Datasets, row).map_err(MigrateError::from));
        match inserted {
            Ok(row) => {
                result.datasets_created += 1;
                if primary.is_none() {
                    primary = row_str(&row, "id").map(str::to_string);
                }
            }
            Err(e) => result.error(format!(
                "Failed to create dataset {} for subject {}: {}",
                record.name, subject, e
            )),
        }
    }
    primary
}
