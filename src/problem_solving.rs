//! Plan-scoped problem-solving set: one question per case study, each
//! cross-referenced from `problem_solving_links`.
//!
//! Unlike the per-subject pass this always replaces the previous set.

use crate::error::MigrateError;
use crate::migrate::{MigrationRequest, MigrationResult};
use crate::plan::{first_text, CaseStudy, Object, PlanContent, RawQuestion, SubjectPrep};
use crate::projector::{normalize_difficulty, project_question, to_row, QuestionContext};
use crate::store::{row_str, Filter, Store, Table};
use serde_json::{json, Value};
use tracing::info;

const SUBJECT_MARKERS: &[&str] = &["problem solving", "art of problem solving", "aops"];
const SUBJECT: &str = "Problem Solving";
pub const PLACEHOLDER_TEXT: &str = "Solve the problem-solving case study";

pub fn exercise_name(plan_id: &str) -> String {
    format!("Problem Solving Case Studies - Plan {}", plan_id)
}

pub fn find_subject(plan: &PlanContent) -> Option<&SubjectPrep> {
    plan.subjects.iter().find(|s| {
        let name = s.name.to_lowercase();
        SUBJECT_MARKERS.iter().any(|m| name.contains(m))
    })
}

/// Question text for a case study: statement, title, business problem, placeholder.
pub fn question_text(cs: &CaseStudy) -> String {
    cs.problem_statement
        .clone()
        .or_else(|| cs.title.clone())
        .or_else(|| cs.business_problem.clone())
        .unwrap_or_else(|| PLACEHOLDER_TEXT.to_string())
}

pub fn persist(
    store: &dyn Store,
    req: &MigrationRequest,
    plan: &PlanContent,
    result: &mut MigrationResult,
) {
    let Some(subject) = find_subject(plan) else {
        return;
    };
    let case_studies = subject.structured_case_studies();
    if case_studies.is_empty() {
        return;
    }
    if let Err(e) = persist_case_studies(store, req, subject, case_studies, result) {
        result.error(format!(
            "Failed to persist problem-solving case studies: {}",
            e
        ));
    }
}

fn persist_case_studies(
    store: &dyn Store,
    req: &MigrationRequest,
    subject: &SubjectPrep,
    case_studies: &[CaseStudy],
    result: &mut MigrationResult,
) -> Result<(), MigrateError> {
    let exercise_id = find_or_create_exercise(store, req, result)?;
    let removed = clear_previous(store, &req.plan_id, &exercise_id)?;
    info!(
        plan_id = %req.plan_id,
        exercise_id = %exercise_id,
        removed,
        case_studies = case_studies.len(),
        "persisting problem-solving case studies"
    );

    for (i, cs) in case_studies.iter().enumerate() {
        let number = i as i64 + 1;
        let text = question_text(cs);

        let mut fields = Object::new();
        fields.insert("question".into(), Value::String(text.clone()));
        if let Some(d) = &cs.difficulty {
            fields.insert("difficulty".into(), Value::String(d.clone()));
        }
        if !cs.topics.is_empty() {
            fields.insert("topics".into(), json!(cs.topics));
        }
        let question = RawQuestion::from_fields(fields);
        let ctx = QuestionContext {
            subject: SUBJECT,
            subject_fields: &subject.fields,
            case_study: cs,
            exercise_id: &exercise_id,
            dataset_id: None,
            question_number: number,
        };
        let record = project_question(&question, &ctx);
        let topics = record.topics.clone();

        let inserted = to_row(&record)
            .map_err(MigrateError::from)
            .and_then(|row| store.insert(Table::Questions, row).map_err(MigrateError::from));
        let row = match inserted {
            Ok(row) => row,
            Err(e) => {
                result.error(format!(
                    "Failed to create problem-solving question {}: {}",
                    number, e
                ));
                continue;
            }
        };
        result.questions_created += 1;

        let link = json!({
            "plan_id": req.plan_id,
            "exercise_id": exercise_id,
            "question_id": row_str(&row, "id"),
            "title": cs.title,
            "description": cs.description,
            "problem_statement": cs.problem_statement,
            "business_problem": cs.business_problem,
            "case_study_context": first_text(
                &cs.fields,
                &["case_study_context", "context", "dataset_overview"],
            ),
            "estimated_time_minutes": cs.estimated_time_minutes,
            "difficulty": normalize_difficulty(cs.difficulty.as_deref()).as_str(),
            "topics": topics,
        });
        let inserted = to_row(&link)
            .map_err(MigrateError::from)
            .and_then(|row| {
                store
                    .insert(Table::ProblemSolvingLinks, row)
                    .map_err(MigrateError::from)
            });
        match inserted {
            Ok(_) => result.links_created += 1,
            Err(e) => result.error(format!(
                "Failed to link problem-solving question {}: {}",
                number, e
            )),
        }
    }
    Ok(())
}

/// Removes the plan's previous link rows, the questions they point at, and
/// any question left in the exercise without a link. Returns how many link
/// rows were removed.
fn clear_previous(
    store: &dyn Store,
    plan_id: &str,
    exercise_id: &str,
) -> Result<usize, MigrateError> {
    let links = store.select(
        Table::ProblemSolvingLinks,
        &[Filter::eq("plan_id", plan_id)],
    )?;
    let unlinked = store.select(Table::Questions, &[Filter::eq("exercise_id", exercise_id)])?;

    let mut question_ids: Vec<String> = links
        .iter()
        .filter_map(|r| row_str(r, "question_id").map(str::to_string))
        .collect();
    for id in unlinked.iter().filter_map(|r| row_str(r, "id")) {
        if !question_ids.iter().any(|q| q == id) {
            question_ids.push(id.to_string());
        }
    }
    if links.is_empty() && question_ids.is_empty() {
        return Ok(0);
    }

    // Links reference questions, so they go first.
    let removed = store.delete(
        Table::ProblemSolvingLinks,
        &[Filter::eq("plan_id", plan_id)],
    )?;
    store.delete(
        Table::Answers,
        &[Filter::any_of("question_id", question_ids.iter().cloned())],
    )?;
    store.delete(
        Table::Questions,
        &[Filter::any_of("id", question_ids.iter().cloned())],
    )?;
    Ok(removed)
}

fn find_or_create_exercise(
    store: &dyn Store,
    req: &MigrationRequest,
    result: &mut MigrationResult,
) -> Result<String, MigrateError> {
    let name = exercise_name(&req.plan_id);
    let existing = store.select(Table::Exercises, &[Filter::eq("name", name.clone())])?;
    if let Some(id) = existing.first().and_then(|r| row_str(r, "id")) {
        return Ok(id.to_string());
    }

    let row = store.insert(
        Table::Exercises,
        to_row(&json!({
            "name": name,
            "description": "Problem solving case studies",
            "plan_id": req.plan_id,
            "subject": SUBJECT,
            "profile_id": req.profile_id,
            "jd_id": req.jd_id,
        }))?,
    )?;
    result.exercises_created += 1;
    Ok(row_str(&row, "id").unwrap_or_default().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subject_detection_is_case_insensitive_substring() {
        for key in ["Art of Problem Solving", "problem solving", "AOPS drills"] {
            let plan = PlanContent::from_value(&json!({
                "subject_prep": { "SQL": {}, key: {} }
            }))
            .expect("plan");
            assert_eq!(find_subject(&plan).map(|s| s.name.as_str()), Some(key));
        }
        let plan = PlanContent::from_value(&json!({ "subject_prep": { "SQL": {} } })).expect("plan");
        assert!(find_subject(&plan).is_none());
    }

    #[test]
    fn question_text_fallbacks() {
        let cs = |v: Value| CaseStudy::from_value(&v).expect("object");
        assert_eq!(
            question_text(&cs(json!({ "problem_statement": "P", "title": "T" }))),
            "P"
        );
        assert_eq!(question_text(&cs(json!({ "title": "T", "business_problem": "B" }))), "T");
        assert_eq!(question_text(&cs(json!({ "business_problem": "B" }))), "B");
        assert_eq!(question_text(&cs(json!({}))), PLACEHOLDER_TEXT);
    }
}
