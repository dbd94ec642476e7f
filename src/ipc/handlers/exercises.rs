use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::{row_str, Filter, Row, SqliteStore, Store, Table};
use serde_json::{json, Map, Value};

fn param_str<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
}

/// Row keys in the camelCase the UI expects (`question_number` -> `questionNumber`).
fn camel_row(row: Row) -> Value {
    let mut out = Map::with_capacity(row.len());
    for (key, value) in row {
        let mut camel = String::with_capacity(key.len());
        let mut upper = false;
        for ch in key.chars() {
            if ch == '_' {
                upper = true;
            } else if upper {
                camel.extend(ch.to_uppercase());
                upper = false;
            } else {
                camel.push(ch);
            }
        }
        out.insert(camel, value);
    }
    Value::Object(out)
}

fn handle_exercises_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(plan_id) = param_str(req, "planId") else {
        return err(&req.id, "bad_params", "missing planId", None);
    };

    // Correlated subqueries so counts are not multiplied by joins.
    let mut stmt = match conn.prepare(
        "SELECT
           e.id,
           e.name,
           e.description,
           e.subject,
           (SELECT COUNT(*) FROM questions q WHERE q.exercise_id = e.id) AS question_count,
           (SELECT COUNT(*) FROM datasets d WHERE d.exercise_id = e.id) AS dataset_count
         FROM exercises e
         WHERE e.plan_id = ?
         ORDER BY e.rowid",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([plan_id], |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let description: Option<String> = row.get(2)?;
            let subject: Option<String> = row.get(3)?;
            let question_count: i64 = row.get(4)?;
            let dataset_count: i64 = row.get(5)?;
            Ok(json!({
                "id": id,
                "name": name,
                "description": description,
                "subject": subject,
                "questionCount": question_count,
                "datasetCount": dataset_count
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(exercises) => ok(&req.id, json!({ "exercises": exercises })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_questions_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(exercise_id) = param_str(req, "exerciseId") else {
        return err(&req.id, "bad_params", "missing exerciseId", None);
    };

    let store = SqliteStore::new(conn);
    let mut questions = match store.select(Table::Questions, &[Filter::eq("exercise_id", exercise_id)]) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    questions.sort_by_key(|q| q.get("question_number").and_then(|v| v.as_i64()).unwrap_or(0));

    let ids: Vec<String> = questions
        .iter()
        .filter_map(|q| row_str(q, "id").map(str::to_string))
        .collect();
    let answers = match store.select(Table::Answers, &[Filter::any_of("question_id", ids)]) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let out: Vec<Value> = questions
        .into_iter()
        .map(|q| {
            let id = row_str(&q, "id").unwrap_or_default().to_string();
            let own: Vec<Value> = answers
                .iter()
                .filter(|a| row_str(a, "question_id") == Some(id.as_str()))
                .cloned()
                .map(camel_row)
                .collect();
            let mut v = camel_row(q);
            v["answers"] = Value::Array(own);
            v
        })
        .collect();

    ok(&req.id, json!({ "questions": out }))
}

fn handle_problem_solving_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(plan_id) = param_str(req, "planId") else {
        return err(&req.id, "bad_params", "missing planId", None);
    };

    let store = SqliteStore::new(conn);
    match store.select(Table::ProblemSolvingLinks, &[Filter::eq("plan_id", plan_id)]) {
        Ok(rows) => ok(
            &req.id,
            json!({ "links": rows.into_iter().map(camel_row).collect::<Vec<_>>() }),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "exercises.list" => Some(handle_exercises_list(state, req)),
        "questions.list" => Some(handle_questions_list(state, req)),
        "problemSolving.list" => Some(handle_problem_solving_list(state, req)),
        _ => None,
    }
}
