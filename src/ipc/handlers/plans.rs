use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::migrate::{migrate_plan, MigrationRequest};
use crate::store::{row_str, Filter, SqliteStore, Store, Table};
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

fn param_str<'a>(req: &'a Request, key: &str) -> Option<&'a str> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn handle_plans_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(user_id) = param_str(req, "userId") else {
        return err(&req.id, "bad_params", "missing userId", None);
    };
    let content = match req.params.get("content") {
        Some(v) if !v.is_null() => v,
        _ => return err(&req.id, "bad_params", "missing content", None),
    };
    let content_json = match serde_json::to_string(content) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    let profile_id = param_str(req, "profileId");
    let jd_id = param_str(req, "jdId");
    let plan_id = param_str(req, "planId")
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let owner: Option<String> = match conn
        .query_row("SELECT user_id FROM plans WHERE id = ?", [&plan_id], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if owner.as_deref().is_some_and(|o| o != user_id) {
        return err(
            &req.id,
            "forbidden",
            "plan belongs to another user",
            Some(json!({ "planId": plan_id })),
        );
    }

    let now = chrono::Utc::now().to_rfc3339();
    let res = conn.execute(
        "INSERT INTO plans(id, user_id, profile_id, jd_id, content, created_at, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
           profile_id = excluded.profile_id,
           jd_id = excluded.jd_id,
           content = excluded.content,
           updated_at = excluded.updated_at",
        (&plan_id, user_id, profile_id, jd_id, &content_json, &now, &now),
    );
    if let Err(e) = res {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "plans" })),
        );
    }

    ok(
        &req.id,
        json!({ "planId": plan_id, "created": owner.is_none() }),
    )
}

fn handle_plans_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let (Some(plan_id), Some(user_id)) = (param_str(req, "planId"), param_str(req, "userId"))
    else {
        return err(&req.id, "bad_params", "missing planId or userId", None);
    };

    let store = SqliteStore::new(conn);
    let rows = match store.select(
        Table::Plans,
        &[Filter::eq("id", plan_id), Filter::eq("user_id", user_id)],
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(row) = rows.into_iter().next() else {
        return err(&req.id, "not_found", "plan not found", None);
    };

    ok(
        &req.id,
        json!({
            "planId": row_str(&row, "id"),
            "userId": row_str(&row, "user_id"),
            "profileId": row_str(&row, "profile_id"),
            "jdId": row_str(&row, "jd_id"),
            "content": row.get("content"),
            "createdAt": row_str(&row, "created_at"),
            "updatedAt": row_str(&row, "updated_at"),
        }),
    )
}

fn handle_plans_migrate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let migration: MigrationRequest = match serde_json::from_value(req.params.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    if migration.plan_id.trim().is_empty() || migration.user_id.trim().is_empty() {
        return err(&req.id, "bad_params", "planId and userId must not be empty", None);
    }

    let store = SqliteStore::new(conn);
    let result = migrate_plan(&store, &migration);
    ok(&req.id, result.to_json())
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "plans.save" => Some(handle_plans_save(state, req)),
        "plans.get" => Some(handle_plans_get(state, req)),
        "plans.migrate" => Some(handle_plans_migrate(state, req)),
        _ => None,
    }
}
