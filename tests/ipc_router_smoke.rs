mod test_support;

use serde_json::json;
use test_support::{request, request_ok, send_line, spawn_sidecar, temp_dir};

#[test]
fn router_rejects_bad_lines_and_unknown_methods() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request_ok(&mut stdin, &mut reader, "1", "health", json!({}));
    assert!(health.get("version").and_then(|v| v.as_str()).is_some());
    assert_eq!(health.get("workspacePath"), Some(&serde_json::Value::Null));

    let bad = send_line(&mut stdin, &mut reader, "{not json");
    assert_eq!(bad["ok"], json!(false));
    assert_eq!(bad["error"]["code"], json!("bad_json"));

    let unknown = request(&mut stdin, &mut reader, "2", "classes.list", json!({}));
    assert_eq!(unknown["error"]["code"], json!("not_implemented"));

    let no_ws = request(
        &mut stdin,
        &mut reader,
        "3",
        "plans.migrate",
        json!({ "planId": "p1", "userId": "u1" }),
    );
    assert_eq!(no_ws["error"]["code"], json!("no_workspace"));

    let no_ws_list = request(
        &mut stdin,
        &mut reader,
        "4",
        "exercises.list",
        json!({ "planId": "p1" }),
    );
    assert_eq!(no_ws_list["ok"], json!(false));
    assert_eq!(no_ws_list["error"]["code"], json!("no_workspace"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn save_migrate_and_list_over_ipc() {
    let workspace = temp_dir("prepkit-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    assert!(workspace.path().join("prepkit.sqlite3").exists());

    let missing = request(&mut stdin, &mut reader, "2", "plans.save", json!({ "content": {} }));
    assert_eq!(missing["error"]["code"], json!("bad_params"));

    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "plans.save",
        json!({
            "planId": "plan-1",
            "userId": "user-1",
            "content": {
                "subject_prep": {
                    "SQL": {
                        "case_studies": [{
                            "title": "Orders",
                            "dataset_schema": "CREATE TABLE orders (id INT, total REAL)",
                            "sample_data": "id,total\n1,9.5",
                            "questions": [
                                { "question": "Average order value?", "expected_approach": "AVG(total)" },
                                { "question": "Largest order?" }
                            ]
                        }]
                    },
                    "Problem Solving": {
                        "case_studies": [{ "title": "Pricing", "problem_statement": "Set a launch price" }]
                    }
                }
            }
        }),
    );
    assert_eq!(saved["planId"], json!("plan-1"));

    let foreign = request(
        &mut stdin,
        &mut reader,
        "4",
        "plans.save",
        json!({ "planId": "plan-1", "userId": "intruder", "content": {} }),
    );
    assert_eq!(foreign["error"]["code"], json!("forbidden"));

    let plan = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "plans.get",
        json!({ "planId": "plan-1", "userId": "user-1" }),
    );
    assert!(plan["content"]["subject_prep"]["SQL"].is_object());

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "plans.migrate",
        json!({ "planId": "plan-1", "userId": "user-1" }),
    );
    assert_eq!(result["success"], json!(true), "{}", result);
    assert_eq!(result["planId"], json!("plan-1"));
    // SQL + Problem Solving subjects, plus the plan's problem-solving set.
    assert_eq!(result["exercisesCreated"], json!(3));
    assert_eq!(result["datasetsCreated"], json!(1));
    // Two SQL questions, one synthesized from the problem statement, one linked.
    assert_eq!(result["questionsCreated"], json!(4));
    assert_eq!(result["linksCreated"], json!(1));

    let exercises = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "exercises.list",
        json!({ "planId": "plan-1" }),
    );
    let list = exercises["exercises"].as_array().expect("exercises");
    assert_eq!(list.len(), 3);
    let sql = list
        .iter()
        .find(|e| e["name"] == json!("SQL - Plan plan-1"))
        .expect("sql exercise");
    assert_eq!(sql["questionCount"], json!(2));
    assert_eq!(sql["datasetCount"], json!(1));

    let questions = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "questions.list",
        json!({ "exerciseId": sql["id"] }),
    );
    let qs = questions["questions"].as_array().expect("questions");
    assert_eq!(qs.len(), 2);
    assert_eq!(qs[0]["questionNumber"], json!(1));
    assert_eq!(qs[0]["answers"][0]["answerText"], json!("AVG(total)"));
    assert_eq!(qs[1]["answers"], json!([]));

    let links = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "problemSolving.list",
        json!({ "planId": "plan-1" }),
    );
    assert_eq!(links["links"].as_array().map(|a| a.len()), Some(1));
    assert_eq!(links["links"][0]["problemStatement"], json!("Set a launch price"));

    let fatal = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "plans.migrate",
        json!({ "planId": "missing", "userId": "user-1" }),
    );
    assert_eq!(fatal["success"], json!(false));
    assert_eq!(fatal["errors"].as_array().map(|a| a.len()), Some(1));

    drop(stdin);
    let _ = child.wait();
}
