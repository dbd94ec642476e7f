use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "prepkit.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS plans(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            profile_id TEXT,
            jd_id TEXT,
            content TEXT NOT NULL,
            created_at TEXT,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_plans_user ON plans(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exercises(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            plan_id TEXT,
            subject TEXT,
            profile_id TEXT,
            jd_id TEXT,
            created_at TEXT
        )",
        [],
    )?;
    // Older workspaces predate exercise provenance columns.
    ensure_exercises_provenance_columns(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_exercises_name ON exercises(name)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_exercises_plan ON exercises(plan_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS datasets(
            id TEXT PRIMARY KEY,
            exercise_id TEXT NOT NULL,
            name TEXT NOT NULL,
            table_name TEXT NOT NULL,
            columns TEXT NOT NULL,
            schema_info TEXT,
            creation_sql TEXT,
            creation_python TEXT,
            csv_data TEXT,
            record_count INTEGER NOT NULL DEFAULT 0,
            subject_type TEXT,
            created_at TEXT,
            FOREIGN KEY(exercise_id) REFERENCES exercises(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_datasets_exercise ON datasets(exercise_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS questions(
            id TEXT PRIMARY KEY,
            exercise_id TEXT NOT NULL,
            dataset_id TEXT,
            question_number INTEGER NOT NULL,
            text TEXT NOT NULL,
            type TEXT NOT NULL,
            language TEXT NOT NULL,
            difficulty TEXT NOT NULL,
            topics TEXT NOT NULL,
            points INTEGER NOT NULL DEFAULT 10,
            content TEXT NOT NULL,
            expected_output_table TEXT,
            case_study_title TEXT,
            created_at TEXT,
            FOREIGN KEY(exercise_id) REFERENCES exercises(id),
            FOREIGN KEY(dataset_id) REFERENCES datasets(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_questions_exercise ON questions(exercise_id, question_number)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS answers(
            id TEXT PRIMARY KEY,
            question_id TEXT NOT NULL,
            answer_text TEXT NOT NULL,
            is_case_sensitive INTEGER NOT NULL DEFAULT 0,
            explanation TEXT,
            created_at TEXT,
            FOREIGN KEY(question_id) REFERENCES questions(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_answers_question ON answers(question_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS problem_solving_links(
            id TEXT PRIMARY KEY,
            plan_id TEXT NOT NULL,
            exercise_id TEXT NOT NULL,
            question_id TEXT NOT NULL,
            title TEXT,
            description TEXT,
            problem_statement TEXT,
            business_problem TEXT,
            case_study_context TEXT,
            estimated_time_minutes INTEGER,
            difficulty TEXT,
            topics TEXT NOT NULL,
            created_at TEXT,
            FOREIGN KEY(exercise_id) REFERENCES exercises(id),
            FOREIGN KEY(question_id) REFERENCES questions(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_problem_solving_links_plan ON problem_solving_links(plan_id)",
        [],
    )?;

    Ok(())
}

fn ensure_exercises_provenance_columns(conn: &Connection) -> anyhow::Result<()> {
    for column in ["plan_id", "subject", "profile_id", "jd_id"] {
        if !table_has_column(conn, "exercises", column)? {
            conn.execute(
                &format!("ALTER TABLE exercises ADD COLUMN {} TEXT", column),
                [],
            )?;
        }
    }
    Ok(())
}

pub fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
