//! Projects canonical questions into question and answer rows.

use crate::plan::{non_empty_text, CaseStudy, Object, RawQuestion};
use crate::store::Row;
use serde::Serialize;
use serde_json::Value;

pub const QUESTION_POINTS: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

/// Free-text difficulty to the three-level scale. Unrecognized text is intermediate.
pub fn normalize_difficulty(text: Option<&str>) -> Difficulty {
    let t = text.unwrap_or("").to_lowercase();
    if t.contains("easy") || t.contains("beginner") {
        Difficulty::Beginner
    } else if t.contains("hard") || t.contains("advanced") {
        Difficulty::Advanced
    } else {
        // "medium", "intermediate", "mid" and everything else.
        Difficulty::Intermediate
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub question_type: &'static str,
    pub language: &'static str,
}

const SUBJECT_TYPES: &[(&str, &str, &str)] = &[
    ("sql", "sql", "sql"),
    ("python", "python", "python"),
    ("pandas", "python", "python"),
    ("power bi", "power_bi", "sql"),
    ("excel", "excel", "text"),
    ("tableau", "tableau", "text"),
    ("statistics", "statistics", "python"),
    ("machine learning", "machine_learning", "python"),
    ("problem solving", "problem_solving", "text"),
    ("art of problem solving", "problem_solving", "text"),
    ("case study", "case_study", "text"),
];

pub fn classify(subject: &str) -> Classification {
    let key = subject.trim().to_lowercase();
    SUBJECT_TYPES
        .iter()
        .find(|(name, _, _)| *name == key)
        .map(|&(_, question_type, language)| Classification {
            question_type,
            language,
        })
        .unwrap_or(Classification {
            question_type: "coding",
            language: "text",
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Question,
    CaseStudy,
    Subject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSource {
    pub scope: Scope,
    pub key: &'static str,
}

const fn q(key: &'static str) -> FieldSource {
    FieldSource {
        scope: Scope::Question,
        key,
    }
}

const fn c(key: &'static str) -> FieldSource {
    FieldSource {
        scope: Scope::CaseStudy,
        key,
    }
}

const fn s(key: &'static str) -> FieldSource {
    FieldSource {
        scope: Scope::Subject,
        key,
    }
}

/// A logical content field and the ordered places it may come from.
/// The first non-empty source wins; the order is part of the contract.
#[derive(Debug, Clone, Copy)]
pub struct FieldChain {
    pub name: &'static str,
    pub sources: &'static [FieldSource],
}

pub const BUSINESS_CONTEXT: FieldChain = FieldChain {
    name: "business_context",
    sources: &[
        q("business_context"),
        q("context"),
        c("business_context"),
        c("business_problem"),
        c("description"),
        s("business_context"),
    ],
};

pub const DATASET_CONTEXT: FieldChain = FieldChain {
    name: "dataset_context",
    sources: &[
        q("dataset_context"),
        c("dataset_overview"),
        c("dataset_description"),
        s("dataset_description"),
        s("business_context"),
    ],
};

pub const DATASET_DESCRIPTION: FieldChain = FieldChain {
    name: "dataset_description",
    sources: &[
        q("dataset_description"),
        c("dataset_description"),
        c("dataset_overview"),
        s("dataset_description"),
    ],
};

pub const TITLE: FieldChain = FieldChain {
    name: "title",
    sources: &[q("title"), c("title"), s("header_text")],
};

pub const PROBLEM_STATEMENT: FieldChain = FieldChain {
    name: "problem_statement",
    sources: &[
        q("problem_statement"),
        c("problem_statement"),
        s("problem_statement"),
    ],
};

pub const DESCRIPTION: FieldChain = FieldChain {
    name: "description",
    sources: &[
        q("description"),
        c("description"),
        s("description"),
        s("business_context"),
    ],
};

pub const CONTENT_CHAINS: &[FieldChain] = &[
    BUSINESS_CONTEXT,
    DATASET_CONTEXT,
    DATASET_DESCRIPTION,
    TITLE,
    PROBLEM_STATEMENT,
    DESCRIPTION,
];

/// The three key sets a content field may be read from.
#[derive(Debug, Clone, Copy)]
pub struct FieldScope<'a> {
    pub question: &'a Object,
    pub case_study: &'a Object,
    pub subject: &'a Object,
}

impl FieldChain {
    pub fn resolve(&self, scope: &FieldScope<'_>) -> Option<String> {
        self.sources.iter().find_map(|src| {
            let obj = match src.scope {
                Scope::Question => scope.question,
                Scope::CaseStudy => scope.case_study,
                Scope::Subject => scope.subject,
            };
            obj.get(src.key).and_then(non_empty_text)
        })
    }
}

/// Where a projected question will live.
#[derive(Debug, Clone, Copy)]
pub struct QuestionContext<'a> {
    pub subject: &'a str,
    pub subject_fields: &'a Object,
    pub case_study: &'a CaseStudy,
    pub exercise_id: &'a str,
    pub dataset_id: Option<&'a str>,
    pub question_number: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionRecord {
    pub exercise_id: String,
    pub dataset_id: Option<String>,
    pub question_number: i64,
    pub text: String,
    #[serde(rename = "type")]
    pub question_type: String,
    pub language: String,
    pub difficulty: Difficulty,
    pub topics: Vec<String>,
    pub points: i64,
    pub content: Object,
    pub expected_output_table: Option<String>,
    pub case_study_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerRecord {
    pub question_id: String,
    pub answer_text: String,
    pub is_case_sensitive: bool,
    pub explanation: Option<String>,
}

/// Serializes a record into a store row.
pub fn to_row<T: Serialize>(record: &T) -> Result<Row, serde_json::Error> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(serde::ser::Error::custom(format!(
            "expected an object, got {other}"
        ))),
    }
}

fn opt(v: Option<&String>) -> Value {
    v.map(|s| Value::String(s.clone())).unwrap_or(Value::Null)
}

pub fn project_question(question: &RawQuestion, ctx: &QuestionContext<'_>) -> QuestionRecord {
    let class = classify(ctx.subject);
    let scope = FieldScope {
        question: &question.fields,
        case_study: &ctx.case_study.fields,
        subject: ctx.subject_fields,
    };

    let mut content = Object::new();
    for chain in CONTENT_CHAINS {
        content.insert(
            chain.name.to_string(),
            chain.resolve(&scope).map(Value::String).unwrap_or(Value::Null),
        );
    }
    content.insert("hint".into(), opt(question.hint.as_ref()));
    content.insert("sample_input".into(), opt(question.sample_input.as_ref()));
    content.insert("sample_output".into(), opt(question.sample_output.as_ref()));

    let topics = if question.topics.is_empty() {
        vec![ctx.subject.to_string()]
    } else {
        question.topics.clone()
    };
    let difficulty = question
        .difficulty
        .as_deref()
        .or(ctx.case_study.difficulty.as_deref());

    QuestionRecord {
        exercise_id: ctx.exercise_id.to_string(),
        dataset_id: ctx.dataset_id.map(str::to_string),
        question_number: ctx.question_number,
        text: question.text.clone().unwrap_or_default(),
        question_type: class.question_type.to_string(),
        language: class.language.to_string(),
        difficulty: normalize_difficulty(difficulty),
        topics,
        points: QUESTION_POINTS,
        content,
        expected_output_table: question.sample_output.clone(),
        case_study_title: ctx.case_study.title.clone(),
    }
}

/// An answer row, when the source carries an expected output or approach.
pub fn project_answer(question: &RawQuestion, question_id: &str) -> Option<AnswerRecord> {
    let answer_text = question
        .sample_output
        .clone()
        .or_else(|| question.expected_approach.clone())?;
    Some(AnswerRecord {
        question_id: question_id.to_string(),
        answer_text,
        is_case_sensitive: false,
        explanation: question.expected_approach.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Object {
        v.as_object().cloned().expect("object")
    }

    #[test]
    fn difficulty_normalization() {
        assert_eq!(normalize_difficulty(Some("Hard")), Difficulty::Advanced);
        assert_eq!(normalize_difficulty(Some("")), Difficulty::Intermediate);
        assert_eq!(normalize_difficulty(None), Difficulty::Intermediate);
        assert_eq!(normalize_difficulty(Some("Easy-ish")), Difficulty::Beginner);
        assert_eq!(normalize_difficulty(Some("BEGINNER friendly")), Difficulty::Beginner);
        assert_eq!(normalize_difficulty(Some("Advanced")), Difficulty::Advanced);
        assert_eq!(normalize_difficulty(Some("mid-level")), Difficulty::Intermediate);
        assert_eq!(normalize_difficulty(Some("spicy")), Difficulty::Intermediate);
        // "easy" is checked before "hard".
        assert_eq!(normalize_difficulty(Some("easy to hard")), Difficulty::Beginner);
    }

    #[test]
    fn classification_table() {
        assert_eq!(
            classify("SQL"),
            Classification {
                question_type: "sql",
                language: "sql"
            }
        );
        assert_eq!(classify("Power BI").question_type, "power_bi");
        assert_eq!(classify("Power BI").language, "sql");
        assert_eq!(classify("Statistics").language, "python");
        assert_eq!(classify("problem solving").question_type, "problem_solving");
        assert_eq!(classify("Problem Solving").language, "text");
        assert_eq!(
            classify("Kubernetes"),
            Classification {
                question_type: "coding",
                language: "text"
            }
        );
    }

    #[test]
    fn chains_prefer_question_then_case_study_then_subject() {
        let question = obj(json!({ "context": "from question" }));
        let case_study = obj(json!({ "business_context": "from case study", "title": "CS" }));
        let subject = obj(json!({ "business_context": "from subject", "header_text": "Header" }));
        let scope = FieldScope {
            question: &question,
            case_study: &case_study,
            subject: &subject,
        };
        assert_eq!(BUSINESS_CONTEXT.resolve(&scope).as_deref(), Some("from question"));
        assert_eq!(TITLE.resolve(&scope).as_deref(), Some("CS"));

        let empty = Object::new();
        let scope = FieldScope {
            question: &empty,
            case_study: &empty,
            subject: &subject,
        };
        assert_eq!(BUSINESS_CONTEXT.resolve(&scope).as_deref(), Some("from subject"));
        assert_eq!(TITLE.resolve(&scope).as_deref(), Some("Header"));
        assert_eq!(PROBLEM_STATEMENT.resolve(&scope), None);
    }

    #[test]
    fn blank_sources_are_skipped() {
        let question = obj(json!({ "business_context": "  ", "context": null }));
        let case_study = obj(json!({ "business_context": "", "business_problem": "Churn is up" }));
        let subject = Object::new();
        let scope = FieldScope {
            question: &question,
            case_study: &case_study,
            subject: &subject,
        };
        assert_eq!(BUSINESS_CONTEXT.resolve(&scope).as_deref(), Some("Churn is up"));
    }

    #[test]
    fn chain_orders_are_fixed() {
        let keys: Vec<_> = DATASET_CONTEXT.sources.iter().map(|s| (s.scope, s.key)).collect();
        assert_eq!(
            keys,
            vec![
                (Scope::Question, "dataset_context"),
                (Scope::CaseStudy, "dataset_overview"),
                (Scope::CaseStudy, "dataset_description"),
                (Scope::Subject, "dataset_description"),
                (Scope::Subject, "business_context"),
            ]
        );
        let names: Vec<_> = CONTENT_CHAINS.iter().map(|c| c.name).collect();
        assert_eq!(
            names,
            vec![
                "business_context",
                "dataset_context",
                "dataset_description",
                "title",
                "problem_statement",
                "description"
            ]
        );
    }

    #[test]
    fn project_question_fills_defaults_and_content() {
        let cs = CaseStudy::from_fields(obj(json!({
            "title": "Retail",
            "dataset_overview": "Store sales by region",
            "difficulty": "Hard"
        })));
        let subject_fields = obj(json!({ "business_context": "Retail chain" }));
        let raw = RawQuestion::from_value(&json!({
            "business_question": "Top region by revenue?",
            "sample_output": "region | revenue",
            "hint": "GROUP BY region"
        }));
        let ctx = QuestionContext {
            subject: "SQL",
            subject_fields: &subject_fields,
            case_study: &cs,
            exercise_id: "ex-1",
            dataset_id: Some("ds-1"),
            question_number: 3,
        };
        let rec = project_question(&raw, &ctx);
        assert_eq!(rec.text, "Top region by revenue?");
        assert_eq!(rec.question_type, "sql");
        assert_eq!(rec.language, "sql");
        assert_eq!(rec.difficulty, Difficulty::Advanced);
        assert_eq!(rec.topics, vec!["SQL"]);
        assert_eq!(rec.points, 10);
        assert_eq!(rec.question_number, 3);
        assert_eq!(rec.dataset_id.as_deref(), Some("ds-1"));
        assert_eq!(rec.content.get("dataset_context"), Some(&json!("Store sales by region")));
        assert_eq!(rec.content.get("business_context"), Some(&json!("Retail chain")));
        assert_eq!(rec.content.get("title"), Some(&json!("Retail")));
        assert_eq!(rec.content.get("hint"), Some(&json!("GROUP BY region")));
        assert_eq!(rec.content.get("sample_input"), Some(&Value::Null));

        let row = to_row(&rec).expect("row");
        assert_eq!(row.get("type"), Some(&json!("sql")));
        assert_eq!(row.get("difficulty"), Some(&json!("advanced")));
    }

    #[test]
    fn answers_need_output_or_approach() {
        let none = RawQuestion::from_value(&json!({ "question": "q" }));
        assert!(project_answer(&none, "q1").is_none());

        let approach = RawQuestion::from_value(&json!({ "question": "q", "expected_approach": "use a CTE" }));
        let a = project_answer(&approach, "q1").expect("answer");
        assert_eq!(a.answer_text, "use a CTE");
        assert_eq!(a.explanation.as_deref(), Some("use a CTE"));
        assert!(!a.is_case_sensitive);

        let both = RawQuestion::from_value(&json!({
            "question": "q",
            "expected_approach": "use a CTE",
            "sample_output": "42"
        }));
        let a = project_answer(&both, "q1").expect("answer");
        assert_eq!(a.answer_text, "42");
        assert_eq!(a.explanation.as_deref(), Some("use a CTE"));
    }
}
