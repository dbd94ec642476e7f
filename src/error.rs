use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("plan {plan_id} not found for user {user_id}")]
    PlanNotFound { plan_id: String, user_id: String },
    #[error("plan {0} has no subject_prep content")]
    MissingSubjectPrep(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
