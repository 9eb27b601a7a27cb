//! Tenant ("agency") and target-model context records.
//!
//! These rows are read-only from the engine's point of view, with one
//! exception: the credit balance, which is only ever changed through the
//! atomic decrement in `AgencyRepo::debit_credits`.

use serde::Serialize;
use sqlx::FromRow;

use atelier_core::types::{DbId, Timestamp};

/// A row from the `agencies` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Agency {
    pub id: DbId,
    pub name: String,
    pub credit_balance: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `model_profiles` table: the AI persona content is
/// generated for, and the source of template variables.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ModelProfile {
    pub id: DbId,
    pub agency_id: DbId,
    pub name: String,
    pub persona: Option<String>,
    pub appearance: Option<String>,
    pub style: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
