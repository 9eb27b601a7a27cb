//! Repository for `agencies` and `model_profiles`.
//!
//! The credit balance is only ever mutated through [`AgencyRepo::debit_credits`],
//! a single atomic decrement-if-sufficient statement. Callers never read
//! the balance and write it back, so concurrent runs of the same agency
//! cannot race it below zero.

use sqlx::PgPool;

use atelier_core::types::DbId;

use crate::models::agency::{Agency, ModelProfile};

/// Column list for `agencies` queries.
const AGENCY_COLUMNS: &str = "id, name, credit_balance, created_at, updated_at";

/// Column list for `model_profiles` queries.
const PROFILE_COLUMNS: &str =
    "id, agency_id, name, persona, appearance, style, created_at, updated_at";

/// Read access to tenants and their target models, plus the atomic
/// credit debit.
pub struct AgencyRepo;

impl AgencyRepo {
    /// Find an agency by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Agency>, sqlx::Error> {
        let query = format!("SELECT {AGENCY_COLUMNS} FROM agencies WHERE id = $1");
        sqlx::query_as::<_, Agency>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a model profile by its ID.
    pub async fn find_profile(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<ModelProfile>, sqlx::Error> {
        let query = format!("SELECT {PROFILE_COLUMNS} FROM model_profiles WHERE id = $1");
        sqlx::query_as::<_, ModelProfile>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Current credit balance for an agency.
    pub async fn credit_balance(pool: &PgPool, agency_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT credit_balance FROM agencies WHERE id = $1")
            .bind(agency_id)
            .fetch_one(pool)
            .await
    }

    /// Atomically deduct `amount` credits if the balance covers it.
    ///
    /// Returns `true` when the deduction happened, `false` when the
    /// balance was insufficient (no change was made).
    pub async fn debit_credits(
        pool: &PgPool,
        agency_id: DbId,
        amount: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE agencies \
             SET credit_balance = credit_balance - $2, updated_at = NOW() \
             WHERE id = $1 AND credit_balance >= $2",
        )
        .bind(agency_id)
        .bind(amount)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
