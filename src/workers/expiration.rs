use crate::config::Settings;
use anyhow::Context;
use sqlx::{PgExecutor, PgPool};
use std::time::Duration;

const SWEEP_INTERVAL: Duration = Duration::from_secs(120);

pub struct Worker {
    pool: PgPool,
}

impl Worker {
    pub fn builder(config: &Settings) -> Self {
        let pool = config.database.get_db_pool();
        Self { pool }
    }

    pub async fn finish(self) -> anyhow::Result<()> {
        loop {
            if let Err(e) = sweep(&self.pool).await {
                tracing::error!(error.cause_chain = ?e, error.message = %e, "Expiration sweep failed");
            }
            tokio::time::sleep(SWEEP_INTERVAL).await;
        }
    }
}

#[tracing::instrument(name = "Sweep expired records", skip_all)]
async fn sweep(pool: &PgPool) -> anyhow::Result<()> {
    let otps = delete_stale_otps(pool).await?;
    let keys = delete_expired(pool).await?;
    tracing::info!(otps, idempotency_keys = keys, "Deleted expired records");
    Ok(())
}

/// Codes that were used or ran out more than a day ago.
pub async fn delete_stale_otps(exec: impl PgExecutor<'_>) -> anyhow::Result<u64> {
    let rows = sqlx::query(
        r#"
    DELETE FROM otp_requests
    WHERE (consumed OR expires_at < now()) AND created_at < now() - interval '1 day'
    "#,
    )
    .execute(exec)
    .await
    .context("Failed to delete stale OTP requests.")?
    .rows_affected();
    Ok(rows)
}

pub async fn delete_expired(exec: impl PgExecutor<'_>) -> anyhow::Result<u64> {
    let rows = sqlx::query(
        r#"
    DELETE FROM idempotency
    WHERE created_at < now() - interval '1 day'
    "#,
    )
    .execute(exec)
    .await
    .context("Failed to delete expired idempotency keys.")?
    .rows_affected();
    Ok(rows)
}
