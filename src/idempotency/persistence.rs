use super::IdempotencyKey;
use actix_web::{body, http::StatusCode, HttpResponse};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgExecutor, PgPool, PgTransaction};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
struct HeaderPairRecord {
    name: String,
    value: Vec<u8>,
}

#[derive(sqlx::FromRow)]
struct SavedResponse {
    response_status_code: Option<i16>,
    response_headers: Option<Json<Vec<HeaderPairRecord>>>,
    response_body: Option<Vec<u8>>,
}

#[tracing::instrument(name = "Get saved response", skip(executor))]
pub async fn get_saved_response(
    user_id: Uuid,
    idempotency_key: &IdempotencyKey,
    executor: impl PgExecutor<'_>,
) -> anyhow::Result<Option<HttpResponse>> {
    let saved_resp = sqlx::query_as::<_, SavedResponse>(
        r#"
        SELECT
            response_status_code,
            response_headers,
            response_body
        FROM idempotency
        WHERE user_id = $1
        AND idempotency_key = $2
        "#,
    )
    .bind(user_id)
    .bind(idempotency_key.as_ref())
    .fetch_optional(executor)
    .await?;

    let Some(SavedResponse {
        response_status_code: Some(status_code),
        response_headers: Some(Json(headers)),
        response_body: Some(body),
    }) = saved_resp
    else {
        return Ok(None);
    };

    let status_code = StatusCode::from_u16(status_code.try_into()?)?;
    let mut resp = HttpResponse::build(status_code);
    for HeaderPairRecord { name, value } in headers {
        resp.append_header((name, value));
    }
    Ok(Some(resp.body(body)))
}

#[tracing::instrument(name = "Save response", skip(resp, txn))]
pub async fn save_response(
    resp: HttpResponse,
    user_id: Uuid,
    idempotency_key: &IdempotencyKey,
    mut txn: PgTransaction<'static>,
) -> anyhow::Result<HttpResponse> {
    let (resp_head, body) = resp.into_parts();
    let status_code = resp_head.status().as_u16() as i16;
    let headers = resp_head
        .headers()
        .iter()
        .map(|(name, value)| HeaderPairRecord {
            name: name.as_str().into(),
            value: value.as_bytes().into(),
        })
        .collect::<Vec<_>>();
    let body = body::to_bytes(body)
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    sqlx::query(
        r#"
        UPDATE idempotency
        SET
            response_status_code = $3,
            response_headers = $4,
            response_body = $5
        WHERE user_id = $1
            AND idempotency_key = $2
        "#,
    )
    .bind(user_id)
    .bind(idempotency_key.as_ref())
    .bind(status_code)
    .bind(Json(headers))
    .bind(body.as_ref())
    .execute(txn.as_mut())
    .await?;
    txn.commit().await?;

    Ok(resp_head.set_body(body).map_into_boxed_body())
}

pub enum NextAction {
    StartProcessing(PgTransaction<'static>),
    ReturnSavedResponse(HttpResponse),
}

/// Claims the key. The returned transaction holds the row until `save_response`.
#[tracing::instrument(name = "Try processing idempotent request", skip(pool))]
pub async fn try_processing(
    user_id: Uuid,
    idempotency_key: &IdempotencyKey,
    pool: &PgPool,
) -> anyhow::Result<NextAction> {
    let mut txn = pool.begin().await?;
    let rows_affected = sqlx::query(
        r#"
        INSERT INTO idempotency (
            user_id,
            idempotency_key,
            created_at
        )
        VALUES ($1, $2, now())
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(idempotency_key.as_ref())
    .execute(txn.as_mut())
    .await?
    .rows_affected();

    if rows_affected == 0 {
        let saved_resp = get_saved_response(user_id, idempotency_key, pool)
            .await?
            .ok_or_else(|| anyhow::anyhow!("We expected a saved response, we didn't find it"))?;
        Ok(NextAction::ReturnSavedResponse(saved_resp))
    } else {
        Ok(NextAction::StartProcessing(txn))
    }
}
