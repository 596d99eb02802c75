// SPDX-License-Identifier: Apache-2.0

use crate::config::DeleteMatch;
use crate::http::auth::authenticate;
use crate::http::encode_path_segment;
use crate::http::response_contract::ApiError;
use crate::repository::DeleteOutcome;
use crate::AppState;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::HOST;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use scorekeep_model::{PublicScore, Score, ScoreDraft, ShardKey};
use serde_json::{json, Value};
use tracing::info;

const BAD_REQUEST_MESSAGE: &str = "Bad request";

fn shard_key(task: &str, shard: &str) -> Result<ShardKey, ApiError> {
    ShardKey::new(task, shard).map_err(|e| ApiError::bad_request(format!("invalid shard key: {e}")))
}

fn shard_missing(key: &ShardKey) -> ApiError {
    ApiError::not_found(format!("{key} wasn't created yet"))
}

fn score_missing(id: &str, key: &ShardKey) -> ApiError {
    ApiError::not_found(format!("score {id} for {key} doesn't exist"))
}

/// Path ids that are not non-negative integers name no score.
fn parse_score_id(raw: &str, key: &ShardKey) -> Result<u64, ApiError> {
    raw.parse::<u64>().map_err(|_| score_missing(raw, key))
}

fn valid_host(host: &str) -> bool {
    !host.is_empty()
        && host.len() <= 255
        && host
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b':' | b'[' | b']'))
}

pub(crate) fn public_base(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(base) = &state.api.public_base_url {
        return base.clone();
    }
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|h| valid_host(h))
        .unwrap_or("localhost");
    format!("http://{host}")
}

pub(crate) fn score_uri(base: &str, prefix: &str, key: &ShardKey, id: u64) -> String {
    format!(
        "{base}{prefix}/scores/{}/{}/{id}",
        encode_path_segment(key.task()),
        encode_path_segment(key.shard())
    )
}

fn make_public(state: &AppState, base: &str, key: &ShardKey, score: &Score) -> PublicScore {
    score.to_public(score_uri(base, &state.api.api_prefix, key, score.id))
}

pub(crate) async fn get_scores_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((task, shard)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let key = shard_key(&task, &shard)?;
    let scores = state
        .repository
        .get_shard(&key)
        .await?
        .ok_or_else(|| shard_missing(&key))?;
    let base = public_base(&state, &headers);
    let public: Vec<PublicScore> = scores
        .iter()
        .map(|s| make_public(&state, &base, &key, s))
        .collect();
    Ok(Json(json!({ "scores": public })))
}

pub(crate) async fn list_tasks_handler(
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    let tasks = state.repository.list_tasks().await?;
    Ok(Json(json!({ "tasks": tasks })))
}

pub(crate) async fn list_shards_handler(
    State(state): State<AppState>,
    Path(task): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let shards = state.repository.list_shards(&task).await?;
    Ok(Json(json!({ "shards": shards })))
}

pub(crate) async fn get_score_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((task, shard, raw_id)): Path<(String, String, String)>,
) -> Result<Json<Value>, ApiError> {
    let key = shard_key(&task, &shard)?;
    let id = parse_score_id(&raw_id, &key)?;
    let scores = state
        .repository
        .get_shard(&key)
        .await?
        .ok_or_else(|| shard_missing(&key))?;
    let score = scores
        .iter()
        .find(|s| s.id == id)
        .ok_or_else(|| score_missing(&raw_id, &key))?;
    let base = public_base(&state, &headers);
    Ok(Json(json!({ "score": make_public(&state, &base, &key, score) })))
}

pub(crate) async fn delete_score_handler(
    State(state): State<AppState>,
    Path((task, shard, raw_id)): Path<(String, String, String)>,
) -> Result<Json<Value>, ApiError> {
    let key = shard_key(&task, &shard)?;
    let id = parse_score_id(&raw_id, &key)?;
    let outcome = match state.api.delete_match {
        // An id wider than usize is past the end of any shard.
        DeleteMatch::Position => {
            let index = usize::try_from(id).unwrap_or(usize::MAX);
            state.repository.delete_at(&key, index).await?
        }
        DeleteMatch::Id => state.repository.delete_by_id(&key, id).await?,
    };
    match outcome {
        DeleteOutcome::ShardMissing => return Err(shard_missing(&key)),
        DeleteOutcome::ScoreMissing => return Err(score_missing(&raw_id, &key)),
        DeleteOutcome::Deleted => {}
    }
    info!(
        task = key.task(),
        shard = key.shard(),
        id,
        mode = state.api.delete_match.as_str(),
        "score deleted"
    );
    Ok(Json(json!({ "result": true })))
}

/// The body is checked before credentials, so a request without `score` is a
/// 400 whether or not it is authenticated.
pub(crate) async fn create_score_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((task, shard)): Path<(String, String)>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let payload: Value =
        serde_json::from_slice(&body).map_err(|_| ApiError::bad_request(BAD_REQUEST_MESSAGE))?;
    let draft =
        ScoreDraft::from_json(&payload).map_err(|_| ApiError::bad_request(BAD_REQUEST_MESSAGE))?;
    let key = shard_key(&task, &shard)?;
    let user = authenticate(&headers, &state.api.credentials)?;
    let score = state.repository.append(&key, &user, draft).await?;
    info!(
        task = key.task(),
        shard = key.shard(),
        id = score.id,
        user = %user,
        "score created"
    );
    Ok((StatusCode::CREATED, Json(json!({ "score": score }))))
}

pub(crate) async fn healthz_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn not_found_handler() -> ApiError {
    ApiError::not_found("Not found")
}
