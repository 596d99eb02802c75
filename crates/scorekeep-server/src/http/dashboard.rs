// SPDX-License-Identifier: Apache-2.0

use crate::http::encode_path_segment;
use crate::http::response_contract::{api_error_status, ApiError};
use crate::repository::RepositoryError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use scorekeep_model::{shard_of_key, task_of_key, Score, ShardKey};
use serde::Serialize;
use serde_json::Value;

/// Inputs of the chart page for one shard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub title: String,
    /// `None` when the shard holds no numeric score.
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub ids: Vec<u64>,
    pub scores: Vec<Value>,
    pub timestamps: Vec<Value>,
    /// Every key in the store, not only this task's.
    pub shards: Vec<String>,
    pub rows: Vec<Score>,
}

impl DashboardView {
    #[must_use]
    pub fn build(key: &ShardKey, rows: Vec<Score>, shards: Vec<String>) -> Self {
        let numeric = rows.iter().filter_map(Score::numeric_score);
        let (min, max) = numeric.fold((None, None), |(lo, hi): (Option<f64>, Option<f64>), v| {
            (
                Some(lo.map_or(v, |lo| lo.min(v))),
                Some(hi.map_or(v, |hi| hi.max(v))),
            )
        });
        Self {
            title: key.to_string(),
            min,
            max,
            ids: rows.iter().map(|s| s.id).collect(),
            scores: rows.iter().map(|s| s.score.clone()).collect(),
            timestamps: rows.iter().map(|s| s.time.clone()).collect(),
            shards,
            rows,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.is_none()
    }
}

pub(crate) async fn dashboard_handler(
    State(state): State<AppState>,
    Path((task, shard)): Path<(String, String)>,
) -> Response {
    match dashboard_response(&state, &task, &shard).await {
        Ok(resp) => resp,
        Err(e) => error_response(&ApiError::from(e)),
    }
}

async fn dashboard_response(
    state: &AppState,
    task: &str,
    shard: &str,
) -> Result<Response, RepositoryError> {
    let title = format!("{task}/{shard}");
    let Ok(key) = ShardKey::new(task, shard) else {
        return Ok(not_found_response(&title));
    };
    let Some(rows) = state.repository.get_shard(&key).await? else {
        return Ok(not_found_response(&title));
    };
    let shards = state.repository.list_shard_keys().await?;
    let view = DashboardView::build(&key, rows, shards);
    Ok(Html(render_dashboard_page(&view)).into_response())
}

fn not_found_response(title: &str) -> Response {
    (StatusCode::NOT_FOUND, Html(render_not_found_page(title))).into_response()
}

/// Store failures on the dashboard keep the HTML content type of the page.
fn error_response(err: &ApiError) -> Response {
    let status = api_error_status(err.kind);
    let mut resp = (status, Html(render_error_page(status, &err.message))).into_response();
    if status == StatusCode::SERVICE_UNAVAILABLE {
        resp.headers_mut()
            .insert("retry-after", HeaderValue::from_static("3"));
    }
    resp
}

#[must_use]
pub(crate) fn render_error_page(status: StatusCode, message: &str) -> String {
    let code = status.as_u16();
    let message = html_escape(message);
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{code}</title></head><body>\
<h1>{code}</h1>\
<p>{message}</p>\
</body></html>"
    )
}

#[must_use]
pub(crate) fn render_not_found_page(title: &str) -> String {
    let title = html_escape(title);
    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title} - not found</title></head><body>\
<h1>{title}</h1>\
<p>This task/shard wasn't created yet.</p>\
<p><a href=\"/\">Back</a></p>\
</body></html>"
    )
}

#[must_use]
pub(crate) fn render_dashboard_page(view: &DashboardView) -> String {
    let title = html_escape(&view.title);
    let summary = match (view.min, view.max) {
        (Some(min), Some(max)) => format!(
            "<p>{} scores, min <code>{min}</code>, max <code>{max}</code></p>",
            view.rows.len()
        ),
        _ => "<p>No scores recorded yet.</p>".to_string(),
    };

    let mut rows = String::new();
    for score in &view.rows {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            score.id,
            html_escape(&score.user),
            html_escape(&display_value(&score.score)),
            html_escape(&display_value(&score.edge_type)),
            html_escape(&display_value(&score.description)),
            html_escape(&display_value(&score.language)),
            html_escape(&display_value(&score.time)),
        ));
    }

    let mut shard_links = String::new();
    for key in &view.shards {
        let href = match shard_of_key(key) {
            Some(shard) => format!(
                "/dash/scores/{}/{}",
                encode_path_segment(task_of_key(key)),
                encode_path_segment(shard)
            ),
            None => continue,
        };
        shard_links.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>",
            html_escape(&href),
            html_escape(key)
        ));
    }

    let chart = if view.is_empty() {
        String::new()
    } else {
        format!(
            "<canvas id=\"scores\" height=\"120\"></canvas>\
<script src=\"https://cdn.jsdelivr.net/npm/chart.js\"></script>\
<script>\
const ids = {ids};\
const scores = {scores};\
const timestamps = {timestamps};\
new Chart(document.getElementById('scores'), {{\
type: 'line',\
data: {{ labels: ids, datasets: [{{ label: 'score', data: scores }}] }},\
options: {{ scales: {{ y: {{ suggestedMin: {min}, suggestedMax: {max} }} }},\
plugins: {{ tooltip: {{ callbacks: {{ footer: (items) => String(timestamps[items[0].dataIndex] ?? '') }} }} }} }}\
}});\
</script>",
            ids = script_json(&view.ids),
            scores = script_json(&view.scores),
            timestamps = script_json(&view.timestamps),
            min = view.min.unwrap_or_default(),
            max = view.max.unwrap_or_default(),
        )
    };

    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>{title}</title></head><body>\
<h1>{title}</h1>\
{summary}\
{chart}\
<table><thead><tr><th>id</th><th>user</th><th>score</th><th>edge type</th><th>description</th><th>language</th><th>time</th></tr></thead>\
<tbody>{rows}</tbody></table>\
<h2>Shards</h2><ul>{shard_links}</ul>\
</body></html>"
    )
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// JSON safe to embed in a `<script>` element.
fn script_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "null".to_string())
        .replace('<', "\\u003c")
}
