// SPDX-License-Identifier: Apache-2.0

use crate::AppState;
use axum::http::HeaderMap;
use std::sync::atomic::Ordering;

const MAX_REQUEST_ID_BYTES: usize = 128;

#[must_use]
pub(crate) fn make_request_id(state: &AppState) -> String {
    let id = state.request_id_seed.fetch_add(1, Ordering::Relaxed);
    format!("req-{id:016x}")
}

/// Caller-supplied `x-request-id` when usable, otherwise a fresh one.
#[must_use]
pub(crate) fn propagated_request_id(headers: &HeaderMap, state: &AppState) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.len() <= MAX_REQUEST_ID_BYTES)
        .map_or_else(|| make_request_id(state), ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use scorekeep_store::MemoryBackend;
    use std::sync::Arc;

    fn state() -> AppState {
        AppState::new(Arc::new(MemoryBackend::new()))
    }

    #[test]
    fn propagates_caller_request_id() {
        let mut headers = HeaderMap::new();
        headers.insert("x-request-id", HeaderValue::from_static(" req-abc "));
        assert_eq!(propagated_request_id(&headers, &state()), "req-abc");
    }

    #[test]
    fn generates_sequential_ids_when_missing() {
        let state = state();
        let headers = HeaderMap::new();
        assert_eq!(
            propagated_request_id(&headers, &state),
            "req-0000000000000001"
        );
        assert_eq!(make_request_id(&state), "req-0000000000000002");
    }
}
