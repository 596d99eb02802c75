pub(crate) mod auth;
pub(crate) mod dashboard;
pub(crate) mod handlers;
pub(crate) mod request_tracing;
pub(crate) mod response_contract;

/// Percent-encodes one URL path segment, keeping RFC 3986 unreserved bytes.
#[must_use]
pub(crate) fn encode_path_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for b in segment.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            out.push(char::from(b));
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}
