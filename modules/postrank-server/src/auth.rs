use axum::http::{header, HeaderMap};

use postrank_common::PostRankError;

/// Alternate header for schedulers that cannot set `Authorization`.
pub const JOB_SECRET_HEADER: &str = "x-job-secret";

/// The secret presented by the caller, from `Authorization: Bearer <secret>`
/// or the `x-job-secret` header.
pub fn presented_secret(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);

    bearer
        .or_else(|| {
            headers
                .get(JOB_SECRET_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
        })
        .filter(|s| !s.is_empty())
}

/// Check the caller's secret against the configured one.
pub fn authorize(headers: &HeaderMap, expected: &str) -> Result<(), PostRankError> {
    match presented_secret(headers) {
        Some(given)
            if !expected.is_empty() && constant_time_eq(given.as_bytes(), expected.as_bytes()) =>
        {
            Ok(())
        }
        _ => Err(PostRankError::Unauthorized),
    }
}

/// Constant-time comparison to prevent timing attacks.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
