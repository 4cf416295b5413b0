//! Media type negotiation module
//!
//! Checks a request's `Content-Type` against what a route consumes and its
//! `Accept` header against what a route produces.

/// Strip parameters and whitespace: `"application/json; charset=utf-8"` -> `"application/json"`
pub fn essence(media_type: &str) -> &str {
    media_type.split(';').next().unwrap_or("").trim()
}

/// Whether the request content type satisfies the route's `consumes` type
pub fn content_type_matches(content_type: Option<&str>, consumes: &str) -> bool {
    content_type.is_some_and(|ct| essence(ct).eq_ignore_ascii_case(essence(consumes)))
}

/// Whether an `Accept` header allows the route's `produces` type.
///
/// A missing header accepts everything. Supports `*/*` and `type/*` ranges.
pub fn accepts(accept: Option<&str>, produces: &str) -> bool {
    let Some(accept) = accept else {
        return true;
    };
    let produces = essence(produces);
    let produced_type = produces.split('/').next().unwrap_or("");

    accept.split(',').map(essence).any(|range| {
        if range == "*/*" || range.eq_ignore_ascii_case(produces) {
            return true;
        }
        range
            .strip_suffix("/*")
            .is_some_and(|t| t.eq_ignore_ascii_case(produced_type))
    })
}
