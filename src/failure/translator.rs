//! Failure translation
//!
//! Turns a [`Failure`] plus the originating request path into the uniform
//! HTML error page returned to clients.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;

use super::{Failure, FAILURE_CONTENT_TYPE};
use crate::logger;

/// Placeholder shown when a failure carries no cause
const NO_CAUSE: &str = "none";

/// Convert a failure into a response for the given request path
pub fn translate(failure: &Failure, path: &str) -> Response<Full<Bytes>> {
    let body = render(failure, path);

    Response::builder()
        .status(failure.status_code())
        .header("Content-Type", FAILURE_CONTENT_TYPE)
        .header("Content-Length", body.len())
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|e| {
            logger::log_error(&format!("Failed to build failure response: {e}"));
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = failure.status_code();
            response
        })
}

/// Render the failure page body.
///
/// Output depends only on the inputs, so rendering the same failure twice
/// yields identical bytes.
pub fn render(failure: &Failure, path: &str) -> String {
    let cause = failure.cause().unwrap_or(NO_CAUSE);
    format!(
        "<p><h3>Request to end point {} failed with status code {}</h3></br>\n\
         <h4>The internal server error was:</h4></br>\n\
         {}</br>\n\
         <h4>The internal exception (if any) was:</h4></br>\n\
         {}</p>",
        escape_html(path),
        failure.status_code().as_u16(),
        escape_html(failure.message()),
        escape_html(cause),
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use hyper::StatusCode;

    #[test]
    fn test_render_contains_all_parts() {
        let failure = Failure::not_found("author 999 not found").with_cause("no such row");
        let body = render(&failure, "/authorById/999");

        assert!(body.contains("/authorById/999"));
        assert!(body.contains("404"));
        assert!(body.contains("author 999 not found"));
        assert!(body.contains("no such row"));
    }

    #[test]
    fn test_render_without_cause_uses_placeholder() {
        let failure = Failure::status(StatusCode::NOT_FOUND);
        let body = render(&failure, "/deleteAuthorByIdFails/1");
        assert!(body.contains("(if any) was:</h4></br>\nnone</p>"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let failure = Failure::internal("boom").with_cause("because");
        assert_eq!(render(&failure, "/x"), render(&failure, "/x"));
    }

    #[test]
    fn test_render_escapes_markup() {
        let failure = Failure::internal("<script>alert('x')</script>");
        let body = render(&failure, "/a&b");
        assert!(!body.contains("<script>"));
        assert!(body.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt;"));
        assert!(body.contains("/a&amp;b"));
    }

    #[tokio::test]
    async fn test_translate_sets_status_and_content_type() {
        let failure = Failure::internal("validation failed");
        let response = translate(&failure, "/addNewAuthor");

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get("Content-Type").unwrap(),
            FAILURE_CONTENT_TYPE
        );

        let first = response.into_body().collect().await.unwrap().to_bytes();
        let second = translate(&failure, "/addNewAuthor")
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes();
        assert_eq!(first, second);
    }
}
