//! Error-to-response pipeline
//!
//! Every failure a handler can produce is an [`ApiError`], one of three
//! kinds:
//!
//! - [`HttpError`]: a declared HTTP error with a status, an optional detail
//!   message and optional headers
//! - [`ValidationFailure`]: structured field errors, rendered as 422
//! - [`UnclassifiedFailure`]: anything else, rendered as a generic 500
//!
//! [`ExceptionPipeline`] turns each of them into the same JSON shape,
//! `{"success": false, "message": ...}`, plus `errors` for validation
//! failures and `traceback` for unclassified failures in diagnostic mode.
//!
//! # Example
//!
//! ```rust,no_run
//! use api_scaffold::envelope::Envelope;
//! use api_scaffold::pipeline::{ApiError, ExceptionPipeline};
//! use axum::{extract::Path, routing::get, Router};
//!
//! async fn get_user(Path(id): Path<u64>) -> Result<Envelope<String>, ApiError> {
//!     if id != 1 {
//!         return Err(ApiError::not_found(format!("User with ID {id} isn't found")));
//!     }
//!     Ok(Envelope::wrap("alice".to_string()))
//! }
//!
//! let app: Router = ExceptionPipeline::new(false)
//!     .install(Router::new().route("/users/{id}", get(get_user)));
//! ```

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use thiserror::Error;
use tower_http::catch_panic::CatchPanicLayer;

use crate::envelope::{envelope_response, Enveloped, ErrorEnvelope};
use crate::status;
use crate::validation::{TranslationError, ValidationFailure};

/// Largest raw framework error body read back when it gets re-enveloped
const RAW_BODY_LIMIT: usize = 64 * 1024;

/// Carries an unclassified failure to the response middleware so diagnostic
/// mode can re-render it with a traceback.
#[derive(Debug, Clone)]
struct DiagnosticDetail(Arc<UnclassifiedFailure>);

/// A declared HTTP error
///
/// The envelope message is `detail` when set, otherwise the status's standard
/// reason phrase.
#[derive(Debug, Clone)]
pub struct HttpError {
    status: StatusCode,
    detail: Option<String>,
    headers: HeaderMap,
}

impl HttpError {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            detail: None,
            headers: HeaderMap::new(),
        }
    }

    /// 400 with message "Bad request"
    pub fn bad_request() -> Self {
        Self::new(StatusCode::BAD_REQUEST).with_detail("Bad request")
    }

    /// 401 with message "Unauthorized"
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED).with_detail("Unauthorized")
    }

    /// 403 with message "Forbidden"
    pub fn forbidden() -> Self {
        Self::new(StatusCode::FORBIDDEN).with_detail("Forbidden")
    }

    /// 404 with message "Not Found"
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND).with_detail("Not Found")
    }

    /// 409 with message "Already exists"
    pub fn already_exists() -> Self {
        Self::new(StatusCode::CONFLICT).with_detail("Already exists")
    }

    /// 500 with message "Internal Server Error"
    ///
    /// Unlike an [`UnclassifiedFailure`], the message is always sent as-is.
    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR).with_detail("Internal Server Error")
    }

    /// Replace the envelope message
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Add a header to the response
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The message the envelope will carry
    pub fn message(&self) -> &str {
        self.detail
            .as_deref()
            .unwrap_or(status::lookup(self.status.as_u16()).default_message)
    }
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status.as_u16(), self.message())
    }
}

impl std::error::Error for HttpError {}

/// Any failure the handler did not classify
///
/// Holds the error text and a traceback: the error's source chain, followed
/// by a stack backtrace captured where the failure was converted when
/// `RUST_BACKTRACE` (or `RUST_LIB_BACKTRACE`) enables it. The traceback is
/// only ever sent to clients in diagnostic mode.
#[derive(Debug, Clone)]
pub struct UnclassifiedFailure {
    message: String,
    traceback: String,
}

impl UnclassifiedFailure {
    pub fn new(message: impl Into<String>) -> Self {
        let message = message.into();
        let traceback = format_traceback(&message, std::iter::empty());
        Self { message, traceback }
    }

    /// Capture an error together with its source chain
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let message = err.to_string();
        let traceback = format_traceback(&message, Sources(err.source()));
        Self { message, traceback }
    }

    /// Capture a panic payload caught by the panic layer
    pub fn from_panic(payload: Box<dyn Any + Send + 'static>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "handler panicked".to_string()
        };
        let traceback = format_traceback(&format!("panicked: {message}"), std::iter::empty());
        Self { message, traceback }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn traceback(&self) -> &str {
        &self.traceback
    }
}

impl fmt::Display for UnclassifiedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for UnclassifiedFailure {}

impl From<anyhow::Error> for UnclassifiedFailure {
    fn from(err: anyhow::Error) -> Self {
        let message = err.to_string();
        let traceback = format_traceback(&message, err.chain().skip(1));
        Self { message, traceback }
    }
}

struct Sources<'a>(Option<&'a (dyn std::error::Error + 'static)>);

impl<'a> Iterator for Sources<'a> {
    type Item = &'a (dyn std::error::Error + 'static);

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.0?;
        self.0 = current.source();
        Some(current)
    }
}

fn format_traceback<'a, I>(message: &str, causes: I) -> String
where
    I: Iterator<Item = &'a (dyn std::error::Error + 'static)>,
{
    let mut out = format!("Error: {message}\n");
    for (index, cause) in causes.enumerate() {
        if index == 0 {
            out.push_str("\nCaused by:\n");
        }
        out.push_str(&format!("    {index}: {cause}\n"));
    }
    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        out.push_str("\nStack backtrace:\n");
        out.push_str(&backtrace.to_string());
    }
    out
}

/// Error type returned by handlers and extractors
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error(transparent)]
    Unclassified(#[from] UnclassifiedFailure),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        HttpError::bad_request().with_detail(message).into()
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        HttpError::unauthorized().with_detail(message).into()
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        HttpError::forbidden().with_detail(message).into()
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        HttpError::not_found().with_detail(message).into()
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        HttpError::already_exists().with_detail(message).into()
    }

    pub fn internal(message: impl Into<String>) -> Self {
        HttpError::internal().with_detail(message).into()
    }

    /// Declared error with the status's standard message
    pub fn status(status: StatusCode) -> Self {
        HttpError::new(status).into()
    }

    /// HTTP status the error renders with
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Http(err) => err.status(),
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Unclassified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn log(&self) {
        match self {
            ApiError::Http(err) if err.status().is_server_error() => {
                tracing::error!(status = err.status().as_u16(), "Declared error: {}", err.message());
            }
            ApiError::Http(err) => {
                tracing::debug!(status = err.status().as_u16(), "Declared error: {}", err.message());
            }
            ApiError::Validation(failure) => {
                tracing::debug!(errors = failure.len(), "Validation failure: {failure}");
            }
            ApiError::Unclassified(failure) => {
                tracing::error!(
                    traceback = %failure.traceback(),
                    "Unclassified failure: {}", failure.message()
                );
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Unclassified(err.into())
    }
}

impl From<TranslationError> for ApiError {
    fn from(err: TranslationError) -> Self {
        ApiError::Unclassified(UnclassifiedFailure::from_error(&err))
    }
}

impl From<crate::Error> for ApiError {
    fn from(err: crate::Error) -> Self {
        ApiError::Unclassified(UnclassifiedFailure::from_error(&err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log();
        ExceptionPipeline::default().render(&self)
    }
}

/// Renders [`ApiError`]s into error envelopes
///
/// `diagnostic` controls whether unclassified failures expose their error
/// text and traceback. It is fixed when the pipeline is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExceptionPipeline {
    diagnostic: bool,
}

impl ExceptionPipeline {
    pub const fn new(diagnostic: bool) -> Self {
        Self { diagnostic }
    }

    pub fn is_diagnostic(&self) -> bool {
        self.diagnostic
    }

    /// The error envelope for an error
    pub fn body(&self, err: &ApiError) -> ErrorEnvelope {
        match err {
            ApiError::Http(err) => {
                let descriptor = status::lookup(err.status().as_u16());
                let envelope = ErrorEnvelope::from_descriptor(descriptor);
                match err.detail() {
                    Some(detail) if !detail.is_empty() => envelope.with_message(detail),
                    _ => envelope,
                }
            }
            ApiError::Validation(failure) => ErrorEnvelope::validation(failure.errors().to_vec()),
            ApiError::Unclassified(failure) => self.unclassified_body(failure),
        }
    }

    fn unclassified_body(&self, failure: &UnclassifiedFailure) -> ErrorEnvelope {
        if self.diagnostic {
            ErrorEnvelope::new(format!("Error: {}", failure.message()))
                .with_traceback(failure.traceback())
        } else {
            ErrorEnvelope::from_descriptor(status::lookup(500))
        }
    }

    /// Render an error into a complete response
    pub fn render(&self, err: &ApiError) -> Response {
        let mut response = envelope_response(err.status_code(), self.body(err));
        match err {
            ApiError::Http(err) => {
                let headers = response.headers_mut();
                for (name, value) in err.headers() {
                    headers.append(name.clone(), value.clone());
                }
            }
            ApiError::Unclassified(failure) => {
                response
                    .extensions_mut()
                    .insert(DiagnosticDetail(Arc::new(failure.clone())));
            }
            ApiError::Validation(_) => {}
        }
        response
    }

    /// Render a panic caught while running a handler
    pub fn render_panic(&self, payload: Box<dyn Any + Send + 'static>) -> Response {
        let failure = UnclassifiedFailure::from_panic(payload);
        tracing::error!(
            traceback = %failure.traceback(),
            "Handler panicked: {}", failure.message()
        );
        self.render(&ApiError::Unclassified(failure))
    }

    /// Install the pipeline on a router
    ///
    /// Adds a panic catcher and a response middleware that applies
    /// diagnostic rendering and rewrites raw framework error responses
    /// (unmatched routes, wrong methods, extractor rejections) into error
    /// envelopes. Call this after all routes are added.
    pub fn install<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router
            .layer(CatchPanicLayer::custom(move |payload: Box<dyn Any + Send + 'static>| {
                self.render_panic(payload)
            }))
            .layer(middleware::from_fn_with_state(self, normalize_response))
    }

    async fn envelop_raw(&self, response: Response) -> Response {
        let (parts, body) = response.into_parts();

        let is_text = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("text/plain"));
        let text = if is_text {
            match axum::body::to_bytes(body, RAW_BODY_LIMIT).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).trim().to_string(),
                Err(_) => String::new(),
            }
        } else {
            String::new()
        };

        let mut err = HttpError::new(parts.status);
        if !text.is_empty() {
            err = err.with_detail(text);
        }
        for (name, value) in &parts.headers {
            if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
                err = err.with_header(name.clone(), value.clone());
            }
        }

        let err = ApiError::Http(err);
        err.log();
        self.render(&err)
    }
}

async fn normalize_response(
    State(pipeline): State<ExceptionPipeline>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;

    if let Some(DiagnosticDetail(failure)) = response.extensions_mut().remove::<DiagnosticDetail>() {
        if pipeline.is_diagnostic() {
            let (mut parts, _) = response.into_parts();
            parts.headers.remove(header::CONTENT_LENGTH);
            let fresh = envelope_response(parts.status, pipeline.unclassified_body(&failure));
            let (fresh_parts, body) = fresh.into_parts();
            parts.headers.extend(fresh_parts.headers);
            return Response::from_parts(parts, body);
        }
        return response;
    }

    let status = response.status();
    let is_error = status.is_client_error() || status.is_server_error();
    if is_error && response.extensions().get::<Enveloped>().is_none() {
        return pipeline.envelop_raw(response).await;
    }
    response
}

/// Fallback handler producing the 404 envelope
///
/// Routers wrapped by [`ExceptionPipeline::install`] already envelope the
/// framework's default 404; this handler is for routers that set an explicit
/// fallback.
pub async fn not_found_fallback() -> ApiError {
    ApiError::status(StatusCode::NOT_FOUND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loc;
    use crate::validation::ValidationErrorRecord;
    use serde_json::json;

    fn body(pipeline: ExceptionPipeline, err: &ApiError) -> serde_json::Value {
        serde_json::to_value(pipeline.body(err)).unwrap()
    }

    #[test]
    fn test_http_error_with_detail() {
        let err = ApiError::not_found("User with ID 12 isn't found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            body(ExceptionPipeline::default(), &err),
            json!({"success": false, "message": "User with ID 12 isn't found"})
        );
    }

    #[test]
    fn test_http_error_default_phrase() {
        let err = ApiError::status(StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            body(ExceptionPipeline::default(), &err),
            json!({"success": false, "message": "Method Not Allowed"})
        );
    }

    #[test]
    fn test_convenience_constructors() {
        let cases = [
            (HttpError::bad_request(), 400, "Bad request"),
            (HttpError::unauthorized(), 401, "Unauthorized"),
            (HttpError::forbidden(), 403, "Forbidden"),
            (HttpError::not_found(), 404, "Not Found"),
            (HttpError::already_exists(), 409, "Already exists"),
            (HttpError::internal(), 500, "Internal Server Error"),
        ];
        for (err, code, message) in cases {
            assert_eq!(err.status().as_u16(), code);
            assert_eq!(err.message(), message);
        }
    }

    #[test]
    fn test_validation_body() {
        let failure = ValidationFailure::single(ValidationErrorRecord::missing(
            loc!["body", "name"],
            json!({}),
        ))
        .unwrap();
        let err = ApiError::from(failure);
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body(ExceptionPipeline::default(), &err),
            json!({
                "success": false,
                "message": "Validation error",
                "errors": [{
                    "type": "missing",
                    "loc": ["body", "name"],
                    "msg": "Field required",
                    "input": {}
                }]
            })
        );
    }

    #[test]
    fn test_unclassified_hides_details() {
        let err = ApiError::from(anyhow::anyhow!("database exploded"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body(ExceptionPipeline::new(false), &err),
            json!({"success": false, "message": "Internal Server Error"})
        );
    }

    #[test]
    fn test_unclassified_diagnostic() {
        let err = ApiError::from(anyhow::anyhow!("database exploded").context("loading user"));
        let envelope = ExceptionPipeline::new(true).body(&err);
        assert!(!envelope.success);
        assert_eq!(envelope.message, "Error: loading user");
        let traceback = envelope.traceback.unwrap();
        assert!(traceback.contains("Caused by:"));
        assert!(traceback.contains("database exploded"));
    }

    #[test]
    fn test_traceback_backtrace_follows_environment() {
        let failure = UnclassifiedFailure::new("disk full");
        assert!(failure.traceback().starts_with("Error: disk full\n"));

        let enabled = Backtrace::capture().status() == BacktraceStatus::Captured;
        assert_eq!(failure.traceback().contains("Stack backtrace:"), enabled);
    }

    #[test]
    fn test_translation_error_is_unclassified() {
        let err = ApiError::from(TranslationError::Empty);
        assert!(matches!(err, ApiError::Unclassified(_)));
    }

    #[test]
    fn test_from_panic_payloads() {
        assert_eq!(UnclassifiedFailure::from_panic(Box::new("boom")).message(), "boom");
        assert_eq!(
            UnclassifiedFailure::from_panic(Box::new(String::from("owned"))).message(),
            "owned"
        );
        assert_eq!(
            UnclassifiedFailure::from_panic(Box::new(42_u8)).message(),
            "handler panicked"
        );
    }

    #[test]
    fn test_render_copies_headers() {
        let err = ApiError::from(
            HttpError::unauthorized().with_header(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static("Bearer"),
            ),
        );
        let response = ExceptionPipeline::default().render(&err);
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
        assert!(response.extensions().get::<Enveloped>().is_some());
    }
}
