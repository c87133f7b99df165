//! Structured validation errors
//!
//! Domain code describes a failed field with a [`ValidationErrorRecord`]:
//! an error type, a location path, a message template, the offending input
//! and optional context. [`translate`] turns records into the wire form
//! ([`TranslatedErrorRecord`]) by interpolating `{name}` placeholders in the
//! message from the context.
//!
//! A [`ValidationFailure`] bundles one or more translated records and renders
//! through the exception pipeline as a 422 response.
//!
//! # Example
//!
//! ```rust
//! use api_scaffold::loc;
//! use api_scaffold::validation::{ValidationErrorRecord, ValidationFailure};
//! use serde_json::json;
//!
//! let record = ValidationErrorRecord::value_error(
//!     loc!["body", "service_id"],
//!     "Service with ID {service_id} doesn't exist",
//!     json!(7),
//! )
//! .with_ctx("service_id", json!(7));
//!
//! let failure = ValidationFailure::new([record]).unwrap();
//! assert_eq!(failure.errors()[0].msg, "Service with ID 7 doesn't exist");
//! ```

use std::fmt;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, FromRequest, FromRequestParts, Query, Request},
    http::{header, request::Parts, StatusCode},
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::pipeline::{ApiError, HttpError};

/// Build a location path from string and integer segments
///
/// ```rust
/// use api_scaffold::loc;
/// use api_scaffold::validation::LocItem;
///
/// let path = loc!["body", "items", 0, "name"];
/// assert_eq!(path[2], LocItem::Index(0));
/// ```
#[macro_export]
macro_rules! loc {
    ($($segment:expr),* $(,)?) => {
        vec![$($crate::validation::LocItem::from($segment)),*]
    };
}

/// Category of a validation error
///
/// `missing` and `value_error` are the two kinds domain code raises most;
/// any other string is carried through unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorType {
    Missing,
    ValueError,
    Custom(String),
}

impl ErrorType {
    pub fn as_str(&self) -> &str {
        match self {
            ErrorType::Missing => "missing",
            ErrorType::ValueError => "value_error",
            ErrorType::Custom(name) => name,
        }
    }

    /// Context keys a message of this type cannot be rendered without
    pub fn required_context(&self) -> &'static [&'static str] {
        match self.as_str() {
            "greater_than_equal" => &["ge"],
            "less_than_equal" => &["le"],
            "greater_than" => &["gt"],
            "less_than" => &["lt"],
            "enum" => &["expected"],
            "string_too_short" | "too_short" => &["min_length"],
            "string_too_long" | "too_long" => &["max_length"],
            "multiple_of" => &["multiple_of"],
            _ => &[],
        }
    }
}

impl From<&str> for ErrorType {
    fn from(name: &str) -> Self {
        match name {
            "missing" => ErrorType::Missing,
            "value_error" => ErrorType::ValueError,
            other => ErrorType::Custom(other.to_string()),
        }
    }
}

impl From<String> for ErrorType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "missing" => ErrorType::Missing,
            "value_error" => ErrorType::ValueError,
            _ => ErrorType::Custom(name),
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(ErrorType::from)
    }
}

/// One segment of an error location path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocItem {
    Index(usize),
    Field(String),
}

impl From<&str> for LocItem {
    fn from(field: &str) -> Self {
        LocItem::Field(field.to_string())
    }
}

impl From<String> for LocItem {
    fn from(field: String) -> Self {
        LocItem::Field(field)
    }
}

impl From<usize> for LocItem {
    fn from(index: usize) -> Self {
        LocItem::Index(index)
    }
}

impl From<i32> for LocItem {
    fn from(index: i32) -> Self {
        match usize::try_from(index) {
            Ok(index) => LocItem::Index(index),
            Err(_) => LocItem::Field(index.to_string()),
        }
    }
}

impl fmt::Display for LocItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocItem::Index(index) => write!(f, "{index}"),
            LocItem::Field(field) => f.write_str(field),
        }
    }
}

fn display_loc(loc: &[LocItem]) -> String {
    loc.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// A validation error as raised by domain code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationErrorRecord {
    #[serde(rename = "type")]
    pub error_type: ErrorType,
    pub loc: Vec<LocItem>,
    /// Message template; `{name}` is replaced by `ctx[name]`
    pub msg: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctx: Option<Map<String, Value>>,
}

impl ValidationErrorRecord {
    pub fn new(
        error_type: impl Into<ErrorType>,
        loc: Vec<LocItem>,
        msg: impl Into<String>,
        input: Value,
    ) -> Self {
        Self {
            error_type: error_type.into(),
            loc,
            msg: msg.into(),
            input,
            ctx: None,
        }
    }

    /// A required field was not provided
    pub fn missing(loc: Vec<LocItem>, input: Value) -> Self {
        Self::new(ErrorType::Missing, loc, "Field required", input)
    }

    /// A provided value was rejected by domain rules
    pub fn value_error(loc: Vec<LocItem>, msg: impl Into<String>, input: Value) -> Self {
        Self::new(ErrorType::ValueError, loc, msg, input)
    }

    /// Add one context entry
    #[must_use]
    pub fn with_ctx(mut self, key: impl Into<String>, value: Value) -> Self {
        self.ctx
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    /// Replace the whole context map
    #[must_use]
    pub fn with_ctx_map(mut self, ctx: Map<String, Value>) -> Self {
        self.ctx = Some(ctx);
        self
    }
}

/// A validation error in its client-facing form
///
/// `msg` is fully interpolated; `ctx` is present exactly when the source
/// record carried one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedErrorRecord {
    #[serde(rename = "type")]
    pub error_type: String,
    pub loc: Vec<LocItem>,
    pub msg: String,
    #[serde(default)]
    pub input: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctx: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslationError {
    #[error("validation error `{error_type}` at `{loc}` has no context value for `{key}`")]
    MissingContext {
        error_type: String,
        loc: String,
        key: String,
    },

    #[error("a validation failure needs at least one error")]
    Empty,
}

/// Translate records to their wire form, preserving order
pub fn translate<I>(records: I) -> Result<Vec<TranslatedErrorRecord>, TranslationError>
where
    I: IntoIterator<Item = ValidationErrorRecord>,
{
    records.into_iter().map(translate_one).collect()
}

/// Translate a single record
pub fn translate_one(record: ValidationErrorRecord) -> Result<TranslatedErrorRecord, TranslationError> {
    let missing = |key: &str| TranslationError::MissingContext {
        error_type: record.error_type.to_string(),
        loc: display_loc(&record.loc),
        key: key.to_string(),
    };

    for key in record.error_type.required_context() {
        let present = record
            .ctx
            .as_ref()
            .is_some_and(|ctx| ctx.contains_key(*key));
        if !present {
            return Err(missing(*key));
        }
    }

    let msg = match &record.ctx {
        Some(ctx) => interpolate(&record.msg, ctx).map_err(|key| missing(&key))?,
        None => record.msg.clone(),
    };

    Ok(TranslatedErrorRecord {
        error_type: record.error_type.to_string(),
        loc: record.loc,
        msg,
        input: record.input,
        ctx: record.ctx,
    })
}

/// Replace `{name}` placeholders with context values
///
/// Braces that do not enclose an identifier are copied as-is. Returns the
/// name of the first placeholder without a context value.
fn interpolate(template: &str, ctx: &Map<String, Value>) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());

        if name_len > 0 && after[name_len..].starts_with('}') {
            let name = &after[..name_len];
            match ctx.get(name) {
                Some(Value::String(text)) => out.push_str(text),
                Some(other) => out.push_str(&other.to_string()),
                None => return Err(name.to_string()),
            }
            rest = &after[name_len + 1..];
        } else {
            out.push('{');
            rest = after;
        }
    }
    out.push_str(rest);
    Ok(out)
}

/// One or more translated field errors, rendered as a 422 response
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFailure {
    errors: Vec<TranslatedErrorRecord>,
}

impl ValidationFailure {
    /// Translate `records` into a failure
    ///
    /// Fails when no record is given or any record cannot be translated.
    pub fn new<I>(records: I) -> Result<Self, TranslationError>
    where
        I: IntoIterator<Item = ValidationErrorRecord>,
    {
        let errors = translate(records)?;
        if errors.is_empty() {
            return Err(TranslationError::Empty);
        }
        Ok(Self { errors })
    }

    pub fn single(record: ValidationErrorRecord) -> Result<Self, TranslationError> {
        Self::new([record])
    }

    pub fn errors(&self) -> &[TranslatedErrorRecord] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<TranslatedErrorRecord> {
        self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Never true for a constructed failure
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Append the errors of another failure, keeping order
    #[must_use]
    pub fn merge(mut self, other: ValidationFailure) -> Self {
        self.errors.extend(other.errors);
        self
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.errors.len();
        write!(
            f,
            "{count} validation error{}",
            if count == 1 { "" } else { "s" }
        )?;
        for error in &self.errors {
            write!(f, "; {}: {}", display_loc(&error.loc), error.msg)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationFailure {}

/// Turn a serde deserialization message into a validation record
///
/// serde reports absent fields as ``missing field `name` ``; those become
/// `missing` errors on `[location, name]`. Anything else is a `value_error`
/// on `[location]` carrying the message as context.
fn record_from_serde_message(location: &str, text: &str, input: Value) -> ValidationErrorRecord {
    const MISSING: &str = "missing field `";

    if let Some(start) = text.find(MISSING) {
        let tail = &text[start + MISSING.len()..];
        if let Some(end) = tail.find('`') {
            return ValidationErrorRecord::missing(loc![location, &tail[..end]], input);
        }
    }

    let detail = match text.rfind(" at line ") {
        Some(index) => &text[..index],
        None => text,
    };
    ValidationErrorRecord::value_error(loc![location], "Value error, {error}", input)
        .with_ctx("error", Value::String(detail.to_string()))
}

/// Map an axum query rejection onto the validation path
pub(crate) fn query_rejection(rejection: QueryRejection) -> ApiError {
    let record = record_from_serde_message("query", &rejection.body_text(), Value::Null);
    match ValidationFailure::single(record) {
        Ok(failure) => ApiError::Validation(failure),
        Err(err) => err.into(),
    }
}

/// Query-string extractor whose failures render as validation errors
///
/// Behaves like [`axum::extract::Query`], but a value that does not
/// deserialize produces a 422 envelope with structured `errors` instead of a
/// plain-text 400.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::try_from_uri(&parts.uri).map_err(query_rejection)?;
        Ok(ValidatedQuery(value))
    }
}

/// JSON body extractor whose failures render as validation errors
///
/// Requires `Content-Type: application/json` (or a `+json` suffix); a missing
/// or different content type is a declared 415. Syntax errors become
/// `json_invalid`; absent fields become `missing`; other data errors become
/// `value_error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

fn is_json_content_type(req: &Request) -> bool {
    let Some(content_type) = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
    else {
        return false;
    };
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || (essence.starts_with("application/") && essence.ends_with("+json"))
}

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_json_content_type(&req) {
            return Err(HttpError::new(StatusCode::UNSUPPORTED_MEDIA_TYPE)
                .with_detail("Expected request with `Content-Type: application/json`")
                .into());
        }

        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            ApiError::from(HttpError::new(rejection.status()).with_detail(rejection.body_text()))
        })?;

        match serde_json::from_slice::<T>(&bytes) {
            Ok(value) => Ok(ValidatedJson(value)),
            Err(err) => {
                let record = if err.is_syntax() || err.is_eof() {
                    ValidationErrorRecord::new(
                        "json_invalid",
                        loc!["body", err.column()],
                        "JSON decode error",
                        Value::Object(Map::new()),
                    )
                    .with_ctx("error", Value::String(err.to_string()))
                } else {
                    let input = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
                    record_from_serde_message("body", &err.to_string(), input)
                };
                Err(ValidationFailure::single(record)?.into())
            }
        }
    }
}
