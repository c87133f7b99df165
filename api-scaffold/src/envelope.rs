//! Response envelopes
//!
//! Every response body, success or error, is a JSON object with a `success`
//! flag and a human-readable `message`. Success bodies carry the payload in
//! `data`; list bodies nest the items under `data.list` and add a sibling
//! `pagination` object.
//!
//! # Example
//!
//! ```rust
//! use api_scaffold::envelope::{Envelope, ListEnvelope};
//! use api_scaffold::pagination::PaginationParams;
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct User {
//!     name: String,
//! }
//!
//! // {"success": true, "message": "Data retrieved successfully", "data": {"name": "Alice"}}
//! let single = Envelope::wrap(User { name: "Alice".to_string() });
//! assert!(single.success);
//!
//! // {"success": true, "message": "...", "data": {"user": {"name": "Bob"}}}
//! let keyed = Envelope::single_keyed("user", User { name: "Bob".to_string() });
//! assert_eq!(keyed.data.key(), "user");
//!
//! // Paginated list
//! let users = vec![User { name: "Alice".to_string() }];
//! let list = ListEnvelope::from_list(users, 12, PaginationParams::new(1, 10), None);
//! assert_eq!(list.pagination.total_pages(), 2);
//! ```

use std::borrow::Cow;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};

use crate::pagination::{PaginationInfo, PaginationParams};
use crate::status;
use crate::validation::TranslatedErrorRecord;

/// Message used by data envelopes unless overridden
pub const DEFAULT_SUCCESS_MESSAGE: &str = "Data retrieved successfully";

/// Message used by the bare error envelope
pub const DEFAULT_ERROR_MESSAGE: &str = "Error";

/// Message used by validation error envelopes
pub const VALIDATION_ERROR_MESSAGE: &str = "Validation error";

fn default_status() -> StatusCode {
    StatusCode::OK
}

/// Marks responses whose body is already an envelope
///
/// The response middleware leaves marked responses alone, whatever their
/// status.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Enveloped;

/// Serialize an envelope and mark the response as enveloped
///
/// A body that fails to serialize comes back as axum's plain-text 500 and
/// stays unmarked, so the middleware still envelopes it.
pub(crate) fn envelope_response<B: Serialize>(status: StatusCode, body: B) -> Response {
    let mut response = (status, Json(body)).into_response();
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .is_some_and(|value| value == "application/json");
    if is_json {
        response.extensions_mut().insert(Enveloped);
    }
    response
}

/// The bare `{success, message}` envelope
///
/// The default value (`success = true`, empty message) is the base every
/// other envelope extends; it is the only envelope allowed an empty message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseEnvelope {
    /// Whether the request succeeded
    pub success: bool,
    /// Human-readable outcome
    pub message: String,
    #[serde(skip, default = "default_status")]
    status: StatusCode,
}

impl Default for BaseEnvelope {
    fn default() -> Self {
        Self {
            success: true,
            message: String::new(),
            status: StatusCode::OK,
        }
    }
}

impl BaseEnvelope {
    /// Create an envelope with an explicit flag and message
    pub fn new(success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            message: message.into(),
            status: StatusCode::OK,
        }
    }

    /// The documented envelope for a status code
    ///
    /// ```rust
    /// use api_scaffold::envelope::BaseEnvelope;
    ///
    /// let created = BaseEnvelope::for_status(201);
    /// assert!(created.success);
    /// assert_eq!(created.message, "Created");
    /// ```
    pub fn for_status(code: u16) -> Self {
        let descriptor = status::lookup(code);
        Self {
            success: descriptor.is_success,
            message: descriptor.default_message.to_string(),
            status: StatusCode::from_u16(code).unwrap_or_else(|_| descriptor.status_code()),
        }
    }

    /// Override the message
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// The HTTP status this envelope is sent with
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for BaseEnvelope {
    fn into_response(self) -> Response {
        envelope_response(self.status, self)
    }
}

/// Success envelope carrying a single payload in `data`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Always true for envelopes built through [`Envelope::wrap`]
    pub success: bool,
    /// Human-readable outcome
    pub message: String,
    /// The payload
    pub data: T,
    #[serde(skip, default = "default_status")]
    status: StatusCode,
}

impl<T> Envelope<T> {
    /// Wrap a payload with the default success message and a 200 status
    ///
    /// ```rust
    /// use api_scaffold::envelope::{Envelope, DEFAULT_SUCCESS_MESSAGE};
    ///
    /// let envelope = Envelope::wrap(42);
    /// assert!(envelope.success);
    /// assert_eq!(envelope.message, DEFAULT_SUCCESS_MESSAGE);
    /// assert_eq!(envelope.data, 42);
    /// ```
    pub fn wrap(data: T) -> Self {
        Self {
            success: true,
            message: DEFAULT_SUCCESS_MESSAGE.to_string(),
            data,
            status: StatusCode::OK,
        }
    }

    /// Override the success message
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Send the envelope with a different 2xx status (e.g. 201 Created)
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// The HTTP status this envelope is sent with
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Map the payload to a new type, keeping message and status
    pub fn map<U, F>(self, f: F) -> Envelope<U>
    where
        F: FnOnce(T) -> U,
    {
        Envelope {
            success: self.success,
            message: self.message,
            data: f(self.data),
            status: self.status,
        }
    }

    /// Consume the envelope and return the payload
    pub fn into_data(self) -> T {
        self.data
    }
}

impl<T> Envelope<Keyed<T>> {
    /// Wrap a payload under a single named field inside `data`
    ///
    /// ```rust
    /// use api_scaffold::envelope::Envelope;
    ///
    /// let envelope = Envelope::single_keyed("user", "alice");
    /// let json = serde_json::to_value(&envelope).unwrap();
    /// assert_eq!(json["data"]["user"], "alice");
    /// ```
    pub fn single_keyed(key: impl Into<Cow<'static, str>>, payload: T) -> Self {
        Envelope::wrap(Keyed::new(key, payload))
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        envelope_response(self.status, self)
    }
}

/// A payload nested under one semantic key
///
/// Serializes as a single-entry JSON object: `{"<key>": <value>}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyed<T> {
    key: Cow<'static, str>,
    value: T,
}

impl<T> Keyed<T> {
    pub fn new(key: impl Into<Cow<'static, str>>, value: T) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

impl<T: Serialize> Serialize for Keyed<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.key.as_ref(), &self.value)?;
        map.end()
    }
}

/// The `data` object of a list envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListData<T> {
    /// Items in source order
    pub list: Vec<T>,
}

/// Success envelope carrying one page of items plus pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListEnvelope<T> {
    pub success: bool,
    pub message: String,
    pub data: ListData<T>,
    pub pagination: PaginationInfo,
    #[serde(skip, default = "default_status")]
    status: StatusCode,
}

impl<T> ListEnvelope<T> {
    /// Build a paginated list response
    ///
    /// `items` is placed at `data.list` unchanged: no filtering, no
    /// deduplication. It may be shorter than `per_page` (last page) or empty
    /// (empty result or a page past the end). `message` replaces the default
    /// success message when given.
    ///
    /// ```rust
    /// use api_scaffold::envelope::ListEnvelope;
    /// use api_scaffold::pagination::PaginationParams;
    ///
    /// let page: ListEnvelope<u32> =
    ///     ListEnvelope::from_list(vec![], 0, PaginationParams::new(1, 10), None);
    /// assert!(page.data.list.is_empty());
    /// assert_eq!(page.pagination.total_pages(), 0);
    /// assert_eq!(page.pagination.next_page(), None);
    /// ```
    pub fn from_list(
        items: Vec<T>,
        total_count: u64,
        params: PaginationParams,
        message: Option<String>,
    ) -> Self {
        let pagination = PaginationInfo::compute(params.page, params.per_page, total_count);
        Self {
            success: true,
            message: message.unwrap_or_else(|| DEFAULT_SUCCESS_MESSAGE.to_string()),
            data: ListData { list: items },
            pagination,
            status: StatusCode::OK,
        }
    }

    /// Override the success message
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Send the envelope with a different 2xx status
    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// The HTTP status this envelope is sent with
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Items on the current page
    pub fn items(&self) -> &[T] {
        &self.data.list
    }

    /// Number of items on the current page
    pub fn len(&self) -> usize {
        self.data.list.len()
    }

    /// Whether the current page is empty
    pub fn is_empty(&self) -> bool {
        self.data.list.is_empty()
    }

    /// Map each item to a new type, keeping order, pagination and message
    pub fn map<U, F>(self, f: F) -> ListEnvelope<U>
    where
        F: FnMut(T) -> U,
    {
        ListEnvelope {
            success: self.success,
            message: self.message,
            data: ListData {
                list: self.data.list.into_iter().map(f).collect(),
            },
            pagination: self.pagination,
            status: self.status,
        }
    }
}

impl<T: Serialize> IntoResponse for ListEnvelope<T> {
    fn into_response(self) -> Response {
        envelope_response(self.status, self)
    }
}

/// Error envelope: `{success: false, message, errors?, traceback?}`
///
/// Built by the exception pipeline; `errors` is present only for validation
/// failures and `traceback` only in diagnostic mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<TranslatedErrorRecord>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traceback: Option<String>,
}

impl Default for ErrorEnvelope {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_MESSAGE)
    }
}

impl ErrorEnvelope {
    /// Plain error envelope with the given message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            errors: None,
            traceback: None,
        }
    }

    /// Validation error envelope carrying translated field errors
    pub fn validation(errors: Vec<TranslatedErrorRecord>) -> Self {
        Self {
            errors: Some(errors),
            ..Self::new(VALIDATION_ERROR_MESSAGE)
        }
    }

    /// Envelope for a status descriptor
    ///
    /// Keeps the descriptor's success flag so a declared error always
    /// reports what the registry says about its code.
    pub fn from_descriptor(descriptor: &status::StatusDescriptor) -> Self {
        Self {
            success: descriptor.is_success,
            ..Self::new(descriptor.default_message)
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub fn with_traceback(mut self, traceback: impl Into<String>) -> Self {
        self.traceback = Some(traceback.into());
        self
    }
}
