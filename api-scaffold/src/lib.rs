//! # api-scaffold
//!
//! Response conventions for JSON APIs built on axum.
//!
//! ## Features
//!
//! - **Envelopes**: every success body is `{success, message, data}`; lists
//!   add `data.list` and a `pagination` object
//! - **Status registry**: every assigned HTTP status maps to its canonical
//!   `{success, message}` envelope
//! - **Error pipeline**: declared HTTP errors, validation failures and
//!   unclassified failures (including panics) all render as
//!   `{success: false, message, ...}`
//! - **Validation errors**: structured `{type, loc, msg, input, ctx}` records
//!   with `{name}` message interpolation
//! - **Pagination and sorting**: query extractors with validated parameters
//!   and page metadata computation
//!
//! ## Example
//!
//! ```rust,no_run
//! use api_scaffold::prelude::*;
//! use std::result::Result;
//! use serde::Serialize;
//!
//! #[derive(Clone, Serialize)]
//! struct User {
//!     name: String,
//!     age: u32,
//! }
//!
//! struct UserSort;
//!
//! impl SortFields for UserSort {
//!     const FIELDS: &'static [&'static str] = &["name", "age"];
//! }
//!
//! async fn list_users(
//!     Pagination(params): Pagination,
//!     sort: Sort<UserSort>,
//! ) -> ListEnvelope<User> {
//!     let users = vec![User { name: "Alice".to_string(), age: 30 }];
//!     tracing::debug!(order = ?sort.order_by_clause(), "listing users");
//!     ListEnvelope::from_list(users, 1, params, None)
//! }
//!
//! async fn get_user(Path(id): Path<u64>) -> Result<Envelope<Keyed<User>>, ApiError> {
//!     Err(ApiError::not_found(format!("User with ID {id} isn't found")))
//! }
//!
//! #[tokio::main]
//! async fn main() -> api_scaffold::Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let app = Router::new()
//!         .route("/users", get(list_users))
//!         .route("/users/{id}", get(get_user));
//!     let app = Scaffold::new(&config).install(app);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod envelope;
pub mod error;
pub mod observability;
pub mod pagination;
pub mod pipeline;
pub mod scaffold;
pub mod sorting;
pub mod status;
pub mod validation;

pub use error::{Error, Result};
pub use scaffold::Scaffold;

/// Common imports for handlers
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::envelope::{BaseEnvelope, Envelope, ErrorEnvelope, Keyed, ListEnvelope};
    pub use crate::error::{Error, Result};
    pub use crate::loc;
    pub use crate::observability::init_tracing;
    pub use crate::pagination::{Pagination, PaginationInfo, PaginationParams};
    pub use crate::pipeline::{ApiError, ExceptionPipeline, HttpError, UnclassifiedFailure};
    pub use crate::scaffold::Scaffold;
    pub use crate::sorting::{Sort, SortFields, SortOrder, SortParamsSpec, SortSpec};
    pub use crate::status::{descriptors_for, StatusDescriptor};
    pub use crate::validation::{
        ErrorType, LocItem, ValidatedJson, ValidatedQuery, ValidationErrorRecord,
        ValidationFailure,
    };

    pub use axum::{
        extract::{Path, State},
        routing::{delete, get, patch, post, put},
        Json, Router,
    };
}
