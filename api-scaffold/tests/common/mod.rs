#![allow(dead_code)]

use axum::body::Body;
use axum::extract::Path;
use axum::http::{header, HeaderMap, HeaderValue, Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower::ServiceExt;

use api_scaffold::envelope::{BaseEnvelope, Envelope, Keyed, ListEnvelope};
use api_scaffold::loc;
use api_scaffold::pagination::{Pagination, PaginationDefaults};
use api_scaffold::pipeline::{ApiError, HttpError};
use api_scaffold::sorting::{Sort, SortFields, SortSpec};
use api_scaffold::validation::{
    ErrorType, ValidatedJson, ValidatedQuery, ValidationErrorRecord, ValidationFailure,
};
use api_scaffold::Scaffold;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub age: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub country: String,
    pub city: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserData {
    pub user: User,
    pub address: Address,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub host: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub service: Service,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    #[serde(default)]
    pub start: i64,
    #[serde(default)]
    pub end: i64,
    #[serde(default = "default_app")]
    pub app: String,
}

fn default_app() -> String {
    "default".to_string()
}

pub struct UserSort;

impl SortFields for UserSort {
    const FIELDS: &'static [&'static str] = &["name", "age"];
}

async fn get_user(Path(user_id): Path<u64>) -> Envelope<UserData> {
    Envelope::wrap(UserData {
        user: User {
            name: format!("Name {user_id}"),
            age: 22,
        },
        address: Address {
            country: "Russia".to_string(),
            city: "Sochi".to_string(),
        },
    })
}

async fn create_user(ValidatedJson(user): ValidatedJson<User>) -> Envelope<Keyed<User>> {
    Envelope::single_keyed("user", user)
        .with_message("User created")
        .with_status(StatusCode::CREATED)
}

async fn list_users(Pagination(params): Pagination, _sort: Sort<UserSort>) -> ListEnvelope<User> {
    let users = vec![
        User {
            name: "Name".to_string(),
            age: 20,
        },
        User {
            name: "Name 2".to_string(),
            age: 22,
        },
    ];
    ListEnvelope::from_list(users, 12, params, Some("Custom response message".to_string()))
}

async fn sorted(sort: Sort<UserSort>) -> Envelope<SortSpec> {
    Envelope::wrap(sort.into_inner())
}

async fn http_error() -> Result<Envelope<Keyed<User>>, ApiError> {
    Err(ApiError::not_found("User with ID 12 isn't found"))
}

async fn unauthorized() -> Result<Envelope<()>, ApiError> {
    Err(HttpError::unauthorized()
        .with_header(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"))
        .into())
}

async fn uncaught_error(ValidatedJson(_user): ValidatedJson<User>) -> Result<Envelope<Keyed<User>>, ApiError> {
    Err(anyhow::anyhow!("Some error").into())
}

async fn conflict_envelope() -> BaseEnvelope {
    BaseEnvelope::for_status(409).with_message("Email already taken")
}

async fn panicking() -> Envelope<()> {
    panic!("handler blew up");
}

async fn raw_rejection() -> impl IntoResponse {
    (StatusCode::BAD_REQUEST, "plain framework text")
}

async fn raw_json_error() -> impl IntoResponse {
    (StatusCode::CONFLICT, axum::Json(json!({"custom": true})))
}

async fn create_user_with_service(
    ValidatedQuery(query): ValidatedQuery<RangeQuery>,
    ValidatedJson(user): ValidatedJson<CreateUser>,
) -> Result<Envelope<Keyed<CreateUser>>, ApiError> {
    let service_id = user.service.id;
    let id_loc = || loc!["body", "user", "service", "id"];

    let record = match service_id {
        0 => Some(
            ValidationErrorRecord::value_error(
                id_loc(),
                "Service with ID {service_id} doesn't exist",
                json!(service_id),
            )
            .with_ctx("service_id", json!(service_id)),
        ),
        1 => Some(ValidationErrorRecord::value_error(
            id_loc(),
            format!("Service with ID {service_id} doesn't exist"),
            json!(service_id),
        )),
        2 => Some(ValidationErrorRecord::value_error(
            id_loc(),
            "Service with this ID doesn't exist",
            json!(service_id),
        )),
        _ if user.name.is_empty() => Some(ValidationErrorRecord::new(
            ErrorType::Missing,
            loc!["body", "user", "name"],
            "Missing user name",
            json!(user.name),
        )),
        _ if query.app != "default" => Some(ValidationErrorRecord::value_error(
            loc!["query", "app"],
            "App doesn't exist (accepts only 'default')",
            json!(query.app),
        )),
        _ if query.start > query.end => Some(ValidationErrorRecord::value_error(
            loc!["query"],
            format!("Start {} more than end {}", query.start, query.end),
            json!([query.start, query.end]),
        )),
        _ => None,
    };

    if let Some(record) = record {
        return Err(ValidationFailure::single(record)?.into());
    }

    Ok(Envelope::single_keyed("user", user))
}

/// Router mirroring a small user service, with the scaffold installed
pub fn build_app(debug: bool) -> Router {
    build_app_with(Scaffold::with_debug(debug))
}

pub fn build_app_with(scaffold: Scaffold) -> Router {
    let router = Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{user_id}", get(get_user))
        .route("/sorted", get(sorted))
        .route("/errors/http", get(http_error))
        .route("/errors/unauthorized", get(unauthorized))
        .route("/errors/uncaught", post(uncaught_error))
        .route("/errors/panic", get(panicking))
        .route("/errors/raw", get(raw_rejection))
        .route("/errors/raw-json", get(raw_json_error))
        .route("/errors/envelope", get(conflict_envelope))
        .route("/validation/users", post(create_user_with_service));

    scaffold.install(router)
}

pub fn capped_app(max_per_page: u32) -> Router {
    build_app_with(Scaffold::with_debug(false).pagination(PaginationDefaults {
        per_page: 10,
        max_per_page: Some(max_per_page),
    }))
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_raw(uri: &str, content_type: Option<&str>, body: &'static str) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder.body(Body::from(body)).unwrap()
}

/// Send a request and return status, headers and the parsed JSON body
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    (status, headers, json)
}
