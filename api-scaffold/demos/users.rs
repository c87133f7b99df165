//! Small user service showing every scaffold convention.
//!
//! ```sh
//! SCAFFOLD_SERVICE__DEBUG=true cargo run --example users
//! curl 'localhost:8080/users?page=2&per_page=1&sort_by=age&sort_order=asc'
//! curl localhost:8080/users/12
//! ```

use api_scaffold::prelude::*;
use std::result::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Clone, Serialize, Deserialize)]
struct User {
    name: String,
    age: u32,
}

struct UserSort;

impl SortFields for UserSort {
    const FIELDS: &'static [&'static str] = &["name", "age"];
}

fn users() -> Vec<User> {
    vec![
        User {
            name: "Ada".to_string(),
            age: 36,
        },
        User {
            name: "Grace".to_string(),
            age: 45,
        },
        User {
            name: "Linus".to_string(),
            age: 21,
        },
    ]
}

async fn list_users(Pagination(params): Pagination, sort: Sort<UserSort>) -> ListEnvelope<User> {
    let mut all = users();
    match sort.field() {
        Some("age") => all.sort_by_key(|u| u.age),
        _ => all.sort_by(|a, b| a.name.cmp(&b.name)),
    }
    if !sort.is_ascending() {
        all.reverse();
    }

    let total = all.len() as u64;
    let page = all
        .into_iter()
        .skip(params.offset() as usize)
        .take(params.limit() as usize)
        .collect();
    ListEnvelope::from_list(page, total, params, None)
}

async fn get_user(Path(id): Path<usize>) -> Result<Envelope<Keyed<User>>, ApiError> {
    users()
        .into_iter()
        .nth(id)
        .map(|user| Envelope::single_keyed("user", user))
        .ok_or_else(|| ApiError::not_found(format!("User with ID {id} isn't found")))
}

async fn create_user(ValidatedJson(user): ValidatedJson<User>) -> Result<Envelope<Keyed<User>>, ApiError> {
    if users().iter().any(|u| u.name == user.name) {
        let record = ValidationErrorRecord::value_error(
            loc!["body", "name"],
            "User {name} already exists",
            json!(user.name),
        )
        .with_ctx("name", json!(user.name));
        return Err(ValidationFailure::single(record)?.into());
    }
    Ok(Envelope::single_keyed("user", user).with_status(axum::http::StatusCode::CREATED))
}

async fn explode() -> Result<Envelope<()>, ApiError> {
    Err(anyhow::anyhow!("connection pool exhausted").into())
}

#[tokio::main]
async fn main() -> api_scaffold::Result<()> {
    let config = Config::load_for_service("users")?;
    init_tracing(&config)?;

    let app = Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/{id}", get(get_user))
        .route("/explode", get(explode));
    let app = Scaffold::new(&config).install(app);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
