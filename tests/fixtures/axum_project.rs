// Axum test fixture - router chains, nesting and extractors
#![api_server(url = "https://users.example.com", description = "Production")]

use axum::{
    extract::{Path, Query},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u32,
    pub display_name: String,
    #[validate(email)]
    pub email: String,
    pub manager: Option<Box<User>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(required, length(min = 2, max = 64))]
    pub name: Option<String>,
    #[validate(required, email)]
    pub email: Option<String>,
    #[validate(range(min = 18, max = 130))]
    pub age: u8,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<i32>,
    pub limit: Option<i32>,
}

async fn get_users(Query(query): Query<ListQuery>) -> Json<Vec<User>> {
    Json(vec![])
}

async fn get_user(Path(id): Path<u32>) -> Result<Json<User>, AppError> {
    Err(AppError::NotFound)
}

async fn create_user(Json(payload): Json<CreateUserRequest>) -> Json<User> {
    todo!()
}

async fn update_user(
    Path(id): Path<u32>,
    Json(payload): Json<UpdateUserRequest>,
) -> Json<User> {
    todo!()
}

async fn delete_user(Path(id): Path<u32>) {}

async fn health_check() -> &'static str {
    "OK"
}

pub fn create_router() -> Router {
    let user_routes = Router::new()
        .route("/", get(get_users).post(create_user))
        .route("/:id", get(get_user).put(update_user).delete(delete_user));

    Router::new()
        .nest("/api/v1/users", user_routes)
        .route("/health", get(health_check))
}
