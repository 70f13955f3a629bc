// Actix-Web test fixture - a scoped controller with self-referencing and generic types
use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct Category {
    pub id: u64,
    #[validate(not_blank, length(max = 40))]
    pub name: String,
    pub parent: Option<Box<Category>>,
    pub children: Vec<Category>,
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

#[derive(Debug, Deserialize)]
pub struct CategoryFilter {
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Hidden,
}

pub struct CategoryController;

#[scope("/categories")]
impl CategoryController {
    #[get("")]
    async fn list_categories(
        &self,
        filter: Option<web::Query<CategoryFilter>>,
    ) -> web::Json<Page<Category>> {
        todo!()
    }

    #[get("/{id}")]
    async fn get_category_by_id(&self, id: web::Path<u64>) -> web::Json<Category> {
        todo!()
    }

    #[post("")]
    async fn create_category(&self, category: web::Json<Category>) -> web::Json<Category> {
        todo!()
    }

    #[route("/{id}/visibility", method = "PUT")]
    async fn set_visibility(&self, id: web::Path<u64>, visibility: web::Json<Visibility>) {}

    #[delete("/{id}")]
    async fn remove_category(&self, id: web::Path<u64>) -> impl Responder {
        HttpResponse::NoContent()
    }

    fn audit(&self) {}
}
