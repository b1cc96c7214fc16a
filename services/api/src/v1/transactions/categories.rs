use axum::Json;
use postgres_models::models::Category;
use serde_json::{Map, Value};

/// Category → allowed sub-categories, in display form.
pub async fn handler() -> Json<Map<String, Value>> {
    let taxonomy = Category::ALL
        .iter()
        .map(|category| {
            let subs = category
                .sub_categories()
                .iter()
                .map(|sub| Value::from(sub.as_str()))
                .collect();
            (category.as_str().to_string(), Value::Array(subs))
        })
        .collect();
    Json(taxonomy)
}
