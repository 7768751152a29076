mod admin;
pub mod auth;
mod categories;
pub mod error;
mod recipes;
mod validation;

use axum::{
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/password", put(auth::change_password));

    // Handlers that need a caller take an `Actor` extractor
    let api_routes = Router::new()
        // Categories
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/:id",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        // Recipes
        .route(
            "/recipes",
            get(recipes::search_recipes).post(recipes::create_recipe),
        )
        .route(
            "/recipes/:id",
            get(recipes::get_recipe)
                .put(recipes::update_recipe)
                .delete(recipes::delete_recipe),
        )
        // Admin
        .route("/admin/recipes", get(admin::list_recipes))
        .route("/admin/users", get(admin::list_users));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes)
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "UP" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthService, JwtTokens, LoginPolicy, SecretHasher};
    use crate::config::Config;
    use crate::db::{connect_in_memory, UserRepository};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    struct PlainHasher;

    impl SecretHasher for PlainHasher {
        fn hash(&self, secret: &str) -> crate::error::Result<String> {
            Ok(format!("plain:{}", secret))
        }

        fn verify(&self, secret: &str, digest: &str) -> bool {
            digest == format!("plain:{}", secret)
        }
    }

    struct TestApp {
        router: Router,
        state: Arc<AppState>,
    }

    impl TestApp {
        async fn new() -> Self {
            let db = connect_in_memory().await.unwrap();
            let auth = AuthService::new(
                UserRepository::new(db.clone()),
                Arc::new(PlainHasher),
                Arc::new(JwtTokens::new("router-test")),
                LoginPolicy::default(),
            );
            let state = Arc::new(AppState::with_auth(Config::default(), db, auth));
            Self {
                router: create_router(state.clone()),
                state,
            }
        }

        async fn send(
            &self,
            method: &str,
            uri: &str,
            token: Option<&str>,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder().method(method).uri(uri);
            if let Some(token) = token {
                builder = builder.header("Authorization", format!("Bearer {}", token));
            }
            let request = match body {
                Some(body) => builder
                    .header("Content-Type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };

            let response = self.router.clone().oneshot(request).await.unwrap();
            let status = response.status();
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            let json = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap()
            };
            (status, json)
        }

        async fn register(&self, email: &str) -> String {
            let (status, body) = self
                .send(
                    "POST",
                    "/api/auth/register",
                    None,
                    Some(json!({ "name": "Cook", "email": email, "password": "secret1" })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            body["token"].as_str().unwrap().to_string()
        }

        async fn admin(&self) -> String {
            self.state
                .auth
                .ensure_admin("root@example.com", "Root", "admin-secret")
                .await
                .unwrap();
            let (status, body) = self
                .send(
                    "POST",
                    "/api/auth/login",
                    None,
                    Some(json!({ "email": "root@example.com", "password": "admin-secret" })),
                )
                .await;
            assert_eq!(status, StatusCode::OK);
            body["token"].as_str().unwrap().to_string()
        }

        async fn category(&self, admin: &str, name: &str) -> String {
            let (status, body) = self
                .send(
                    "POST",
                    "/api/categories",
                    Some(admin),
                    Some(json!({ "name": name })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            body["id"].as_str().unwrap().to_string()
        }
    }

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new().await;
        let (status, body) = app.send("GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "UP");
    }

    #[tokio::test]
    async fn test_register_validation_and_login() {
        let app = TestApp::new().await;

        let (status, body) = app
            .send(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({ "name": "", "email": "nope", "password": "123" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "validation_error");
        assert!(body["error"]["details"]["password"].is_array());

        app.register("cook@example.com").await;
        let (status, _) = app
            .send(
                "POST",
                "/api/auth/register",
                None,
                Some(json!({ "name": "Cook", "email": "COOK@example.com", "password": "secret1" })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = app
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": "cook@example.com", "password": "secret1" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["user"]["role"], "regular");
        assert!(body["user"].get("password_hash").is_none());

        let (status, body) = app
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": "cook@example.com", "password": "wrong1" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Invalid credentials");

        let (status, _) = app
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": "ghost@example.com", "password": "secret1" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_lockout_is_forbidden() {
        let app = TestApp::new().await;
        app.register("cook@example.com").await;

        for _ in 0..5 {
            app.send(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": "cook@example.com", "password": "wrong1" })),
            )
            .await;
        }
        let (status, body) = app
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": "cook@example.com", "password": "secret1" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_category_writes_are_admin_only() {
        let app = TestApp::new().await;
        let cook = app.register("cook@example.com").await;
        let admin = app.admin().await;

        let (status, _) = app
            .send("POST", "/api/categories", None, Some(json!({ "name": "Soups" })))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app
            .send(
                "POST",
                "/api/categories",
                Some(&cook),
                Some(json!({ "name": "Soups" })),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let id = app.category(&admin, "Soups").await;
        let (status, _) = app
            .send(
                "POST",
                "/api/categories",
                Some(&admin),
                Some(json!({ "name": "Soups" })),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = app.send("GET", "/api/categories", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, _) = app
            .send("PUT", &format!("/api/categories/{}", id), Some(&admin), Some(json!({})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let uri = format!("/api/categories/{}", id);
        let (status, _) = app.send("DELETE", &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = app.send("DELETE", &uri, Some(&admin), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app.send("GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_recipe_moderation_flow() {
        let app = TestApp::new().await;
        let cook = app.register("cook@example.com").await;
        let other = app.register("other@example.com").await;
        let admin = app.admin().await;
        let category_id = app.category(&admin, "Desserts").await;

        let (status, body) = app
            .send(
                "POST",
                "/api/recipes",
                Some(&cook),
                Some(json!({
                    "title": "Chocolate mousse",
                    "ingredients": "chocolate, eggs",
                    "steps": "whisk, chill",
                    "category_id": category_id,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["approved"], false);
        assert_eq!(body["servings"], 1);
        assert_eq!(body["difficulty"], "medium");
        let uri = format!("/api/recipes/{}", body["id"].as_str().unwrap());

        // Pending recipes are invisible to the public
        let (_, page) = app.send("GET", "/api/recipes?search=mousse", None, None).await;
        assert_eq!(page["total"], 0);
        let (status, _) = app.send("GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // The author cannot approve their own recipe
        let (status, body) = app
            .send(
                "PUT",
                &uri,
                Some(&cook),
                Some(json!({ "approved": true, "servings": 4 })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["approved"], false);
        assert_eq!(body["servings"], 4);

        let (status, _) = app
            .send("PUT", &uri, Some(&other), Some(json!({ "title": "Mine now" })))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, queue) = app.send("GET", "/api/admin/recipes", Some(&admin), None).await;
        assert_eq!(queue["total"], 1);

        let (status, body) = app
            .send("PUT", &uri, Some(&admin), Some(json!({ "approved": true })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["approved"], true);

        let (_, page) = app
            .send("GET", "/api/recipes?search=MOUSSE&page=1&limit=5", None, None)
            .await;
        assert_eq!(page["total"], 1);
        assert_eq!(page["totalPages"], 1);
        assert_eq!(page["hasNext"], false);

        let (status, body) = app.send("GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["view_count"], 1);
        assert_eq!(body["category_name"], "Desserts");

        let (status, _) = app.send("DELETE", &uri, Some(&other), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = app.send("DELETE", &uri, Some(&cook), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = app.send("DELETE", &uri, Some(&cook), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_recipe_validation_and_inactive_category() {
        let app = TestApp::new().await;
        let cook = app.register("cook@example.com").await;
        let admin = app.admin().await;
        let category_id = app.category(&admin, "Breads").await;

        let (status, body) = app
            .send(
                "POST",
                "/api/recipes",
                Some(&cook),
                Some(json!({
                    "title": "",
                    "ingredients": "flour",
                    "steps": "",
                    "servings": 0,
                    "category_id": category_id,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let details = &body["error"]["details"];
        assert!(details["title"].is_array());
        assert!(details["steps"].is_array());
        assert!(details["servings"].is_array());

        app.send(
            "DELETE",
            &format!("/api/categories/{}", category_id),
            Some(&admin),
            None,
        )
        .await;
        let (status, _) = app
            .send(
                "POST",
                "/api/recipes",
                Some(&cook),
                Some(json!({
                    "title": "Sourdough",
                    "ingredients": "flour, water",
                    "steps": "wait",
                    "category_id": category_id,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_admin_user_listing() {
        let app = TestApp::new().await;
        let cook = app.register("cook@example.com").await;
        let admin = app.admin().await;

        let (status, _) = app.send("GET", "/api/admin/users", Some(&cook), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, page) = app
            .send("GET", "/api/admin/users?role=regular", Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["total"], 1);
        assert_eq!(page["items"][0]["email"], "cook@example.com");
        assert!(page["items"][0].get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_change_password() {
        let app = TestApp::new().await;
        let cook = app.register("cook@example.com").await;

        let (status, _) = app
            .send(
                "PUT",
                "/api/auth/password",
                Some(&cook),
                Some(json!({ "current_password": "wrong1", "new_password": "fresh-secret" })),
            )
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = app
            .send(
                "PUT",
                "/api/auth/password",
                Some(&cook),
                Some(json!({ "current_password": "secret1", "new_password": "fresh-secret" })),
            )
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = app
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(json!({ "email": "cook@example.com", "password": "fresh-secret" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }
}
