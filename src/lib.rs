pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod policy;

pub use db::DbPool;

use auth::AuthService;
use config::Config;
use db::{CategoryRepository, RecipeRepository, UserRepository};

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub users: UserRepository,
    pub categories: CategoryRepository,
    pub recipes: RecipeRepository,
    pub auth: AuthService,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let users = UserRepository::new(db.clone());
        let auth = AuthService::from_config(users, &config.auth);
        Self::with_auth(config, db, auth)
    }

    /// Use a prebuilt authentication service
    pub fn with_auth(config: Config, db: DbPool, auth: AuthService) -> Self {
        Self {
            users: UserRepository::new(db.clone()),
            categories: CategoryRepository::new(db.clone()),
            recipes: RecipeRepository::new(db.clone()),
            auth,
            config,
            db,
        }
    }
}
