//! Data access for each entity, one repository per table.

mod categories;
mod recipes;
mod users;

pub use categories::CategoryRepository;
pub use recipes::RecipeRepository;
pub use users::UserRepository;
