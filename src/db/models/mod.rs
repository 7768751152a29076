//! Database models split into domain-specific modules.

pub mod category;
pub mod recipe;
pub mod user;

pub use category::*;
pub use recipe::*;
pub use user::*;
