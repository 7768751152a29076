//! Who may change what. Pure decisions over role and ownership.

use serde::Serialize;

use crate::db::{Recipe, Role};

/// The authenticated caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Categories are curated by admins.
pub fn can_create_category(role: Role) -> bool {
    role.is_admin()
}

/// Only admins may set a recipe's `approved` and `active` flags.
pub fn can_moderate_recipe(role: Role) -> bool {
    role.is_admin()
}

/// Owner or admin.
pub fn can_mutate_recipe(actor_id: &str, actor_role: Role, recipe: &Recipe) -> bool {
    recipe.can_edit(actor_id, actor_role)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::RecipeRow;

    fn recipe_by(author_id: &str) -> Recipe {
        Recipe::from(RecipeRow {
            id: "r1".to_string(),
            title: "Soup".to_string(),
            description: String::new(),
            ingredients: "water".to_string(),
            steps: "boil".to_string(),
            prep_time: None,
            servings: 1,
            difficulty: "medium".to_string(),
            category_id: "c1".to_string(),
            author_id: author_id.to_string(),
            approved: 0,
            active: 1,
            view_count: 0,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
            category_name: "Soups".to_string(),
            category_active: 1,
            author_name: "Ana".to_string(),
            author_active: 1,
            average_rating: 0.0,
            rating_count: 0,
        })
    }

    #[test]
    fn test_admin_only_decisions() {
        assert!(can_create_category(Role::Admin));
        assert!(!can_create_category(Role::Regular));
        assert!(can_moderate_recipe(Role::Admin));
        assert!(!can_moderate_recipe(Role::Regular));
    }

    #[test]
    fn test_owner_or_admin_may_mutate() {
        let recipe = recipe_by("owner");
        assert!(can_mutate_recipe("owner", Role::Regular, &recipe));
        assert!(can_mutate_recipe("moderator", Role::Admin, &recipe));
        assert!(!can_mutate_recipe("stranger", Role::Regular, &recipe));
    }
}
