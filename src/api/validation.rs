//! Input validation for API requests.
//!
//! Each validator returns `Err(message)` for the caller to attach to a
//! field via `ValidationErrorBuilder`.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Loose email shape: something@something.tld, no whitespace
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

pub const MIN_PASSWORD_LEN: usize = 6;
const MAX_TITLE_LEN: usize = 255;
const MAX_CATEGORY_NAME_LEN: usize = 255;
const MAX_CATEGORY_DESCRIPTION_LEN: usize = 500;

pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name is required".to_string());
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<(), String> {
    let len = title.trim().chars().count();
    if len == 0 {
        return Err("Title is required".to_string());
    }
    if len > MAX_TITLE_LEN {
        return Err(format!("Title is too long (max {} characters)", MAX_TITLE_LEN));
    }
    Ok(())
}

/// Free-text fields that may not be blank (ingredients, steps).
pub fn validate_required_text(value: &str, label: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", label));
    }
    Ok(())
}

pub fn validate_servings(servings: i64) -> Result<(), String> {
    if servings < 1 {
        return Err("Servings must be at least 1".to_string());
    }
    Ok(())
}

pub fn validate_prep_time(prep_time: Option<i64>) -> Result<(), String> {
    match prep_time {
        Some(minutes) if minutes < 0 => Err("Preparation time cannot be negative".to_string()),
        _ => Ok(()),
    }
}

pub fn validate_category_name(name: &str) -> Result<(), String> {
    let len = name.trim().chars().count();
    if len == 0 {
        return Err("Category name is required".to_string());
    }
    if len > MAX_CATEGORY_NAME_LEN {
        return Err(format!(
            "Category name is too long (max {} characters)",
            MAX_CATEGORY_NAME_LEN
        ));
    }
    Ok(())
}

pub fn validate_category_description(description: &str) -> Result<(), String> {
    if description.trim().chars().count() > MAX_CATEGORY_DESCRIPTION_LEN {
        return Err(format!(
            "Description is too long (max {} characters)",
            MAX_CATEGORY_DESCRIPTION_LEN
        ));
    }
    Ok(())
}
