use std::{
    borrow::Cow,
    collections::HashSet,
    sync::OnceLock,
};

use regex::Regex;
use serde::Deserialize;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    constants::{
        FORBIDDEN_USERNAMES, MIN_COOKING_TIME, MIN_INGREDIENT_AMOUNT, RECIPE_NAME_MAX_LENGTH,
    },
    error::{Error, FieldErrors},
    schema::Id,
};

const REQUIRED: &str = "This field is required.";

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pattern compiles"))
}

fn username_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^[\w.@+-]+\z")
}

fn color_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^#[0-9a-fA-F]{6}$")
}

fn slug_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"^[-a-zA-Z0-9_]+$")
}

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::from(message));
    error
}

pub fn validate_required(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(field_error("required", REQUIRED));
    }
    Ok(())
}

pub fn validate_username(value: &str) -> Result<(), ValidationError> {
    validate_required(value)?;
    if !username_regex().is_match(value) {
        return Err(field_error(
            "invalid",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    if FORBIDDEN_USERNAMES.contains(&value) {
        return Err(field_error("forbidden", "This username is not allowed."));
    }
    Ok(())
}

pub fn validate_color(value: &str) -> Result<(), ValidationError> {
    if !color_regex().is_match(value) {
        return Err(field_error("invalid", "Enter a valid hex color, eg. #49B64E."));
    }
    Ok(())
}

pub fn validate_slug(value: &str) -> Result<(), ValidationError> {
    if !slug_regex().is_match(value) {
        return Err(field_error(
            "invalid",
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
        ));
    }
    Ok(())
}

/// Flattens `validator` errors into the `{"field": ["message"]}` shape.
pub fn into_field_errors(errors: ValidationErrors) -> Error {
    let mut fields = FieldErrors::new();
    for (field, kinds) in errors.field_errors() {
        let messages = kinds
            .iter()
            .map(|e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value ({})", e.code))
            })
            .collect();
        fields.insert(field.to_string(), messages);
    }
    Error::validation(fields)
}

pub trait ValidateForm: Validate + Sized {
    fn validated(self) -> Result<Self, Error> {
        self.validate().map_err(into_field_errors)?;
        Ok(self)
    }
}

impl<T: Validate> ValidateForm for T {}

#[derive(Deserialize, Validate, Debug)]
pub struct RegisterForm {
    #[serde(default)]
    #[validate(custom(function = "validate_required"))]
    #[validate(email(message = "Enter a valid email address."))]
    #[validate(length(max = 254, message = "Ensure this field has no more than 254 characters."))]
    pub email: String,

    #[serde(default)]
    #[validate(custom(function = "validate_username"))]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub username: String,

    #[serde(default)]
    #[validate(custom(function = "validate_required"))]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub first_name: String,

    #[serde(default)]
    #[validate(custom(function = "validate_required"))]
    #[validate(length(max = 150, message = "Ensure this field has no more than 150 characters."))]
    pub last_name: String,

    #[serde(default)]
    #[validate(length(min = 8, message = "This password is too short. It must contain at least 8 characters."))]
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize, Validate, Debug)]
pub struct SetPasswordForm {
    #[serde(default)]
    #[validate(length(min = 8, message = "This password is too short. It must contain at least 8 characters."))]
    pub new_password: String,
    #[serde(default)]
    #[validate(custom(function = "validate_required"))]
    pub current_password: String,
}

#[derive(Deserialize, Validate, Debug)]
pub struct TagForm {
    #[serde(default)]
    #[validate(custom(function = "validate_required"))]
    #[validate(length(max = 128, message = "Ensure this field has no more than 128 characters."))]
    pub name: String,
    #[serde(default)]
    #[validate(custom(function = "validate_color"))]
    pub color: String,
    #[serde(default)]
    #[validate(custom(function = "validate_slug"))]
    #[validate(length(max = 25, message = "Ensure this field has no more than 25 characters."))]
    pub slug: String,
}

#[derive(Deserialize, Validate, Debug, Clone)]
pub struct IngredientForm {
    #[serde(default)]
    #[validate(custom(function = "validate_required"))]
    #[validate(length(max = 128, message = "Ensure this field has no more than 128 characters."))]
    pub name: String,
    #[serde(default)]
    #[validate(custom(function = "validate_required"))]
    #[validate(length(max = 12, message = "Ensure this field has no more than 12 characters."))]
    pub measurement_unit: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct IngredientAmountForm {
    pub id: Id,
    pub amount: Option<i32>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct RecipeForm {
    pub ingredients: Option<Vec<IngredientAmountForm>>,
    pub tags: Option<Vec<Id>>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Update,
}

/// A recipe payload that passed every check not needing the database.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeChanges {
    pub ingredients: Vec<(Id, i32)>,
    pub tags: Vec<Id>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
}

fn push(errors: &mut FieldErrors, field: &str, message: &str) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.to_string());
}

fn finish(errors: FieldErrors) -> Result<(), Error> {
    match errors.is_empty() {
        true => Ok(()),
        false => Err(Error::validation(errors)),
    }
}

fn has_duplicates(ids: impl Iterator<Item = Id>) -> bool {
    let mut seen = HashSet::new();
    ids.into_iter().any(|id| !seen.insert(id))
}

impl RecipeForm {
    /// Tags and ingredients are mandatory in both modes; the scalar fields only on create.
    pub fn validate(self, mode: FormMode) -> Result<RecipeChanges, Error> {
        let mut errors = FieldErrors::new();
        let required = mode == FormMode::Create;

        let ingredients = match self.ingredients {
            None => {
                push(&mut errors, "ingredients", REQUIRED);
                vec![]
            }
            Some(list) if list.is_empty() => {
                push(&mut errors, "ingredients", "At least one ingredient is required.");
                vec![]
            }
            Some(list) => {
                if list
                    .iter()
                    .any(|i| i.amount.unwrap_or(0) < MIN_INGREDIENT_AMOUNT)
                {
                    push(&mut errors, "amount", "Ingredient amount must be at least 1.");
                }
                if has_duplicates(list.iter().map(|i| i.id)) {
                    push(&mut errors, "ingredients", "Ingredients must be unique.");
                }
                list.into_iter()
                    .map(|i| (i.id, i.amount.unwrap_or(0)))
                    .collect()
            }
        };

        let tags = match self.tags {
            None => {
                push(&mut errors, "tags", REQUIRED);
                vec![]
            }
            Some(list) if list.is_empty() => {
                push(&mut errors, "tags", "At least one tag is required.");
                vec![]
            }
            Some(list) => {
                if has_duplicates(list.iter().copied()) {
                    push(&mut errors, "tags", "Tags must be unique.");
                }
                list
            }
        };

        match &self.name {
            None if required => push(&mut errors, "name", REQUIRED),
            Some(name) if name.trim().is_empty() => push(&mut errors, "name", REQUIRED),
            Some(name) if name.chars().count() > RECIPE_NAME_MAX_LENGTH => push(
                &mut errors,
                "name",
                "Ensure this field has no more than 200 characters.",
            ),
            _ => {}
        }

        match &self.text {
            None if required => push(&mut errors, "text", REQUIRED),
            Some(text) if text.trim().is_empty() => push(&mut errors, "text", REQUIRED),
            _ => {}
        }

        match self.cooking_time {
            None if required => push(&mut errors, "cooking_time", REQUIRED),
            Some(time) if time < MIN_COOKING_TIME => push(
                &mut errors,
                "cooking_time",
                "Ensure this value is greater than or equal to 1.",
            ),
            _ => {}
        }

        match &self.image {
            None if required => push(&mut errors, "image", REQUIRED),
            Some(image) if image.trim().is_empty() => push(&mut errors, "image", REQUIRED),
            _ => {}
        }

        finish(errors)?;

        Ok(RecipeChanges {
            ingredients,
            tags,
            image: self.image,
            name: self.name,
            text: self.text,
            cooking_time: self.cooking_time,
        })
    }
}
