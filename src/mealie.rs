//! HTTP client for a Mealie-compatible recipe service.
//!
//! Used to pull a recipe's ingredient list into the food catalog and to
//! verify the stored credentials. Failures never escape as faults: the
//! credential check returns an error value, and recipe fetches fold every
//! failure into [`RecipeImport::Error`].

use serde::Deserialize;

use crate::models::normalize_item_name;

/// Outcome of fetching a recipe's ingredients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipeImport {
    /// The recipe exists but has no usable ingredient names
    Empty,
    /// Normalized, deduplicated ingredient names
    Success(Vec<String>),
    /// Network, status, or deserialization failure
    Error(Option<String>),
}

/// Errors from the credential check.
#[derive(Debug)]
pub enum MealieError {
    /// Request failed before a response arrived
    RequestError(String),
    /// Server answered with a non-success status
    StatusError(u16),
}

impl std::fmt::Display for MealieError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MealieError::RequestError(e) => write!(f, "Request failed: {}", e),
            MealieError::StatusError(code) => write!(f, "Server returned status {}", code),
        }
    }
}

impl std::error::Error for MealieError {}

// Wire types, shaped after the Mealie API responses
#[derive(Deserialize)]
struct UserResponse {
    username: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecipeResponse {
    #[serde(default)]
    recipe_ingredient: Vec<RecipeIngredient>,
}

#[derive(Deserialize)]
struct RecipeIngredient {
    food: Option<IngredientFood>,
}

#[derive(Deserialize)]
struct IngredientFood {
    name: Option<String>,
}

/// Appends a trailing slash unless the URL already ends with one or is empty.
pub fn ensure_trailing_slash(url: &str) -> String {
    if url.is_empty() || url.ends_with('/') {
        url.to_string()
    } else {
        format!("{}/", url)
    }
}

pub struct MealieClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl MealieClient {
    /// Creates a client for the given base URL and API token. The base URL
    /// is normalized to end with a trailing slash.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: ensure_trailing_slash(&base_url.into()),
            token: token.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Returns the base URL in use.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Verifies the stored credentials by fetching the authenticated user.
    /// Success yields the username; any failure is generic.
    pub async fn check_credentials(&self) -> Result<String, MealieError> {
        let url = format!("{}api/users/self", self.base_url);

        let response = self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await
            .map_err(|e| MealieError::RequestError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MealieError::StatusError(response.status().as_u16()));
        }

        let user: UserResponse = response
            .json()
            .await
            .map_err(|e| MealieError::RequestError(e.to_string()))?;

        Ok(user.username)
    }

    /// Fetches a recipe by slug and extracts its ingredient food names:
    /// blanks filtered out, duplicates removed, each name normalized with
    /// the catalog capitalization rule.
    pub async fn fetch_recipe_ingredients(&self, slug: &str) -> RecipeImport {
        let url = format!("{}api/recipes/{}", self.base_url, slug);

        let response = match self
            .http
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return RecipeImport::Error(Some(e.to_string())),
        };

        if !response.status().is_success() {
            return RecipeImport::Error(Some(format!(
                "Server returned status {}",
                response.status()
            )));
        }

        let recipe: RecipeResponse = match response.json().await {
            Ok(recipe) => recipe,
            Err(e) => return RecipeImport::Error(Some(e.to_string())),
        };

        let names = extract_ingredient_names(recipe);
        if names.is_empty() {
            RecipeImport::Empty
        } else {
            RecipeImport::Success(names)
        }
    }
}

fn extract_ingredient_names(recipe: RecipeResponse) -> Vec<String> {
    let mut names = Vec::new();
    for ingredient in recipe.recipe_ingredient {
        let Some(raw) = ingredient.food.and_then(|f| f.name) else {
            continue;
        };
        let name = normalize_item_name(&raw);
        if name.is_empty() || names.contains(&name) {
            continue;
        }
        names.push(name);
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_trailing_slash() {
        assert_eq!(ensure_trailing_slash(""), "");
        assert_eq!(ensure_trailing_slash("withSlash/"), "withSlash/");
        assert_eq!(ensure_trailing_slash("withoutSlash"), "withoutSlash/");
    }

    #[test]
    fn test_client_normalizes_base_url() {
        let client = MealieClient::new("https://recipes.example.com", "token");
        assert_eq!(client.base_url(), "https://recipes.example.com/");

        let client = MealieClient::new("https://recipes.example.com/", "token");
        assert_eq!(client.base_url(), "https://recipes.example.com/");
    }

    #[test]
    fn test_extract_ingredient_names_filters_and_dedupes() {
        let recipe: RecipeResponse = serde_json::from_str(
            r#"{
                "recipeIngredient": [
                    {"food": {"name": "chickpeas"}},
                    {"food": {"name": "  "}},
                    {"food": {"name": "CHICKPEAS"}},
                    {"food": null},
                    {"food": {"name": null}},
                    {"food": {"name": "tahini"}}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(
            extract_ingredient_names(recipe),
            vec!["Chickpeas".to_string(), "Tahini".to_string()]
        );
    }

    #[test]
    fn test_extract_ingredient_names_empty_recipe() {
        let recipe: RecipeResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(extract_ingredient_names(recipe).is_empty());
    }
}
