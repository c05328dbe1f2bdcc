use sqlx::{Postgres, QueryBuilder};

use crate::{
    error::{Error, FieldErrors},
    schema::Id,
};

/// Raw query string pairs, in request order. Keys may repeat (`?tags=a&tags=b`).
#[derive(Debug, Clone, Default)]
pub struct QueryPairs {
    inner: Vec<(String, String)>,
}

impl QueryPairs {
    pub fn new(inner: Vec<(String, String)>) -> Self {
        Self { inner }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.inner
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Builds a link to another page, keeping every other parameter.
    pub fn link(&self, path: &str, page: i64, limit: i64) -> String {
        let mut parts: Vec<String> = self
            .inner
            .iter()
            .filter(|(k, _)| k != "page" && k != "limit")
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        parts.push(format!("page={page}"));
        parts.push(format!("limit={limit}"));

        format!("{path}?{}", parts.join("&"))
    }

    /// `recipes_limit` is honoured only when it is a non-negative integer.
    pub fn recipes_limit(&self) -> Option<usize> {
        self.get("recipes_limit")
            .and_then(|value| value.parse::<usize>().ok())
    }
}

/// Only `1` switches a membership filter on.
fn is_flag_set(value: Option<&str>) -> bool {
    value == Some("1")
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeFilter {
    pub author: Option<Id>,
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeFilter {
    pub fn from_query(query: &QueryPairs) -> Result<Self, Error> {
        let mut errors = FieldErrors::new();

        let author = match query.get("author").filter(|value| !value.is_empty()) {
            Some(value) => match value.parse::<Id>() {
                Ok(id) => Some(id),
                Err(_) => {
                    errors.insert("author".into(), vec!["Enter a number.".into()]);
                    None
                }
            },
            None => None,
        };

        if !errors.is_empty() {
            return Err(Error::validation(errors));
        }

        Ok(Self {
            author,
            tags: query
                .get_all("tags")
                .into_iter()
                .filter(|slug| !slug.is_empty())
                .map(str::to_string)
                .collect(),
            is_favorited: is_flag_set(query.get("is_favorited")),
            is_in_shopping_cart: is_flag_set(query.get("is_in_shopping_cart")),
        })
    }

    /// Appends ` AND ...` conditions over the `recipes r` alias.
    pub fn push_conditions(&self, builder: &mut QueryBuilder<'_, Postgres>, viewer: Option<Id>) {
        if let Some(author) = self.author {
            builder.push(" AND r.author_id = ").push_bind(author);
        }

        if !self.tags.is_empty() {
            builder
                .push(
                    " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
                     WHERE rt.recipe_id = r.id AND t.slug = ANY(",
                )
                .push_bind(self.tags.clone())
                .push("))");
        }

        for (enabled, table) in [
            (self.is_favorited, "favorites"),
            (self.is_in_shopping_cart, "shopping_cart"),
        ] {
            if !enabled {
                continue;
            }
            match viewer {
                Some(user_id) => {
                    builder
                        .push(format!(
                            " AND EXISTS (SELECT 1 FROM {table} m WHERE m.recipe_id = r.id AND m.user_id = "
                        ))
                        .push_bind(user_id)
                        .push(")");
                }
                // Anonymous requesters have no favorites or cart.
                None => {
                    builder.push(" AND FALSE");
                }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngredientFilter {
    pub name: Option<String>,
}

impl IngredientFilter {
    pub fn from_query(query: &QueryPairs) -> Self {
        Self {
            name: query
                .get("name")
                .filter(|value| !value.is_empty())
                .map(str::to_string),
        }
    }

    /// `LIKE` pattern matching names that start with the given prefix.
    pub fn like_pattern(&self) -> Option<String> {
        self.name.as_ref().map(|prefix| {
            let mut pattern = String::with_capacity(prefix.len() + 1);
            for c in prefix.chars() {
                if matches!(c, '\\' | '%' | '_') {
                    pattern.push('\\');
                }
                pattern.push(c);
            }
            pattern.push('%');
            pattern
        })
    }
}
