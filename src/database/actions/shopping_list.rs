use std::collections::HashMap;

use sqlx::{Pool, Postgres};

use crate::{
    constants::SHOPPING_LIST_HEADER,
    error::{Error, QueryError},
    schema::{Id, ShoppingListPart, ShoppingListRow},
};

/// Every ingredient link of every recipe in the user's cart.
pub async fn list_shopping_cart_parts(
    pool: &Pool<Postgres>,
    user_id: Id,
) -> Result<Vec<ShoppingListPart>, Error> {
    let rows: Vec<ShoppingListPart> = sqlx::query_as(
        "
        SELECT ri.ingredient_id, i.name, i.measurement_unit, ri.amount
        FROM shopping_cart c
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

/// Sums amounts per ingredient, ordered by name.
pub fn aggregate_shopping_list(parts: Vec<ShoppingListPart>) -> Vec<ShoppingListRow> {
    let mut totals: HashMap<Id, ShoppingListRow> = HashMap::new();
    parts.into_iter().for_each(|part| {
        totals
            .entry(part.ingredient_id)
            .or_insert_with(|| ShoppingListRow {
                name: part.name,
                total_amount: 0,
                measurement_unit: part.measurement_unit,
            })
            .total_amount += part.amount as i64;
    });

    let mut rows: Vec<(Id, ShoppingListRow)> = totals.into_iter().collect();
    rows.sort_by(|(a_id, a), (b_id, b)| a.name.cmp(&b.name).then(a_id.cmp(b_id)));
    rows.into_iter().map(|(_, row)| row).collect()
}

fn escape_csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn render_shopping_list(rows: &[ShoppingListRow]) -> String {
    let mut csv = SHOPPING_LIST_HEADER.join(",");
    csv.push_str("\r\n");
    for row in rows {
        csv.push_str(&format!(
            "{},{},{}\r\n",
            escape_csv_field(&row.name),
            row.total_amount,
            escape_csv_field(&row.measurement_unit)
        ));
    }
    csv
}

pub async fn download_shopping_list(pool: &Pool<Postgres>, user_id: Id) -> Result<String, Error> {
    let parts = list_shopping_cart_parts(pool, user_id).await?;
    let rows = aggregate_shopping_list(parts);
    log::trace!("> Shopping list of user {user_id} has {} rows", rows.len());

    Ok(render_shopping_list(&rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(ingredient_id: Id, name: &str, unit: &str, amount: i32) -> ShoppingListPart {
        ShoppingListPart {
            ingredient_id,
            name: name.into(),
            measurement_unit: unit.into(),
            amount,
        }
    }

    #[test]
    fn sums_shared_ingredients() {
        let rows = aggregate_shopping_list(vec![
            part(2, "salt", "g", 5),
            part(1, "eggs", "pcs", 3),
            part(2, "salt", "g", 10),
        ]);

        assert_eq!(
            rows,
            vec![
                ShoppingListRow {
                    name: "eggs".into(),
                    total_amount: 3,
                    measurement_unit: "pcs".into(),
                },
                ShoppingListRow {
                    name: "salt".into(),
                    total_amount: 15,
                    measurement_unit: "g".into(),
                },
            ]
        );
    }

    #[test]
    fn empty_cart_has_only_header() {
        assert_eq!(
            render_shopping_list(&aggregate_shopping_list(vec![])),
            "Ingredient,Total Amount,Measurement Unit\r\n"
        );
    }

    #[test]
    fn quotes_special_fields() {
        let csv = render_shopping_list(&[ShoppingListRow {
            name: "salt, \"sea\"".into(),
            total_amount: 15,
            measurement_unit: "g".into(),
        }]);
        assert!(csv.ends_with("\"salt, \"\"sea\"\"\",15,g\r\n"));
    }

    #[test]
    fn same_name_different_ingredients_stay_apart() {
        let rows = aggregate_shopping_list(vec![part(1, "milk", "ml", 200), part(2, "milk", "g", 50)]);
        assert_eq!(rows.len(), 2);
    }
}
