//! Shopping list aggregation and rendering.
//!
//! The cart is a set of recipes; the shopping list sums the amounts of each ingredient across all
//! of them. An ingredient is identified by its id, which is unique per (name, unit) pair, so
//! "flour (g)" and "flour (kg)" stay separate lines.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::db::models::recipes::CartIngredientLine;
use crate::types::IngredientId;

/// File name offered to the browser
pub const FILE_NAME: &str = "shopping_list.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

/// Sum amounts per ingredient, ordered by name then unit
pub fn aggregate(lines: impl IntoIterator<Item = CartIngredientLine>) -> Vec<ShoppingListItem> {
    let mut totals: HashMap<IngredientId, ShoppingListItem> = HashMap::new();

    for line in lines {
        totals
            .entry(line.ingredient_id)
            .and_modify(|item| item.amount += i64::from(line.amount))
            .or_insert_with(|| ShoppingListItem {
                name: line.name,
                measurement_unit: line.measurement_unit,
                amount: i64::from(line.amount),
            });
    }

    let mut items: Vec<ShoppingListItem> = totals.into_values().collect();
    items.sort_by(|a, b| {
        a.name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.measurement_unit.cmp(&b.measurement_unit))
    });
    items
}

/// Plain text rendering of the list
pub fn render(items: &[ShoppingListItem]) -> String {
    let rule = "=".repeat(50);
    let mut out = String::new();

    let _ = writeln!(out, "Shopping list");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out);
    for item in items {
        let _ = writeln!(out, "{} ({}) - {}", item.name, item.measurement_unit, item.amount);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out);
    let _ = write!(out, "Total ingredients: {}", items.len());

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(ingredient_id: IngredientId, name: &str, unit: &str, amount: i32) -> CartIngredientLine {
        CartIngredientLine {
            ingredient_id,
            name: name.to_string(),
            measurement_unit: unit.to_string(),
            amount,
        }
    }

    #[test]
    fn test_amounts_are_summed_per_ingredient() {
        // Two recipes sharing flour
        let items = aggregate(vec![
            line(1, "flour", "g", 200),
            line(2, "sugar", "g", 100),
            line(1, "flour", "g", 300),
        ]);

        assert_eq!(
            items,
            vec![
                ShoppingListItem {
                    name: "flour".to_string(),
                    measurement_unit: "g".to_string(),
                    amount: 500,
                },
                ShoppingListItem {
                    name: "sugar".to_string(),
                    measurement_unit: "g".to_string(),
                    amount: 100,
                },
            ]
        );
    }

    #[test]
    fn test_same_name_different_unit_stays_separate() {
        let items = aggregate(vec![line(2, "milk", "ml", 200), line(1, "milk", "cup", 1)]);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].measurement_unit, "cup");
        assert_eq!(items[1].measurement_unit, "ml");
    }

    #[test]
    fn test_sum_does_not_overflow_i32() {
        let items = aggregate(vec![line(1, "water", "ml", i32::MAX), line(1, "water", "ml", i32::MAX)]);
        assert_eq!(items[0].amount, 2 * i64::from(i32::MAX));
    }

    #[test]
    fn test_render() {
        let items = aggregate(vec![line(1, "flour", "g", 200), line(1, "flour", "g", 300), line(2, "eggs", "pcs", 2)]);
        let text = render(&items);

        let expected = format!(
            "Shopping list\n{rule}\n\neggs (pcs) - 2\nflour (g) - 500\n\n{rule}\n\nTotal ingredients: 2",
            rule = "=".repeat(50)
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_empty() {
        let text = render(&[]);
        assert!(text.starts_with("Shopping list\n"));
        assert!(text.ends_with("Total ingredients: 0"));
    }
}
