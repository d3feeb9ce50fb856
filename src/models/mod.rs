mod drink;
mod food;
mod movement;
mod symptom;

pub use drink::{DrinkItem, DrinkLog};
pub use food::{FoodItem, FoodLog};
pub use movement::{MovementLog, StoolType};
pub use symptom::{LoggedSymptom, Severity, Symptom, SymptomLog};

/// Normalizes a catalog entry name: trimmed, lowercased, first letter
/// capitalized. Every name entering the catalog goes through this, whether
/// typed by the user or imported from a recipe.
pub fn normalize_item_name(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_item_name() {
        assert_eq!(normalize_item_name("apple pie"), "Apple pie");
        assert_eq!(normalize_item_name("  COFFEE  "), "Coffee");
        assert_eq!(normalize_item_name("Bloating"), "Bloating");
        assert_eq!(normalize_item_name(""), "");
        assert_eq!(normalize_item_name("   "), "");
    }
}
