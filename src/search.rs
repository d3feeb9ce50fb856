//! Prioritized substring matching for catalog filter boxes.

/// Reorders `items` for a search term: entries whose projected string starts
/// with the trimmed, case-insensitive term come first, entries that merely
/// contain it follow, and everything else is dropped. Relative order within
/// each group is preserved. An empty term matches everything.
pub fn rank_matches<T, F>(term: &str, items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return items;
    }

    let mut starts_with = Vec::new();
    let mut contains = Vec::new();

    for item in items {
        let name = key(&item).to_lowercase();
        if name.starts_with(&term) {
            starts_with.push(item);
        } else if name.contains(&term) {
            contains.push(item);
        }
    }

    starts_with.extend(contains);
    starts_with
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> Vec<&'static str> {
        vec![
            "apple pie",
            "banana",
            "banana bread",
            "carrot cake",
            "bread",
            "apricot",
        ]
    }

    #[test]
    fn test_starts_with_ranks_before_contains() {
        let ranked = rank_matches("a", names(), |s| s);
        assert_eq!(
            ranked,
            vec![
                "apple pie",
                "apricot",
                "banana",
                "banana bread",
                "carrot cake",
                "bread",
            ]
        );
    }

    #[test]
    fn test_empty_term_returns_everything_unchanged() {
        assert_eq!(rank_matches("", names(), |s| s), names());
        assert_eq!(rank_matches("   ", names(), |s| s), names());
    }

    #[test]
    fn test_no_match_returns_empty() {
        assert!(rank_matches("raspberry", names(), |s| s).is_empty());
    }

    #[test]
    fn test_term_is_trimmed_and_case_insensitive() {
        let ranked = rank_matches("  BREAD ", names(), |s| s);
        assert_eq!(ranked, vec!["bread", "banana bread"]);
    }

    #[test]
    fn test_projection_over_structs() {
        struct Item {
            name: String,
        }
        let items = vec![
            Item {
                name: "Oat milk".into(),
            },
            Item {
                name: "Milk".into(),
            },
        ];

        let ranked = rank_matches("milk", items, |i| i.name.as_str());
        let names: Vec<&str> = ranked.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Milk", "Oat milk"]);
    }
}
