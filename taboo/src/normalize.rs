/// Reduces a word to the canonical form used for taboo comparisons.
///
/// The steps run in this order:
/// 1. lowercase,
/// 2. drop every character that is neither alphanumeric nor whitespace,
/// 3. if the result is longer than three characters and ends in `s`, drop
///    that single `s`.
///
/// So `"Pizzas!"` and `"pizza"` both become `"pizza"`, while `"bus"` stays
/// `"bus"`. The plural folding is deliberately crude: it removes at most one
/// `s`, which means a normalized word ending in `s` is not a fixed point.
pub fn normalize(word: &str) -> String {
    let mut normalized: String = word
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    if normalized.ends_with('s') && normalized.chars().count() > 3 {
        normalized.pop();
    }
    normalized
}

#[cfg(test)]
mod tests {
    use quickcheck::quickcheck;

    use super::*;

    #[test]
    fn folds_case_and_punctuation() {
        assert_eq!(normalize("Pizza!"), "pizza");
        assert_eq!(normalize("MOZZARELLA,"), "mozzarella");
        assert_eq!(normalize("t-shirt"), "tshirt");
        assert_eq!(normalize("\"napoli\""), "napoli");
    }

    #[test]
    fn strips_one_plural_s() {
        assert_eq!(normalize("pizzas"), "pizza");
        assert_eq!(normalize("Tomatoes."), "tomatoe");
        assert_eq!(normalize("boss"), "bos");
        // Three characters or fewer are left alone
        assert_eq!(normalize("bus"), "bus");
        assert_eq!(normalize("its"), "its");
    }

    #[test]
    fn plural_check_counts_characters_not_bytes() {
        assert_eq!(normalize("éts"), "éts");
        assert_eq!(normalize("cafés"), "café");
    }

    #[test]
    fn keeps_inner_whitespace() {
        assert_eq!(normalize("Hot Dogs"), "hot dog");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("?!"), "");
    }

    quickcheck! {
        fn normalize_is_idempotent_up_to_one_plural_s(word: String) -> bool {
            let once = normalize(&word);
            let twice = normalize(&once);
            if once.ends_with('s') && once.chars().count() > 3 {
                // The second pass strips the next trailing s, nothing else
                once.strip_suffix('s') == Some(twice.as_str())
            } else {
                twice == once
            }
        }
    }
}
