use crate::{normalize, TabooViolation};

/// One forbidden answer or taboo word, split into normalized tokens.
#[derive(Clone, Debug, PartialEq, Eq)]
struct TabooEntry {
    word: String,
    tokens: Vec<String>,
    is_answer: bool,
}

/// The normalized words a description of one target must avoid.
///
/// Always contains the answer itself. A description is checked token by
/// token: it is split on whitespace, every token is normalized, and an entry
/// matches when its tokens appear as a run of consecutive description tokens.
/// Single-word entries therefore only match whole tokens. `"pizzas"` is caught
/// for the answer `"pizza"`, but `"pizzazz"` is not.
#[derive(Clone, Debug)]
pub struct TabooSet {
    entries: Vec<TabooEntry>,
}

impl TabooSet {
    pub fn new<S: AsRef<str>>(answer: &str, taboo_words: &[S]) -> Self {
        let mut entries: Vec<TabooEntry> = Vec::with_capacity(taboo_words.len() + 1);
        let words = std::iter::once((answer, true))
            .chain(taboo_words.iter().map(|word| (word.as_ref(), false)));
        for (word, is_answer) in words {
            let tokens = normalized_tokens(word);
            // A word that normalizes to nothing can never be matched
            if tokens.is_empty() || entries.iter().any(|entry| entry.tokens == tokens) {
                continue;
            }
            entries.push(TabooEntry {
                word: String::from(word),
                tokens,
                is_answer,
            });
        }
        Self { entries }
    }

    /// Whether `word`, after normalization, is one of the forbidden entries.
    pub fn contains(&self, word: &str) -> bool {
        let tokens = normalized_tokens(word);
        self.entries.iter().any(|entry| entry.tokens == tokens)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the first violation found in `description`, scanning left to right.
    pub fn check(&self, description: &str) -> Result<(), TabooViolation> {
        let raw_tokens: Vec<&str> = description.split_whitespace().collect();
        let tokens: Vec<String> = raw_tokens.iter().map(|token| normalize(token)).collect();
        for start in 0..tokens.len() {
            for entry in &self.entries {
                let end = start + entry.tokens.len();
                if end <= tokens.len() && tokens[start..end] == entry.tokens[..] {
                    return Err(TabooViolation {
                        found: raw_tokens[start..end].join(" "),
                        word: entry.word.clone(),
                        is_answer: entry.is_answer,
                    });
                }
            }
        }
        Ok(())
    }
}

fn normalized_tokens(word: &str) -> Vec<String> {
    word.split_whitespace()
        .map(normalize)
        .filter(|token| !token.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use quickcheck::quickcheck;

    use super::*;
    use crate::arbitrary::{Description, Word};

    const PIZZA_TABOO_WORDS: [&str; 5] = ["italian", "napoli", "mediterranean", "mozzarella", "tomato"];

    fn pizza_set() -> TabooSet {
        TabooSet::new("pizza", &PIZZA_TABOO_WORDS)
    }

    #[test]
    fn accepts_the_example_description() {
        let set = pizza_set();
        assert_eq!(
            set.check("A round dish with cheese, sauce, and toppings baked in the oven."),
            Ok(())
        );
    }

    #[test]
    fn rejects_a_taboo_word() {
        let err = pizza_set().check("This italian dish is great").unwrap_err();
        assert_eq!(err.found, "italian");
        assert_eq!(err.word, "italian");
        assert!(!err.is_answer);
    }

    #[test]
    fn rejects_the_answer_in_any_case_and_plural() {
        for description in ["Pizza", "PIZZA!", "two pizzas please", "pizza."] {
            let err = pizza_set().check(description).unwrap_err();
            assert!(err.is_answer, "{} should restate the answer", description);
        }
    }

    #[test]
    fn only_whole_tokens_match() {
        let set = pizza_set();
        assert_eq!(set.check("pizzazz everywhere"), Ok(()));
        assert_eq!(set.check("tomatoes"), Ok(()), "tomatoes folds to tomatoe");
        assert!(set.check("Tomatos").is_err());
    }

    #[test]
    fn reports_the_first_violation() {
        let err = pizza_set().check("Mozzarella and tomato").unwrap_err();
        assert_eq!(err.word, "mozzarella");
        assert_eq!(err.found, "Mozzarella");
    }

    #[test]
    fn always_contains_the_answer() {
        let set = TabooSet::new("pizza", &[] as &[&str]);
        assert!(set.contains("Pizzas!"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn skips_duplicates_and_empty_words() {
        let set = TabooSet::new("pizza", &["Pizza", "---", "cheese", "cheeses"]);
        assert_eq!(set.len(), 2);
        // A lone dash normalizes to nothing and must not be rejected
        assert_eq!(set.check("ham - eggs"), Ok(()));
    }

    #[test]
    fn matches_phrases_on_consecutive_tokens() {
        let set = TabooSet::new("hot dog", &["sausage"]);
        let err = set.check("a tasty Hot Dogs stand").unwrap_err();
        assert_eq!(err.found, "Hot Dogs");
        assert!(err.is_answer);
        assert_eq!(set.check("a hot summer dog"), Ok(()));
        assert_eq!(set.check("hot"), Ok(()));
    }

    quickcheck! {
        fn answer_alone_is_always_rejected(answer: Word, taboo_words: Vec<Word>, styled: Word) -> bool {
            let taboo_words: Vec<String> = taboo_words.into_iter().map(|w| w.0).collect();
            let set = TabooSet::new(&answer.0, &taboo_words);
            // Reuse the random word only for its casing pattern and punctuation choice
            let description = styled.restyle(&answer.0);
            set.check(&description).is_err()
        }

        fn descriptions_without_taboo_tokens_are_accepted(answer: Word, taboo_words: Vec<Word>, description: Description) -> bool {
            let taboo_words: Vec<String> = taboo_words.into_iter().map(|w| w.0).collect();
            let set = TabooSet::new(&answer.0, &taboo_words);
            let clean: Vec<String> = description
                .0
                .into_iter()
                .filter(|token| !set.contains(token))
                .collect();
            set.check(&clean.join(" ")).is_ok()
        }
    }
}
