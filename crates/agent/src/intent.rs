//! Keyword heuristics over customer text.

/// Matched anywhere in the message.
const STRONG_CLOSING_PHRASES: &[&str] = &[
    "thank you",
    "thanks",
    "that's all",
    "that's it",
    "all set",
    "i'm done",
    "goodbye",
    "bye",
    "no thanks",
    "nope",
];

/// Only count as the last (or only) word.
const SIMPLE_CLOSING_WORDS: &[&str] = &["done", "finished", "perfect", "great", "awesome"];

/// Help-seeking text is never a goodbye.
const EXCLUSIONS: &[&str] = &["cannot", "can't", "help me", "not working"];

/// Exclusions apply only above this many characters.
const EXCLUSION_MIN_LEN: usize = 20;

const PURCHASE_KEYWORDS: &[&str] = &[
    "buy",
    "purchase",
    "checkout",
    "check out",
    "i want",
    "i'd like",
    "add to cart",
    "order",
    "pay for",
    "get one",
];

fn normalize(text: &str) -> String {
    text.trim().to_lowercase().replace('\u{2019}', "'")
}

/// Whether the customer is wrapping up the conversation.
pub fn is_ending_intent(text: &str) -> bool {
    let text = normalize(text);
    if text.is_empty() {
        return false;
    }

    let strong = STRONG_CLOSING_PHRASES.iter().any(|p| text.contains(p));
    let last_word = text
        .split_whitespace()
        .next_back()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .unwrap_or_default();
    let simple = SIMPLE_CLOSING_WORDS.contains(&last_word);
    let excluded =
        text.chars().count() > EXCLUSION_MIN_LEN && EXCLUSIONS.iter().any(|e| text.contains(e));

    (strong || simple) && !excluded
}

/// Whether the customer sounds ready to buy.
pub fn has_purchase_intent(text: &str) -> bool {
    let text = normalize(text);
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .collect();
    PURCHASE_KEYWORDS.iter().any(|k| {
        if k.contains(' ') {
            text.contains(k)
        } else {
            words.contains(k)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_phrases_end_anywhere() {
        assert!(is_ending_intent("thanks, that's all"));
        assert!(is_ending_intent("Thank you, bye!"));
        assert!(is_ending_intent("  NOPE  "));
        assert!(is_ending_intent("ok I'm done here"));
        assert!(is_ending_intent("That\u{2019}s it"));
    }

    #[test]
    fn simple_words_only_at_the_end() {
        assert!(is_ending_intent("perfect"));
        assert!(is_ending_intent("ok, great!"));
        assert!(is_ending_intent("All done."));
        assert!(!is_ending_intent("that would be great, but what about pricing?"));
        assert!(!is_ending_intent("is the telescope done shipping yet?"));
    }

    #[test]
    fn help_seeking_text_is_excluded() {
        assert!(!is_ending_intent("no you cannot help me"));
        assert!(!is_ending_intent("thanks but the link is not working"));
        assert!(!is_ending_intent("thanks, can't find the checkout button"));
        // Short text is never excluded.
        assert!(is_ending_intent("thanks, can't"));
    }

    #[test]
    fn ordinary_questions_do_not_end() {
        assert!(!is_ending_intent(""));
        assert!(!is_ending_intent("Show me your products"));
        assert!(!is_ending_intent("How much is the telescope?"));
    }

    #[test]
    fn purchase_keywords() {
        assert!(has_purchase_intent("I want to buy the Telescope"));
        assert!(has_purchase_intent("Can I order two star maps?"));
        assert!(has_purchase_intent("add to cart please"));
        assert!(!has_purchase_intent("What's the border color?"));
        assert!(!has_purchase_intent("Show me your products"));
    }
}
