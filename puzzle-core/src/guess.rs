use serde::{Deserialize, Serialize};

/// Words ignored on both sides of a comparison.
pub const STOP_WORDS: [&str; 22] = [
    "the", "a", "an", "as", "by", "for", "of", "at", "to", "from", "up", "down", "in", "out", "on",
    "off", "over", "under", "again", "further", "then", "once",
];

/// Shortest word accepted against a single-word answer.
pub const MIN_WORD_LENGTH: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum GuessVerdict {
    Correct,
    Incorrect,
    /// Nothing left after normalization.
    Invalid,
    /// Multi-word answer and the guess named fewer than `required` words.
    TooFewWords { required: usize },
}

impl GuessVerdict {
    pub fn is_correct(self) -> bool {
        matches!(self, GuessVerdict::Correct)
    }
}

/// Lowercases, strips quotes, turns every other non-alphanumeric into a word
/// break and drops stop-words.
pub fn normalize_words(text: &str) -> Vec<String> {
    let mut cleaned = String::with_capacity(text.len());
    for ch in text.to_lowercase().chars() {
        match ch {
            '\'' | '\u{2018}' | '\u{2019}' | '`' | '"' => {}
            c if c.is_ascii_alphanumeric() => cleaned.push(c),
            _ => cleaned.push(' '),
        }
    }
    cleaned
        .split_whitespace()
        .filter(|word| !STOP_WORDS.contains(word))
        .map(str::to_owned)
        .collect()
}

/// Number of words a guess must name against an answer of `answer_words`
/// words: 75%, rounded up.
pub fn required_words(answer_words: usize) -> usize {
    (answer_words * 3).div_ceil(4)
}

pub fn judge_guess(guess: &str, answer: &str) -> GuessVerdict {
    let guess_words = normalize_words(guess);
    if guess_words.is_empty() {
        return GuessVerdict::Invalid;
    }

    let answer_words = normalize_words(answer);
    match answer_words.as_slice() {
        [] => GuessVerdict::Incorrect,
        [single] => match guess_words.as_slice() {
            [word] if word.len() >= MIN_WORD_LENGTH && word == single => GuessVerdict::Correct,
            _ => GuessVerdict::Incorrect,
        },
        words => {
            let required = required_words(words.len());
            if guess_words.len() < required {
                return GuessVerdict::TooFewWords { required };
            }
            // Containment only: repeated guess words are not rejected.
            if guess_words.iter().all(|word| words.contains(word)) {
                GuessVerdict::Correct
            } else {
                GuessVerdict::Incorrect
            }
        }
    }
}

pub fn score_guess(guess: &str, answer: &str) -> bool {
    judge_guess(guess, answer).is_correct()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_strips_punctuation_quotes_and_stop_words() {
        assert_eq!(
            normalize_words("  The Lord   of the Rings: Return-of the King! "),
            vec!["lord", "rings", "return", "king"]
        );
        assert_eq!(normalize_words("Schindler's List"), vec!["schindlers", "list"]);
        assert_eq!(normalize_words("Ocean\u{2019}s `Eleven`"), vec!["oceans", "eleven"]);
        assert!(normalize_words("the of ... !!").is_empty());
    }

    #[test]
    fn single_word_answers() {
        assert!(score_guess("Batman", "Batman"));
        assert!(score_guess("  batman!! ", "Batman"));
        assert!(!score_guess("bat", "Batman"));
        assert!(!score_guess("Batman Robin", "Batman"));
        // Exact match but under the minimum length.
        assert!(!score_guess("Ox", "Ox"));
    }

    #[test]
    fn multi_word_answers() {
        assert!(score_guess("The Dark Knight", "Dark Knight"));
        assert!(score_guess("knight dark", "Dark Knight"));
        assert!(!score_guess("Dark", "Dark Knight"));
        assert!(!score_guess("Dark Night", "Dark Knight"));
        assert!(score_guess("eiffel tower paris", "Eiffel Tower Paris France"));
        assert!(!score_guess("eiffel tower", "Eiffel Tower Paris France"));
    }

    #[test]
    fn repeated_words_pass_containment() {
        assert!(score_guess("Knight Knight", "Dark Knight"));
    }

    #[test]
    fn verdicts_explain_rejections() {
        assert_eq!(judge_guess("", "Batman"), GuessVerdict::Invalid);
        assert_eq!(judge_guess("the of", "Batman"), GuessVerdict::Invalid);
        assert_eq!(
            judge_guess("Dark", "Dark Knight"),
            GuessVerdict::TooFewWords { required: 2 }
        );
        assert_eq!(judge_guess("Batman", "The"), GuessVerdict::Incorrect);
        assert!(!score_guess("", "Batman"));
    }

    #[test]
    fn required_word_counts_round_up() {
        assert_eq!(required_words(2), 2);
        assert_eq!(required_words(3), 3);
        assert_eq!(required_words(4), 3);
        assert_eq!(required_words(5), 4);
        assert_eq!(required_words(8), 6);
    }
}
