//! Identifier naming-convention transforms.
//!
//! Identifiers are split into lower-case words by [`parse_identifier`] and
//! re-rendered by [`render`]; [`convert`] composes the two. Free text is
//! rewritten token by token with [`rewrite_identifiers_in_text`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Target naming convention for an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NamingStyle {
    /// `user_name`
    SnakeCase,
    /// `userName`
    CamelCase,
    /// `UserName`
    PascalCase,
    /// `USER_NAME`
    ScreamingSnakeCase,
}

impl NamingStyle {
    /// Every style, in the order variants are generated.
    pub const ALL: [NamingStyle; 4] = [
        NamingStyle::SnakeCase,
        NamingStyle::CamelCase,
        NamingStyle::PascalCase,
        NamingStyle::ScreamingSnakeCase,
    ];

    pub fn label(self) -> &'static str {
        match self {
            NamingStyle::SnakeCase => "snake_case",
            NamingStyle::CamelCase => "camelCase",
            NamingStyle::PascalCase => "PascalCase",
            NamingStyle::ScreamingSnakeCase => "SCREAMING_SNAKE_CASE",
        }
    }
}

impl fmt::Display for NamingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Tokens never rewritten by [`rewrite_identifiers_in_text`].
const RESERVED_WORDS: &[&str] = &[
    "and", "or", "not", "in", "is", "if", "else", "elif", "then", "for", "while", "return",
    "true", "false", "True", "False", "none", "None", "null", "nil", "len", "sum", "min", "max",
    "abs", "all", "any", "int", "float", "str", "bool", "list", "dict", "set", "tuple", "self",
    "def", "fn", "let", "var", "const", "of", "to", "the", "a", "an",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CharClass {
    Upper,
    Lower,
    Digit,
}

fn classify(c: char) -> CharClass {
    if c.is_ascii_digit() {
        CharClass::Digit
    } else if c.is_uppercase() {
        CharClass::Upper
    } else {
        CharClass::Lower
    }
}

/// Split one underscore-free segment at case and digit boundaries.
fn split_segment(segment: &str, words: &mut Vec<String>) {
    let chars: Vec<char> = segment.chars().collect();
    let mut current = String::new();
    for (i, &c) in chars.iter().enumerate() {
        let class = classify(c);
        if i > 0 && !current.is_empty() {
            let prev = classify(chars[i - 1]);
            let next = chars.get(i + 1).copied().map(classify);
            let boundary = match (prev, class) {
                (CharClass::Digit, CharClass::Digit) => false,
                (CharClass::Digit, _) | (_, CharClass::Digit) => true,
                (CharClass::Lower, CharClass::Upper) => true,
                // Last capital of an acronym run starts the next word: HTTPServer.
                (CharClass::Upper, CharClass::Upper) => next == Some(CharClass::Lower),
                _ => false,
            };
            if boundary {
                words.push(current.to_lowercase());
                current.clear();
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current.to_lowercase());
    }
}

/// Split an identifier into lower-case words.
///
/// Underscore-separated names split on `_`; mixed-case runs split at
/// lower-to-upper transitions, before the last capital of an acronym run,
/// and around digit runs.
pub fn parse_identifier(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    for segment in name.split('_').filter(|s| !s.is_empty()) {
        split_segment(segment, &mut words);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => {
            let mut result = first.to_uppercase().to_string();
            result.push_str(&chars.as_str().to_lowercase());
            result
        }
        None => String::new(),
    }
}

/// Render words in the given convention.
pub fn render<S: AsRef<str>>(words: &[S], style: NamingStyle) -> String {
    match style {
        NamingStyle::SnakeCase => words
            .iter()
            .map(|w| w.as_ref().to_lowercase())
            .collect::<Vec<_>>()
            .join("_"),
        NamingStyle::ScreamingSnakeCase => words
            .iter()
            .map(|w| w.as_ref().to_uppercase())
            .collect::<Vec<_>>()
            .join("_"),
        NamingStyle::CamelCase => words
            .iter()
            .enumerate()
            .map(|(i, w)| {
                if i == 0 {
                    w.as_ref().to_lowercase()
                } else {
                    capitalize(w.as_ref())
                }
            })
            .collect(),
        NamingStyle::PascalCase => words.iter().map(|w| capitalize(w.as_ref())).collect(),
    }
}

/// Re-render an identifier in another convention (`"userName"` -> `"user_name"`).
pub fn convert(name: &str, style: NamingStyle) -> String {
    render(&parse_identifier(name), style)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn should_rewrite(token: &str) -> bool {
    token.chars().count() > 1
        && !RESERVED_WORDS.contains(&token)
        && !token.starts_with('_')
        && !token.ends_with('_')
}

/// Rewrite every identifier-shaped token of `text` into `style`.
///
/// Reserved words, single-character tokens and underscore-fenced names
/// (`__init__`) are kept; all other text is reproduced verbatim.
pub fn rewrite_identifiers_in_text(text: &str, style: NamingStyle) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if is_ident_start(c) || c.is_ascii_digit() {
            let mut end = start + c.len_utf8();
            while let Some(&(idx, next)) = chars.peek() {
                if !is_ident_continue(next) {
                    break;
                }
                end = idx + next.len_utf8();
                chars.next();
            }
            let token = &text[start..end];
            // Numeric literals such as `10` or `2d` pass through untouched.
            if is_ident_start(c) && should_rewrite(token) {
                let converted = convert(token, style);
                if converted.is_empty() {
                    out.push_str(token);
                } else {
                    out.push_str(&converted);
                }
            } else {
                out.push_str(token);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(list: &[&str]) -> Vec<String> {
        list.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn parses_each_convention() {
        assert_eq!(parse_identifier("user_name"), words(&["user", "name"]));
        assert_eq!(parse_identifier("USER_NAME"), words(&["user", "name"]));
        assert_eq!(parse_identifier("userName"), words(&["user", "name"]));
        assert_eq!(parse_identifier("UserName"), words(&["user", "name"]));
    }

    #[test]
    fn acronym_runs_form_their_own_word() {
        assert_eq!(parse_identifier("HTTPServer"), words(&["http", "server"]));
        assert_eq!(
            parse_identifier("parseHTTPResponse"),
            words(&["parse", "http", "response"])
        );
        assert_eq!(parse_identifier("getID"), words(&["get", "id"]));
    }

    #[test]
    fn digit_runs_are_words() {
        assert_eq!(parse_identifier("sha256Digest"), words(&["sha", "256", "digest"]));
        assert_eq!(parse_identifier("item_2"), words(&["item", "2"]));
    }

    #[test]
    fn empty_and_single_word_inputs() {
        assert!(parse_identifier("").is_empty());
        assert!(parse_identifier("___").is_empty());
        assert_eq!(convert("", NamingStyle::PascalCase), "");
        assert_eq!(convert("total", NamingStyle::ScreamingSnakeCase), "TOTAL");
        assert_eq!(convert("total", NamingStyle::CamelCase), "total");
    }

    #[test]
    fn renders_each_style() {
        let w = words(&["compute", "average", "value"]);
        assert_eq!(render(&w, NamingStyle::SnakeCase), "compute_average_value");
        assert_eq!(render(&w, NamingStyle::CamelCase), "computeAverageValue");
        assert_eq!(render(&w, NamingStyle::PascalCase), "ComputeAverageValue");
        assert_eq!(
            render(&w, NamingStyle::ScreamingSnakeCase),
            "COMPUTE_AVERAGE_VALUE"
        );
    }

    #[test]
    fn text_rewrite_keeps_reserved_words_and_layout() {
        let text = "len(itemList) > 0 and not isEmpty";
        assert_eq!(
            rewrite_identifiers_in_text(text, NamingStyle::SnakeCase),
            "len(item_list) > 0 and not is_empty"
        );
    }

    #[test]
    fn text_rewrite_skips_single_chars_numbers_and_dunders() {
        let text = "x = __init__(maxCount, 10, 3rd)";
        assert_eq!(
            rewrite_identifiers_in_text(text, NamingStyle::ScreamingSnakeCase),
            "x = __init__(MAX_COUNT, 10, 3rd)"
        );
    }

    #[test]
    fn text_rewrite_converts_prose_words_too() {
        let text = "Return the total divided by the count.";
        assert_eq!(
            rewrite_identifiers_in_text(text, NamingStyle::SnakeCase),
            "return the total divided by the count."
        );
        assert_eq!(
            rewrite_identifiers_in_text(text, NamingStyle::PascalCase),
            "Return the Total Divided By the Count."
        );
    }

    // ---------------------------------------------------------------
    // Proptest: naming round-trip
    // ---------------------------------------------------------------

    use proptest::prelude::*;
    use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence, RngAlgorithm};

    fn naming_proptest_config() -> ProptestConfig {
        ProptestConfig {
            cases: 128,
            source_file: Some(file!()),
            failure_persistence: Some(Box::new(FileFailurePersistence::WithSource(
                "proptest-regressions",
            ))),
            rng_algorithm: RngAlgorithm::ChaCha,
            ..ProptestConfig::default()
        }
    }

    /// Word lists whose rendering is unambiguous in every style: lower-case
    /// alphabetic words of at least two letters.
    fn word_list_strategy() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-z]{2,8}", 1..=5)
    }

    proptest! {
        #![proptest_config(naming_proptest_config())]

        /// Rendering then parsing recovers the original words in every style.
        #[test]
        fn render_then_parse_round_trips(words in word_list_strategy()) {
            for style in NamingStyle::ALL {
                let rendered = render(&words, style);
                prop_assert_eq!(
                    parse_identifier(&rendered),
                    words.clone(),
                    "style {} rendered {:?}",
                    style,
                    rendered
                );
            }
        }

        /// Converting through any chain of styles lands on the same snake form.
        #[test]
        fn conversion_is_style_independent(words in word_list_strategy()) {
            let snake = render(&words, NamingStyle::SnakeCase);
            for style in NamingStyle::ALL {
                let other = render(&words, style);
                prop_assert_eq!(convert(&other, NamingStyle::SnakeCase), snake.clone());
            }
        }
    }
}
