//! Known categories and what to do with the model's raw answer.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::ClassifyError;

/// The four labels the prompt asks the model to choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Metal,
    Clothes,
    Paper,
    Plastic,
}

impl Category {
    pub const ALL: [Category; 4] = [Category::Metal, Category::Clothes, Category::Paper, Category::Plastic];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Metal => "metal",
            Category::Clothes => "clothes",
            Category::Paper => "paper",
            Category::Plastic => "plastic",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ();

    /// Exact, case-insensitive match on the label name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s))
            .ok_or(())
    }
}

/// How the model's answer is turned into the `category` returned to callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelPolicy {
    /// Return the model's text exactly as received
    #[default]
    Verbatim,
    /// Tidy the text and canonicalise known categories; unknown answers pass through trimmed
    Normalize,
    /// Like `Normalize`, but anything outside the four categories is an error
    Strict,
}

impl LabelPolicy {
    pub fn apply(self, raw: String) -> Result<String, ClassifyError> {
        match self {
            LabelPolicy::Verbatim => Ok(raw),
            LabelPolicy::Normalize => Ok(match normalize(&raw) {
                Ok(category) => category.to_string(),
                Err(cleaned) => cleaned.to_string(),
            }),
            LabelPolicy::Strict => normalize(&raw)
                .map(|category| category.to_string())
                .map_err(|_| ClassifyError::UnknownLabel(raw.trim().to_string())),
        }
    }
}

/// Strip whitespace, quoting and trailing punctuation, then look the result up.
/// Returns the cleaned text when it is not a known category.
fn normalize(raw: &str) -> Result<Category, &str> {
    // Quoting and punctuation nest in any order, e.g. `'metal'.` or `"paper!"`
    let mut cleaned = raw;
    loop {
        let next = cleaned
            .trim()
            .trim_end_matches(['.', '!'])
            .trim_matches(|c: char| matches!(c, '\'' | '"' | '`' | '*'));
        if next == cleaned {
            break;
        }
        cleaned = next;
    }
    cleaned.parse().map_err(|_| cleaned)
}
