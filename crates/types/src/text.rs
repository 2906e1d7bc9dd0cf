/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("text cannot be empty")]
    Empty,
    /// The input text exceeded the permitted length
    #[error("text exceeds {max} characters")]
    TooLong { max: usize },
}

/// A trimmed string with at least one non-whitespace character.
///
/// Used for names and free-text fields that must never be blank when spoken aloud
/// or rendered into an escalation email.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Upper bound on stored characters.
    pub const MAX_CHARS: usize = 10_000;

    /// Creates a new `NonEmptyText`, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`TextError::Empty`] for blank input and [`TextError::TooLong`] when the
    /// trimmed text exceeds [`NonEmptyText::MAX_CHARS`].
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        if trimmed.chars().count() > Self::MAX_CHARS {
            return Err(TextError::TooLong {
                max: Self::MAX_CHARS,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first whitespace-separated word, used when addressing a person informally.
    pub fn first_word(&self) -> &str {
        self.0.split_whitespace().next().unwrap_or(&self.0)
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_keeps_content() {
        let text = NonEmptyText::new("  Margaret Hale ").unwrap();
        assert_eq!(text.as_str(), "Margaret Hale");
        assert_eq!(text.first_word(), "Margaret");
    }

    #[test]
    fn rejects_blank_input() {
        assert_eq!(NonEmptyText::new(" \n\t").unwrap_err(), TextError::Empty);
    }

    #[test]
    fn rejects_overlong_input() {
        let long = "a".repeat(NonEmptyText::MAX_CHARS + 1);
        assert!(matches!(
            NonEmptyText::new(long),
            Err(TextError::TooLong { .. })
        ));
    }

    #[test]
    fn deserialize_applies_validation() {
        let err = serde_json::from_str::<NonEmptyText>("\"   \"").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
