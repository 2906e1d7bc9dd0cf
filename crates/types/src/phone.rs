/// Errors returned when parsing a phone number.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PhoneError {
    #[error("phone number must start with '+' followed by the country code")]
    MissingPlus,
    #[error("phone number must contain only digits after '+'")]
    InvalidDigit,
    #[error("phone number must have between 8 and 15 digits, got {0}")]
    InvalidLength(usize),
}

/// A phone number in E.164 form, e.g. `+447700900123`.
///
/// Telephony providers address calls and report callers in this form, so inbound
/// caller lookup compares canonical strings directly. Spaces, dashes and parentheses
/// are stripped before validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(input: impl AsRef<str>) -> Result<Self, PhoneError> {
        let cleaned: String = input
            .as_ref()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
            .collect();

        let digits = cleaned.strip_prefix('+').ok_or(PhoneError::MissingPlus)?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PhoneError::InvalidDigit);
        }
        if !(8..=15).contains(&digits.len()) {
            return Err(PhoneError::InvalidLength(digits.len()));
        }

        Ok(Self(cleaned))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl serde::Serialize for PhoneNumber {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for PhoneNumber {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PhoneNumber::parse(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_formatting() {
        let phone = PhoneNumber::parse("+44 (7700) 900-123").unwrap();
        assert_eq!(phone.as_str(), "+447700900123");
    }

    #[test]
    fn requires_country_code() {
        assert_eq!(
            PhoneNumber::parse("07700900123").unwrap_err(),
            PhoneError::MissingPlus
        );
    }

    #[test]
    fn rejects_letters_and_bad_lengths() {
        assert_eq!(
            PhoneNumber::parse("+4477009OO123").unwrap_err(),
            PhoneError::InvalidDigit
        );
        assert_eq!(
            PhoneNumber::parse("+1234").unwrap_err(),
            PhoneError::InvalidLength(4)
        );
    }
}
