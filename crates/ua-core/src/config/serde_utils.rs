//! Shared serialization/deserialization utilities for configuration
//!
//! This module provides common serde helpers used across configuration types.

/// Helper module for Duration serialization as seconds
///
/// This module serializes `std::time::Duration` as a u64 representing seconds,
/// which is more human-readable in TOML/YAML configuration files.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Config {
///     #[serde(with = "ua_core::config::serde_utils::duration_secs")]
///     timeout: Duration,
/// }
/// ```
pub mod duration_secs {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serialize a Duration as seconds (u64)
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    /// Deserialize a Duration from seconds (u64)
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

/// Helper module for boolean flags written either as booleans or as strings
///
/// Older deployment files quote their flags (`updateMlnxCpldFw: "true"`), so
/// both `true` and `"true"` are accepted. Strings other than a
/// case-insensitive `"true"`, `"false"` or `""` are rejected.
pub mod lenient_bool {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        Str(String),
    }

    fn interpret<E: Error>(value: BoolOrString) -> Result<bool, E> {
        match value {
            BoolOrString::Bool(b) => Ok(b),
            BoolOrString::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" | "" => Ok(false),
                other => Err(E::custom(format!("expected a boolean, got {:?}", other))),
            },
        }
    }

    /// Deserialize a required flag
    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        interpret(BoolOrString::deserialize(deserializer)?)
    }

    /// Deserialize an optional flag
    pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<BoolOrString>::deserialize(deserializer)? {
            Some(value) => interpret(value).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct TestConfig {
        #[serde(with = "duration_secs")]
        timeout: Duration,
    }

    #[derive(Debug, Deserialize)]
    struct Flags {
        #[serde(deserialize_with = "lenient_bool::deserialize")]
        flag: bool,
        #[serde(default, deserialize_with = "lenient_bool::deserialize_opt")]
        maybe: Option<bool>,
    }

    #[test]
    fn test_duration_secs_serialize() {
        let config = TestConfig {
            timeout: Duration::from_secs(30),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"timeout":30}"#);
    }

    #[test]
    fn test_duration_secs_deserialize() {
        let json = r#"{"timeout":60}"#;
        let config: TestConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_lenient_bool_accepts_bool_and_string() {
        let a: Flags = serde_json::from_str(r#"{"flag":true}"#).unwrap();
        let b: Flags = serde_json::from_str(r#"{"flag":"TRUE"}"#).unwrap();
        let c: Flags = serde_json::from_str(r#"{"flag":"false"}"#).unwrap();
        assert!(a.flag);
        assert!(b.flag);
        assert!(!c.flag);
        assert_eq!(a.maybe, None);
    }

    #[test]
    fn test_lenient_bool_optional() {
        let f: Flags = serde_json::from_str(r#"{"flag":false,"maybe":"true"}"#).unwrap();
        assert_eq!(f.maybe, Some(true));
    }

    #[test]
    fn test_lenient_bool_rejects_garbage() {
        let result: Result<Flags, _> = serde_json::from_str(r#"{"flag":"yes please"}"#);
        assert!(result.is_err());
    }
}
