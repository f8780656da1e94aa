//! Feature flags consulted by the provider services.
//!
//! Flag values arrive untyped (JSON or environment strings). [`FlagValue`]
//! keeps the variant and exposes accessors that fall back to a default on a
//! type mismatch instead of failing.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// When true, pollen data is not served and exposure factors are neutral.
pub const POLLEN_FACTOR_DISABLED: &str = "pollen_factor_disabled";

/// Environment variable prefix for flags, e.g. `CLEANAIR_FLAG_POLLEN_FACTOR_DISABLED`.
pub const FLAG_ENV_PREFIX: &str = "CLEANAIR_FLAG_";

/// An untyped flag value.
#[derive(Debug, Clone, PartialEq)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Null,
}

impl FlagValue {
    /// Parse a raw string the way operators write flags in the environment.
    ///
    /// ```
    /// use cleanair_server::flags::FlagValue;
    ///
    /// assert_eq!(FlagValue::parse("true"), FlagValue::Bool(true));
    /// assert_eq!(FlagValue::parse("42"), FlagValue::Int(42));
    /// assert_eq!(FlagValue::parse("0.5"), FlagValue::Float(0.5));
    /// assert_eq!(FlagValue::parse("beta"), FlagValue::String("beta".into()));
    /// ```
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return FlagValue::Null;
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return FlagValue::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return FlagValue::Bool(false);
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return FlagValue::Int(i);
        }
        if let Ok(f) = trimmed.parse::<f64>() {
            return FlagValue::Float(f);
        }
        FlagValue::String(trimmed.to_string())
    }

    pub fn as_bool(&self, default: bool) -> bool {
        match self {
            FlagValue::Bool(b) => *b,
            _ => default,
        }
    }

    pub fn as_str<'a>(&'a self, default: &'a str) -> &'a str {
        match self {
            FlagValue::String(s) => s,
            _ => default,
        }
    }

    pub fn as_int(&self, default: i64) -> i64 {
        match self {
            FlagValue::Int(i) => *i,
            _ => default,
        }
    }

    /// Integers widen to floats; anything else falls back.
    pub fn as_float(&self, default: f64) -> f64 {
        match self {
            FlagValue::Float(f) => *f,
            FlagValue::Int(i) => *i as f64,
            _ => default,
        }
    }
}

impl From<serde_json::Value> for FlagValue {
    /// Arrays and objects are not flag values and become `Null`.
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => FlagValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => FlagValue::Int(i),
                None => n.as_f64().map(FlagValue::Float).unwrap_or(FlagValue::Null),
            },
            serde_json::Value::String(s) => FlagValue::String(s),
            _ => FlagValue::Null,
        }
    }
}

/// Read access to feature flags.
pub trait FlagLookup: Send + Sync {
    fn value(&self, key: &str) -> Option<FlagValue>;

    /// A boolean flag, false when unset or not a boolean.
    fn is_enabled(&self, key: &str) -> bool {
        self.value(key).is_some_and(|v| v.as_bool(false))
    }
}

/// In-process flag store, seeded at startup and adjustable at runtime.
#[derive(Debug, Default)]
pub struct StaticFlags {
    values: RwLock<HashMap<String, FlagValue>>,
}

impl StaticFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(self, key: impl Into<String>, value: FlagValue) -> Self {
        self.set(key, value);
        self
    }

    /// Load every `CLEANAIR_FLAG_*` variable, lower-casing the key.
    pub fn from_env() -> Self {
        Self::from_vars(std::env::vars())
    }

    fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let flags = Self::new();
        for (name, raw) in vars {
            if let Some(key) = name.strip_prefix(FLAG_ENV_PREFIX) {
                flags.set(key.to_ascii_lowercase(), FlagValue::parse(&raw));
            }
        }
        flags
    }

    pub fn set(&self, key: impl Into<String>, value: FlagValue) {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.into(), value);
    }
}

impl FlagLookup for StaticFlags {
    fn value(&self, key: &str) -> Option<FlagValue> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_fall_back_on_mismatch() {
        let v = FlagValue::String("yes".into());
        assert!(!v.as_bool(false));
        assert!(v.as_bool(true));
        assert_eq!(v.as_int(3), 3);
        assert_eq!(v.as_float(1.5), 1.5);
        assert_eq!(v.as_str("x"), "yes");

        assert_eq!(FlagValue::Null.as_str("fallback"), "fallback");
        assert_eq!(FlagValue::Int(4).as_float(0.0), 4.0);
        assert_eq!(FlagValue::Float(4.5).as_int(1), 1);
    }

    #[test]
    fn from_json_values() {
        assert_eq!(FlagValue::from(serde_json::json!(true)), FlagValue::Bool(true));
        assert_eq!(FlagValue::from(serde_json::json!(12)), FlagValue::Int(12));
        assert_eq!(FlagValue::from(serde_json::json!(0.25)), FlagValue::Float(0.25));
        assert_eq!(FlagValue::from(serde_json::json!([1, 2])), FlagValue::Null);
    }

    #[test]
    fn is_enabled_requires_boolean_true() {
        let flags = StaticFlags::new()
            .with("on", FlagValue::Bool(true))
            .with("text", FlagValue::String("true".into()));

        assert!(flags.is_enabled("on"));
        assert!(!flags.is_enabled("text"));
        assert!(!flags.is_enabled("missing"));
    }

    #[test]
    fn set_overrides_existing_value() {
        let flags = StaticFlags::new().with(POLLEN_FACTOR_DISABLED, FlagValue::Bool(true));
        flags.set(POLLEN_FACTOR_DISABLED, FlagValue::Bool(false));
        assert!(!flags.is_enabled(POLLEN_FACTOR_DISABLED));
    }

    #[test]
    fn loads_prefixed_variables() {
        let flags = StaticFlags::from_vars(vec![
            ("CLEANAIR_FLAG_POLLEN_FACTOR_DISABLED".to_string(), "TRUE".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
        ]);

        assert!(flags.is_enabled(POLLEN_FACTOR_DISABLED));
        assert_eq!(flags.value("path"), None);
    }
}
