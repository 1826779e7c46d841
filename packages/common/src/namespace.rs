use serde::{Deserialize, Serialize};
use std::fmt;

/// Key of an isolated entity tree
///
/// `Global` is the reserved default namespace used when none is given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Namespace {
    #[default]
    Global,
    Named(String),
}

impl Namespace {
    pub fn named(name: impl Into<String>) -> Self {
        Namespace::Named(name.into())
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Namespace::Global)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Global => f.write_str("<global>"),
            Namespace::Named(name) => f.write_str(name),
        }
    }
}

impl From<&str> for Namespace {
    fn from(name: &str) -> Self {
        Namespace::Named(name.to_string())
    }
}

impl From<Option<String>> for Namespace {
    fn from(name: Option<String>) -> Self {
        name.map(Namespace::Named).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_global() {
        assert!(Namespace::default().is_global());
        assert_eq!(Namespace::from(None), Namespace::Global);
        assert_eq!(Namespace::from(Some("ui".to_string())), Namespace::named("ui"));
    }
}
