use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Point-in-time copy of a thread's context entries.
///
/// Keys are unique; iteration is in key order so rendered output is stable.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextSnapshot {
    entries: BTreeMap<String, String>,
}

impl ContextSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }
}

impl From<BTreeMap<String, String>> for ContextSnapshot {
    fn from(entries: BTreeMap<String, String>) -> Self {
        Self { entries }
    }
}

impl Display for ContextSnapshot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (index, (key, value)) in self.entries.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::ContextSnapshot;

    #[test]
    fn display_lists_entries_in_key_order() {
        let snapshot = ContextSnapshot::new()
            .with("traceNumber", "t-1")
            .with("tenant", "acme");

        assert_eq!(snapshot.to_string(), "tenant=acme, traceNumber=t-1");
    }

    #[test]
    fn later_insert_overwrites_key() {
        let snapshot = ContextSnapshot::new().with("trace", "A").with("trace", "B");

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.get("trace"), Some("B"));
    }
}
