//! Ordered key/value payload shared by actions, responses and events

use serde::{Deserialize, Serialize};

/// One protocol message: ordered `Key: Value` pairs.
///
/// Keys are case-sensitive. Setting an existing key replaces its value in
/// place, so the first position wins and the last value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Envelope {
    fields: Vec<(String, String)>,
}

impl Envelope {
    /// Create an empty envelope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a value by key.
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        let key = key.as_ref();
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the key is present.
    pub fn contains(&self, key: impl AsRef<str>) -> bool {
        self.get(key)
            .is_some()
    }

    /// Set or overwrite a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self
            .fields
            .iter_mut()
            .find(|(k, _)| *k == key)
        {
            Some((_, existing)) => *existing = value,
            None => self
                .fields
                .push((key, value)),
        }
    }

    /// Remove a key, returning its value if it existed.
    pub fn remove(&mut self, key: impl AsRef<str>) -> Option<String> {
        let key = key.as_ref();
        let pos = self
            .fields
            .iter()
            .position(|(k, _)| k == key)?;
        Some(
            self.fields
                .remove(pos)
                .1,
        )
    }

    /// Iterate pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.fields
            .len()
    }

    /// `true` if there are no keys.
    pub fn is_empty(&self) -> bool {
        self.fields
            .is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Envelope {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut envelope = Envelope::new();
        for (k, v) in iter {
            envelope.set(k, v);
        }
        envelope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins_keeps_first_position() {
        let mut env = Envelope::new();
        env.set("Response", "Success");
        env.set("ActionID", "1");
        env.set("Response", "Error");

        assert_eq!(env.get("Response"), Some("Error"));
        assert_eq!(env.len(), 2);
        let keys: Vec<_> = env
            .iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, ["Response", "ActionID"]);
    }

    #[test]
    fn keys_are_case_sensitive() {
        let env: Envelope = [("Uniqueid", "42")]
            .into_iter()
            .collect();
        assert_eq!(env.get("Uniqueid"), Some("42"));
        assert_eq!(env.get("UniqueID"), None);
    }

    #[test]
    fn remove_returns_value() {
        let mut env: Envelope = [("A", "1"), ("B", "2")]
            .into_iter()
            .collect();
        assert_eq!(env.remove("A"), Some("1".to_string()));
        assert_eq!(env.remove("A"), None);
        assert_eq!(env.len(), 1);
    }
}
