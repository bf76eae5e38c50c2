//! Channel variables carried on the `Variable` action line.
//!
//! The wire form is `name1=value1,name2=value2` on a single line. Neither the
//! separator nor `=` is escaped: a name or value containing either cannot be
//! read back unambiguously. That limitation is part of the protocol and is
//! kept as-is.

use serde::{Deserialize, Serialize};

/// Ordered `name=value` pairs; setting an existing name replaces its value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variables(Vec<(String, String)>);

impl Variables {
    /// Empty variable list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or overwrite a variable.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .0
            .iter_mut()
            .find(|(n, _)| *n == name)
        {
            Some((_, existing)) => *existing = value,
            None => self
                .0
                .push((name, value)),
        }
    }

    /// Look up a variable by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate variables in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.0
            .len()
    }

    /// `true` if no variables are set.
    pub fn is_empty(&self) -> bool {
        self.0
            .is_empty()
    }

    /// Join into the `Variable` header value using `separator`.
    pub fn to_wire(&self, separator: char) -> String {
        let mut out = String::new();
        for (i, (name, value)) in self
            .0
            .iter()
            .enumerate()
        {
            if i > 0 {
                out.push(separator);
            }
            out.push_str(name);
            out.push('=');
            out.push_str(value);
        }
        out
    }

    /// Parse a `Variable` header value. Items without `=` are skipped.
    pub fn parse(s: &str, separator: char) -> Self {
        s.split(separator)
            .filter_map(|item| item.split_once('='))
            .collect()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for Variables {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut vars = Variables::new();
        for (n, v) in iter {
            vars.set(n, v);
        }
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_in_insertion_order() {
        let vars: Variables = [("one", "1"), ("two", "2")]
            .into_iter()
            .collect();
        assert_eq!(vars.to_wire(','), "one=1,two=2");
        assert_eq!(vars.to_wire('|'), "one=1|two=2");
    }

    #[test]
    fn set_replaces_existing() {
        let mut vars = Variables::new();
        vars.set("a", "1");
        vars.set("a", "2");
        assert_eq!(vars.len(), 1);
        assert_eq!(vars.get("a"), Some("2"));
    }

    #[test]
    fn parse_round_trip() {
        let vars = Variables::parse("CALLERID(num)=100,__TRANSFER=yes", ',');
        assert_eq!(vars.get("CALLERID(num)"), Some("100"));
        assert_eq!(vars.get("__TRANSFER"), Some("yes"));
        assert_eq!(vars.to_wire(','), "CALLERID(num)=100,__TRANSFER=yes");
    }

    #[test]
    fn embedded_separator_is_not_escaped() {
        let vars: Variables = [("list", "a,b")]
            .into_iter()
            .collect();
        let wire = vars.to_wire(',');
        assert_eq!(wire, "list=a,b");
        // The trailing `b` has no `=`, so it is lost on the way back.
        let parsed = Variables::parse(&wire, ',');
        assert_eq!(parsed.get("list"), Some("a"));
        assert_eq!(parsed.len(), 1);
    }
}
