//! Security identifier.

use std::borrow::Borrow;
use std::fmt;

/// Ticker of a tracked security. Normalised to upper case on construction.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Security(String);

impl Security {
    pub fn new(ticker: &str) -> Self {
        Security(ticker.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Security {
    fn from(ticker: &str) -> Self {
        Security::new(ticker)
    }
}

impl From<String> for Security {
    fn from(ticker: String) -> Self {
        Security::new(&ticker)
    }
}

impl Borrow<str> for Security {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Security {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn normalises_case_and_whitespace() {
        assert_eq!(Security::from(" aapl "), Security::from("AAPL"));
        assert_eq!(Security::from("msft").as_str(), "MSFT");
    }

    #[test]
    fn map_lookup_by_str() {
        let mut map = BTreeMap::new();
        map.insert(Security::from("X"), 1);
        assert_eq!(map.get("X"), Some(&1));
    }

    #[test]
    fn orders_lexically() {
        let mut v = vec![Security::from("B"), Security::from("A"), Security::from("C")];
        v.sort();
        assert_eq!(v, vec![Security::from("A"), Security::from("B"), Security::from("C")]);
    }
}
