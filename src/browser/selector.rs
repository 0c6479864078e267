use std::fmt;

/// An element query, either CSS or XPath.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    Css(String),
    XPath(String),
}

impl Selector {
    /// Classify a raw selector string. XPath expressions start with `//`
    /// or a parenthesised group; everything else is treated as CSS.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with("//") || trimmed.starts_with('(') {
            Selector::XPath(trimmed.to_string())
        } else {
            Selector::Css(trimmed.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Selector::Css(s) | Selector::XPath(s) => s,
        }
    }
}

impl From<&str> for Selector {
    fn from(raw: &str) -> Self {
        Selector::parse(raw)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Css(s) => write!(f, "css:{}", s),
            Selector::XPath(s) => write!(f, "xpath:{}", s),
        }
    }
}

/// Parse a list of raw selector strings, keeping their order.
pub fn selectors(raw: &[&str]) -> Vec<Selector> {
    raw.iter().map(|s| Selector::parse(s)).collect()
}
