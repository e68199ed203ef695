use std::collections::HashMap;

/// A snapshot of environment variables.
///
/// Checks read from a snapshot rather than the live process so that a run
/// sees one consistent view and tests never touch the real environment.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// The value of `name`, treating blank values as unset.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    /// The first of `names` that is set, with its value.
    pub fn first_of<'a>(&'a self, names: &'a [String]) -> Option<(&'a str, &'a str)> {
        names
            .iter()
            .find_map(|name| self.get(name).map(|value| (name.as_str(), value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_count_as_unset() {
        let env = Environment::from_pairs([("A", "  "), ("B", "x")]);
        assert_eq!(env.get("A"), None);
        assert_eq!(env.get("B"), Some("x"));
        assert_eq!(env.get("C"), None);
    }

    #[test]
    fn first_of_respects_order() {
        let env = Environment::from_pairs([("POSTGRES_URL", "pg2"), ("DATABASE_URL", "pg1")]);
        let names = vec!["DATABASE_URL".to_string(), "POSTGRES_URL".to_string()];
        assert_eq!(env.first_of(&names), Some(("DATABASE_URL", "pg1")));
        let only_second = Environment::from_pairs([("POSTGRES_URL", "pg2")]);
        assert_eq!(only_second.first_of(&names), Some(("POSTGRES_URL", "pg2")));
    }
}
