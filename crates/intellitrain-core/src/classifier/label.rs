use serde::{Deserialize, Serialize};

/// Maps class names to output indices. Classes are kept sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<S: AsRef<str>>(labels: &[S]) -> Self {
        let mut classes: Vec<String> = labels.iter().map(|l| l.as_ref().to_owned()).collect();
        classes.sort();
        classes.dedup();
        Self { classes }
    }

    pub fn encode(&self, label: &str) -> Option<usize> {
        self.classes.binary_search_by(|c| c.as_str().cmp(label)).ok()
    }

    pub fn decode(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fit_sorts_and_dedups() {
        let enc = LabelEncoder::fit(&["dog", "cat", "dog", "bird"]);
        assert_eq!(enc.classes(), ["bird", "cat", "dog"]);
        assert_eq!(enc.encode("cat"), Some(1));
        assert_eq!(enc.decode(2), Some("dog"));
        assert_eq!(enc.encode("fish"), None);
    }

    #[test]
    fn serializes_as_plain_list() {
        let enc = LabelEncoder::fit(&["b", "a"]);
        assert_eq!(serde_json::to_string(&enc).unwrap(), r#"["a","b"]"#);
        let back: LabelEncoder = serde_json::from_str(r#"["a","b"]"#).unwrap();
        assert_eq!(back, enc);
    }
}
