use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

/// Maps catalog station names to GBFS station ids where the names differ.
///
/// Stored as a plain JSON object on disk:
/// ```json
/// {
///   "MIT at Mass Ave / Amherst St": "67",
///   "Charles Circle - Charles St at Cambridge St": "a3a3b5e4"
/// }
/// ```
#[derive(Debug, Default)]
pub struct StationIdOverrides {
    entries: HashMap<String, String>,
}

impl StationIdOverrides {
    /// Loads the overrides from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let entries: HashMap<String, String> = serde_json::from_str(&content).map_err(|e| {
            Error::FeedUnavailable(format!(
                "bad station id overrides in {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Ok(Self { entries })
    }

    pub fn get(&self, station_name: &str) -> Option<&str> {
        self.entries.get(station_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for StationIdOverrides {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"Main St": "42", "Park Sq": "a1"}}"#).unwrap();

        let overrides = StationIdOverrides::load(file.path()).unwrap();

        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides.get("Main St"), Some("42"));
        assert_eq!(overrides.get("Elsewhere"), None);
    }

    #[test]
    fn test_load_rejects_non_string_ids() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"Main St": 42}}"#).unwrap();

        assert!(StationIdOverrides::load(file.path()).is_err());
    }
}
