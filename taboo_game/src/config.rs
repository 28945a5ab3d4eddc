use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use taboo::{TargetEntry, TargetTable};
use tracing::{debug, error};

use crate::ConfigError;

/// Loads the target definitions from a TOML file.
///
/// The file is a single table mapping each answer to its taboo words:
///
/// ```toml
/// pizza = ["italian", "napoli", "mediterranean", "mozzarella", "tomato"]
/// "hot dog" = ["sausage", "bun"]
/// ```
///
/// A missing file is logged and yields an empty table, so the session fails
/// later when it runs out of targets. A file that exists but can't be parsed
/// is an error.
pub fn load_definitions(path: &Path) -> Result<TargetTable, ConfigError> {
    match read_optional(path)? {
        Some(raw) => parse_definitions(path, &raw),
        None => {
            error!(path = %path.display(), "Definitions file not found, continuing without targets");
            Ok(TargetTable::default())
        }
    }
}

pub fn parse_definitions(path: &Path, raw: &str) -> Result<TargetTable, ConfigError> {
    let definitions: BTreeMap<String, Vec<String>> =
        toml::from_str(raw).map_err(|source| ConfigError::MalformedDefinitions {
            path: path.to_path_buf(),
            source,
        })?;
    let entries = definitions
        .into_iter()
        .map(|(answer, taboo_words)| TargetEntry {
            answer,
            taboo_words,
        });
    let table = TargetTable::new(entries).map_err(|source| ConfigError::InvalidTarget {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), num_targets = table.len(), "Loaded definitions");
    Ok(table)
}

/// What the image generator needs to authenticate.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Loads `key=value` credentials. A missing file is logged and yields no credentials.
pub fn load_credentials(path: &Path) -> Result<Credentials, ConfigError> {
    match read_optional(path)? {
        Some(raw) => parse_credentials(path, &raw),
        None => {
            error!(path = %path.display(), "Credentials file not found");
            Ok(Credentials::default())
        }
    }
}

/// Parses `key=value` lines. Blank lines and lines starting with `#` are skipped.
///
/// A file holding nothing but one bare value is read as the API key.
pub fn parse_credentials(path: &Path, raw: &str) -> Result<Credentials, ConfigError> {
    let lines: Vec<(usize, &str)> = raw
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .collect();

    let mut credentials = Credentials::default();
    if let [(_, bare_key)] = lines[..] {
        if !bare_key.contains('=') {
            credentials.api_key = Some(String::from(bare_key));
            return Ok(credentials);
        }
    }

    for (line_number, line) in lines {
        let Some((key, value)) = line.split_once('=') else {
            return Err(ConfigError::MalformedCredentials {
                path: path.to_path_buf(),
                line: line_number,
            });
        };
        let value = value.trim().trim_matches('"');
        match key.trim() {
            "api_key" | "stability_api_key" => {
                credentials.api_key = (!value.is_empty()).then(|| String::from(value));
            }
            other => debug!(key = other, "Ignoring unknown credentials key"),
        }
    }
    Ok(credentials)
}

/// How to launch a detector program.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DetectorConfig {
    pub nick: String,
    /// The program followed by its arguments.
    pub cmd: Vec<String>,
}

impl DetectorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &raw)
    }

    pub fn parse(path: &Path, raw: &str) -> Result<Self, ConfigError> {
        let config: DetectorConfig =
            serde_json::from_str(raw).map_err(|source| ConfigError::MalformedDetectorConfig {
                path: path.to_path_buf(),
                source,
            })?;
        if config.cmd.is_empty() {
            return Err(ConfigError::EmptyDetectorCommand {
                path: path.to_path_buf(),
            });
        }
        Ok(config)
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::Unreadable {
            path: PathBuf::from(path),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> &'static Path {
        Path::new("test.toml")
    }

    #[test]
    fn parses_definitions_in_order() {
        let raw = r#"
            pizza = ["italian", "napoli", "mediterranean", "mozzarella", "tomato"]
            "hot dog" = ["sausage", "bun"]
        "#;
        let table = parse_definitions(path(), raw).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(
            table.get("pizza").unwrap().taboo_words,
            vec!["italian", "napoli", "mediterranean", "mozzarella", "tomato"]
        );
        assert!(table.get("hot dog").is_some());
    }

    #[test]
    fn malformed_definitions_are_errors() {
        assert!(matches!(
            parse_definitions(path(), "pizza = \"italian\""),
            Err(ConfigError::MalformedDefinitions { .. })
        ));
        assert!(matches!(
            parse_definitions(path(), "pizza = [\"\"]"),
            Err(ConfigError::InvalidTarget { .. })
        ));
    }

    #[test]
    fn missing_files_degrade_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let table = load_definitions(&dir.path().join("targets.toml")).unwrap();
        assert!(table.is_empty());
        let credentials = load_credentials(&dir.path().join("key.txt")).unwrap();
        assert_eq!(credentials.api_key, None);
    }

    #[test]
    fn parses_key_value_credentials() {
        let raw = "# Stability AI\napi_key = \"sk-123\"\n\nregion=eu\n";
        let credentials = parse_credentials(path(), raw).unwrap();
        assert_eq!(credentials.api_key.as_deref(), Some("sk-123"));
        assert!(!format!("{:?}", credentials).contains("sk-123"));
    }

    #[test]
    fn accepts_a_bare_key() {
        let credentials = parse_credentials(path(), "  sk-abc  \n").unwrap();
        assert_eq!(credentials.api_key.as_deref(), Some("sk-abc"));
    }

    #[test]
    fn rejects_lines_without_equals_sign() {
        let err = parse_credentials(path(), "api_key=sk\nnonsense\n").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedCredentials { line: 2, .. }));
    }

    #[test]
    fn parses_detector_config() {
        let config = DetectorConfig::parse(
            path(),
            r#"{"nick": "replay", "cmd": ["replay_detector", "fixture.json"]}"#,
        )
        .unwrap();
        assert_eq!(config.nick, "replay");
        assert_eq!(config.cmd.len(), 2);
        assert!(matches!(
            DetectorConfig::parse(path(), r#"{"nick": "none", "cmd": []}"#),
            Err(ConfigError::EmptyDetectorCommand { .. })
        ));
    }
}
