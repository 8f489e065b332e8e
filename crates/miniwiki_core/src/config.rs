use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_WIKI_NAME: &str = "miniwiki";

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiConfig {
    #[serde(default)]
    pub wiki: WikiSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct WikiSection {
    pub name: Option<String>,
    pub home_content: Option<String>,
}

impl WikiConfig {
    /// Resolve the wiki display name: env MINIWIKI_WIKI_NAME > config > default.
    pub fn wiki_name(&self) -> String {
        if let Ok(value) = env::var("MINIWIKI_WIKI_NAME") {
            let trimmed = value.trim().to_string();
            if !trimmed.is_empty() {
                return trimmed;
            }
        }
        self.wiki
            .name
            .clone()
            .unwrap_or_else(|| DEFAULT_WIKI_NAME.to_string())
    }

    /// Content for the default Home page of a fresh wiki, when the config
    /// overrides the built-in text.
    pub fn home_content(&self) -> Option<&str> {
        self.wiki.home_content.as_deref()
    }
}

/// Load and parse a WikiConfig from a TOML file. Returns default if file doesn't exist.
pub fn load_config(config_path: &Path) -> Result<WikiConfig> {
    if !config_path.exists() {
        return Ok(WikiConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: WikiConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn default_config_is_empty() {
        let config = WikiConfig::default();
        assert!(config.wiki.name.is_none());
        assert!(config.wiki.home_content.is_none());
    }

    #[test]
    fn load_config_returns_default_for_missing_file() {
        let config = load_config(Path::new("/nonexistent/config.toml")).expect("load config");
        assert!(config.wiki.name.is_none());
    }

    #[test]
    fn load_config_parses_wiki_section() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[wiki]
name = "garden"
home_content = "Start at [Index]"
"#,
        )
        .expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert_eq!(config.wiki.name.as_deref(), Some("garden"));
        assert_eq!(config.home_content(), Some("Start at [Index]"));
    }

    #[test]
    fn load_config_tolerates_unknown_sections() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[paths]\nwiki_root = \"/foo\"\n").expect("write config");

        let config = load_config(&config_path).expect("load config");
        assert!(config.wiki.name.is_none());
    }

    #[test]
    fn load_config_returns_error_for_invalid_toml() {
        let temp = tempdir().expect("tempdir");
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "[wiki\nname = \"oops\"").expect("write config");
        let error = load_config(&config_path).expect_err("must fail");
        assert!(error.to_string().contains("failed to parse"));
    }

    #[test]
    fn default_wiki_name() {
        let config = WikiConfig::default();
        assert_eq!(config.wiki_name(), "miniwiki");
    }

    #[test]
    fn configured_wiki_name_wins_over_default() {
        let config = WikiConfig {
            wiki: WikiSection {
                name: Some("garden".to_string()),
                home_content: None,
            },
        };
        assert_eq!(config.wiki_name(), "garden");
    }
}
