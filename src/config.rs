use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::runner::UnmappedActionPolicy;

/// Configuration file structure for cirun.
///
/// Lets users pin the shell, map workflow actions to local commands, and set
/// output preferences once instead of passing flags on every run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Workflow file to run; the built-in workflow when unset
    pub workflow: Option<PathBuf>,

    /// Step execution settings
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Local commands for `uses:` actions, keyed by action name without `@version`.
    /// Inputs arrive as `INPUT_<KEY>`; hyphenated keys need `printenv`.
    #[serde(default)]
    pub actions: IndexMap<String, String>,

    /// Values for `${{ secrets.* }}` that override the process environment
    #[serde(default)]
    pub secrets: IndexMap<String, String>,

    /// Output format preferences
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunnerConfig {
    /// Shell command; the script is appended as the last argument
    #[serde(default = "default_shell")]
    pub shell: Vec<String>,

    /// Working directory for every step
    pub working_dir: Option<PathBuf>,

    /// Maximum number of stages running at once
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Handling of `uses:` steps without a mapped command
    #[serde(default)]
    pub unmapped_actions: UnmappedActionPolicy,

    /// Record finished runs in the history file
    #[serde(default = "default_history")]
    pub history: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Format used when writing the report to `--output`
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Summary,
    Json,
    Csv,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            shell: default_shell(),
            working_dir: None,
            max_parallel: default_max_parallel(),
            unmapped_actions: UnmappedActionPolicy::default(),
            history: default_history(),
        }
    }
}

fn default_shell() -> Vec<String> {
    vec!["sh".to_string(), "-e".to_string(), "-c".to_string()]
}

fn default_max_parallel() -> usize {
    1
}

fn default_history() -> bool {
    true
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./cirun.toml
    /// 3. ./cirun.json
    /// 4. ./cirun.yaml
    /// 5. ./cirun.yml
    ///
    /// Returns default configuration if no file is found. A specified path
    /// that does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = ["cirun.toml", "cirun.json", "cirun.yaml", "cirun.yml"];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.runner.shell, vec!["sh", "-e", "-c"]);
        assert_eq!(config.runner.max_parallel, 1);
        assert!(config.runner.history);
        assert_eq!(config.runner.unmapped_actions, UnmappedActionPolicy::Ignore);
        assert!(config.workflow.is_none());
        assert!(config.actions.is_empty());
        assert_eq!(config.output.format, OutputFormat::Summary);
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
workflow = ".github/workflows/ci.yml"

[runner]
shell = ["bash", "-eo", "pipefail", "-c"]
max-parallel = 2
unmapped-actions = "fail"
history = false

[actions]
"actions/checkout" = "git status --short"
"actions/setup-python" = "python3 --version"

[secrets]
DOCKER_IMAGE = "localhost/app"

[output]
format = "json"
pretty = true
"#;
        write!(temp_file, "{toml_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(
            config.workflow,
            Some(PathBuf::from(".github/workflows/ci.yml"))
        );
        assert_eq!(config.runner.shell, vec!["bash", "-eo", "pipefail", "-c"]);
        assert_eq!(config.runner.max_parallel, 2);
        assert_eq!(config.runner.unmapped_actions, UnmappedActionPolicy::Fail);
        assert!(!config.runner.history);
        assert_eq!(
            config.actions.get("actions/checkout").map(String::as_str),
            Some("git status --short")
        );
        assert_eq!(
            config.secrets.get("DOCKER_IMAGE").map(String::as_str),
            Some("localhost/app")
        );
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.pretty);
    }

    #[test]
    fn test_load_yaml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".yml").unwrap();
        let yaml_content = r"
runner:
  working-dir: /srv/project
actions:
  docker/login-action: docker login
";
        write!(temp_file, "{yaml_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.runner.working_dir, Some(PathBuf::from("/srv/project")));
        assert_eq!(config.runner.max_parallel, 1);
        assert_eq!(config.actions.len(), 1);
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "runner": { "max-parallel": 3 },
  "output": { "format": "csv" }
}"#;
        write!(temp_file, "{json_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.runner.max_parallel, 3);
        assert_eq!(config.output.format, OutputFormat::Csv);
    }

    #[test]
    fn test_load_missing_explicit_config_fails() {
        let err = Config::load(Some(Path::new("nonexistent.toml"))).unwrap_err();
        assert!(err.to_string().contains("nonexistent.toml"));
    }

    #[test]
    fn test_load_invalid_config_fails() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "[runner]\nmax-parallel = \"many\"\n").unwrap();

        assert!(Config::load_from_path(temp_file.path()).is_err());
    }
}
