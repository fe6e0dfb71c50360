//! Environment variable handling and .env file loading

use crate::{
    error::{AppError, ErrorContext, Result},
    models::Config,
    types::UnreachablePolicy,
};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

/// Supported variables: name, description, example
pub const SUPPORTED_VARS: &[(&str, &str, &str)] = &[
    ("PINGTEST_MIRRORS", "Comma-separated mirror prefixes, each ending in '/'", "http://cdn1.example.net/"),
    ("PINGTEST_CONCURRENCY", "Maximum concurrent probes per carrier group (1-1000)", "100"),
    ("PINGTEST_ATTEMPTS", "Probe attempts per target (1-10)", "3"),
    ("PINGTEST_PROBE_TIMEOUT_MS", "Per-attempt probe timeout in milliseconds", "3000"),
    ("PINGTEST_UNREACHABLE", "Unreachable targets: show or drop", "show"),
    ("PINGTEST_COLOR", "Enable colored output", "true"),
];

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Key/value pairs from a .env file, without touching the process environment
    ///
    /// A missing file yields no values.
    // `from_path_iter` is the only dotenv entry point that leaves the process
    // environment alone
    #[allow(deprecated)]
    pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }

        let mut values = HashMap::new();
        let context = || format!("reading {}", path.display());
        for item in dotenv::from_path_iter(path).with_context(context)? {
            let (key, value) = item.with_context(context)?;
            values.insert(key, value);
        }
        Ok(values)
    }

    /// Apply every supported variable `lookup` knows about
    pub fn apply<F>(config: &mut Config, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("PINGTEST_MIRRORS") {
            let mirrors: Vec<String> = value
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .collect();
            if !mirrors.is_empty() {
                config.mirrors = mirrors;
            }
        }
        if let Some(value) = lookup("PINGTEST_CONCURRENCY") {
            config.concurrency = parse_var("PINGTEST_CONCURRENCY", &value)?;
        }
        if let Some(value) = lookup("PINGTEST_ATTEMPTS") {
            config.probe_attempts = parse_var("PINGTEST_ATTEMPTS", &value)?;
        }
        if let Some(value) = lookup("PINGTEST_PROBE_TIMEOUT_MS") {
            config.probe_timeout_ms = parse_var("PINGTEST_PROBE_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("PINGTEST_UNREACHABLE") {
            config.unreachable = UnreachablePolicy::from_str(value.trim())
                .map_err(|e| AppError::config(format!("Invalid PINGTEST_UNREACHABLE value '{}': {}", value, e)))?;
        }
        if let Some(value) = lookup("PINGTEST_COLOR") {
            config.enable_color = parse_var("PINGTEST_COLOR", &value)?;
        }
        Ok(())
    }

    /// Display environment variable help
    pub fn display_env_help() -> String {
        let mut help = String::new();
        help.push_str("Supported Environment Variables:\n\n");

        for (var, description, example) in SUPPORTED_VARS {
            help.push_str(&format!("  {:<26} {}\n", var, description));
            help.push_str(&format!("  {:<26} Example: {}\n\n", "", example));
        }

        help.push_str("Configuration Priority (highest to lowest):\n");
        help.push_str("  1. Command-line arguments\n");
        help.push_str("  2. Environment variables\n");
        help.push_str("  3. .env file values\n");
        help.push_str("  4. Default values\n");

        help
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_apply_all_variables() {
        let mut config = Config::default();
        EnvManager::apply(
            &mut config,
            lookup_from(&[
                ("PINGTEST_MIRRORS", "http://a.example/, http://b.example/"),
                ("PINGTEST_CONCURRENCY", "25"),
                ("PINGTEST_ATTEMPTS", "5"),
                ("PINGTEST_PROBE_TIMEOUT_MS", "1500"),
                ("PINGTEST_UNREACHABLE", "drop"),
                ("PINGTEST_COLOR", "false"),
            ]),
        )
        .unwrap();

        assert_eq!(config.mirrors, vec!["http://a.example/", "http://b.example/"]);
        assert_eq!(config.concurrency, 25);
        assert_eq!(config.probe_attempts, 5);
        assert_eq!(config.probe_timeout_ms, 1500);
        assert_eq!(config.unreachable, UnreachablePolicy::Drop);
        assert!(!config.enable_color);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        let err = EnvManager::apply(&mut config, lookup_from(&[("PINGTEST_CONCURRENCY", "lots")])).unwrap_err();
        assert_eq!(err.category(), "CONFIG");
        assert!(err.to_string().contains("PINGTEST_CONCURRENCY"));

        assert!(EnvManager::apply(&mut config, lookup_from(&[("PINGTEST_COLOR", "maybe")])).is_err());
        assert!(EnvManager::apply(&mut config, lookup_from(&[("PINGTEST_UNREACHABLE", "hide")])).is_err());
    }

    #[test]
    fn test_empty_mirror_list_keeps_defaults() {
        let mut config = Config::default();
        EnvManager::apply(&mut config, lookup_from(&[("PINGTEST_MIRRORS", " , ")])).unwrap();
        assert_eq!(config.mirrors, Config::default().mirrors);
    }

    #[test]
    fn test_read_env_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# pingtest settings").unwrap();
        writeln!(file, "PINGTEST_ATTEMPTS=4").unwrap();
        writeln!(file, "PINGTEST_UNREACHABLE=drop").unwrap();

        let values = EnvManager::read_env_file(file.path()).unwrap();
        assert_eq!(values.get("PINGTEST_ATTEMPTS").map(String::as_str), Some("4"));
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_read_env_file_leaves_process_env_alone() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "PINGTEST_ENV_FILE_ONLY=1").unwrap();

        let values = EnvManager::read_env_file(file.path()).unwrap();
        assert_eq!(values.get("PINGTEST_ENV_FILE_ONLY").map(String::as_str), Some("1"));
        assert!(std::env::var("PINGTEST_ENV_FILE_ONLY").is_err());
    }

    #[test]
    fn test_missing_env_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let values = EnvManager::read_env_file(&dir.path().join(".env")).unwrap();
        assert!(values.is_empty());
    }

    #[test]
    fn test_display_env_help() {
        let help = EnvManager::display_env_help();
        for (var, _, _) in SUPPORTED_VARS {
            assert!(help.contains(var));
        }
        assert!(help.contains("Configuration Priority"));
    }
}
