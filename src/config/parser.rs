//! Configuration parsing from CLI arguments, environment variables and .env files

use crate::{cli::Cli, config::env::EnvManager, error::Result, models::Config};
use std::collections::HashMap;
use std::path::PathBuf;

type EnvLookup = Box<dyn Fn(&str) -> Option<String>>;

/// Builds a [`Config`]: defaults, then .env values, then the process
/// environment, then CLI flags, then validation
pub struct ConfigParser {
    cli: Cli,
    env_file: PathBuf,
    env: EnvLookup,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self {
            cli,
            env_file: PathBuf::from(".env"),
            env: Box::new(|key| std::env::var(key).ok()),
        }
    }

    /// Read .env values from `path` instead of `./.env`
    pub fn with_env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_file = path.into();
        self
    }

    /// Replace the process environment lookup
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + 'static,
    {
        self.env = Box::new(lookup);
        self
    }

    /// Parse and build the complete configuration
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        let file_values: HashMap<String, String> = EnvManager::read_env_file(&self.env_file)?;
        EnvManager::apply(&mut config, |key| file_values.get(key).cloned())?;
        EnvManager::apply(&mut config, |key| (self.env)(key))?;

        self.apply_cli_overrides(&mut config);

        config.validate()?;
        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) {
        config.mode = self.cli.mode;

        if let Some(concurrency) = self.cli.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(attempts) = self.cli.attempts {
            config.probe_attempts = attempts;
        }
        if let Some(timeout_ms) = self.cli.probe_timeout {
            config.probe_timeout_ms = timeout_ms;
        }
        if let Some(policy) = self.cli.unreachable {
            config.unreachable = policy;
        }
        if let Some(color) = self.cli.color_override() {
            config.enable_color = color;
        }

        config.verbose = self.cli.log;
        config.debug = self.cli.debug;
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let mut summary = Vec::new();

    summary.push(format!("Mode: {}", config.mode.as_str()));
    summary.push(format!("Mirrors: {}", config.mirrors.join(", ")));
    summary.push(format!("Node list: {}", config.endpoints.node_list));
    summary.push(format!(
        "Fetch: timeout {}ms, {} retries, deadline {}s",
        config.fetch_timeout_ms, config.fetch_retries, config.fetch_deadline_secs
    ));
    summary.push(format!(
        "Gather: deadline {}s, grace {}s",
        config.gather_deadline_secs, config.grace_period_secs
    ));
    summary.push(format!(
        "Probe: {} attempts, timeout {}ms, concurrency {}",
        config.probe_attempts, config.probe_timeout_ms, config.concurrency
    ));
    summary.push(format!(
        "Web: timeout {}s, concurrency {}",
        config.web_timeout_secs, config.web_concurrency
    ));
    summary.push(format!("Unreachable: {:?}", config.unreachable));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ReportMode, UnreachablePolicy};
    use clap::Parser;
    use std::io::Write;

    fn isolated(cli: Cli, dir: &tempfile::TempDir) -> ConfigParser {
        ConfigParser::new(cli)
            .with_env_file(dir.path().join(".env"))
            .with_env_lookup(|_| None)
    }

    #[test]
    fn test_defaults_without_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let config = isolated(Cli::parse_from(["pingtest"]), &dir).parse().unwrap();

        assert_eq!(config.mode, ReportMode::Isp);
        assert_eq!(config.concurrency, crate::defaults::DEFAULT_CONCURRENCY);
        assert_eq!(config.probe_attempts, crate::defaults::DEFAULT_PROBE_ATTEMPTS);
        assert!(!config.verbose);
        assert!(!config.debug);
    }

    #[test]
    fn test_cli_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::parse_from([
            "pingtest", "-m", "web", "--log", "--no-color", "--concurrency", "10", "--unreachable", "drop",
        ]);
        let config = isolated(cli, &dir).parse().unwrap();

        assert_eq!(config.mode, ReportMode::Web);
        assert!(config.verbose);
        assert!(!config.enable_color);
        assert_eq!(config.concurrency, 10);
        assert_eq!(config.unreachable, UnreachablePolicy::Drop);
    }

    #[test]
    fn test_layering_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join(".env")).unwrap();
        writeln!(file, "PINGTEST_ATTEMPTS=4").unwrap();
        writeln!(file, "PINGTEST_CONCURRENCY=40").unwrap();
        writeln!(file, "PINGTEST_PROBE_TIMEOUT_MS=2000").unwrap();

        let cli = Cli::parse_from(["pingtest", "--concurrency", "60"]);
        let config = isolated(cli, &dir)
            .with_env_lookup(|key| (key == "PINGTEST_ATTEMPTS").then(|| "6".to_string()))
            .parse()
            .unwrap();

        assert_eq!(config.probe_timeout_ms, 2000);
        assert_eq!(config.probe_attempts, 6);
        assert_eq!(config.concurrency, 60);
    }

    #[test]
    fn test_invalid_result_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let result = isolated(Cli::parse_from(["pingtest"]), &dir)
            .with_env_lookup(|key| (key == "PINGTEST_MIRRORS").then(|| "http://no-slash.example".to_string()))
            .parse();
        assert_eq!(result.unwrap_err().category(), "CONFIG");
    }

    #[test]
    fn test_config_summary() {
        let summary = display_config_summary(&Config::default());
        assert!(summary.contains("Mode: isp"));
        assert!(summary.contains("Mirrors:"));
        assert!(summary.contains("Probe: 3 attempts"));
    }
}
