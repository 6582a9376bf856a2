use super::types::*;
use crate::config::{expand_tilde, EnvRefs};
use crate::tokenizer::is_supported_prefix;
use regex::Regex;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    parse_config(&yaml_string)
}

/// Parse and validate config text. Environment variables are expanded before
/// parsing and `~` in paths after.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let env_refs = EnvRefs::new()?;
    let yaml_string = env_refs.expand(yaml);
    check_unexpanded_vars(&env_refs, &yaml_string)?;

    let mut config: Config = serde_yaml::from_str(&yaml_string)?;
    expand_paths(&mut config);
    validate_config(&config)?;

    Ok(config)
}

fn check_unexpanded_vars(env_refs: &EnvRefs, yaml_string: &str) -> Result<(), ConfigError> {
    let unexpanded_vars = env_refs.unexpanded(yaml_string);
    match unexpanded_vars.as_slice() {
        [] => Ok(()),
        [name] => Err(ConfigError::Validation(format!(
            "environment variable $env{{{0}}} is not set; export {0} or replace the reference in the config file",
            name
        ))),
        names => Err(ConfigError::Validation(format!(
            "environment variables are not set: {}",
            names.join(", ")
        ))),
    }
}

fn expand_paths(config: &mut Config) {
    for server in config.servers.values_mut() {
        if let Some(path) = server.log_tail.as_mut() {
            *path = expand_tilde(path);
        }
    }
    if let Some(dir) = config.output.spool_dir.as_mut() {
        *dir = expand_tilde(dir);
    }
    if let Some(dir) = config.output.artifact_dir.as_mut() {
        *dir = expand_tilde(dir);
    }
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.servers.is_empty() {
        errors.push("config must define at least one server under 'servers'".to_string());
    }

    for (name, server) in &config.servers {
        validate_server(name, server, config.has_http(), &mut errors);
    }

    let stream = &config.stream;
    if stream.ready_threshold.is_zero() {
        errors.push("stream.ready_threshold must be greater than zero".to_string());
    }
    if stream.tick_interval.is_zero() {
        errors.push("stream.tick_interval must be greater than zero".to_string());
    }
    if stream.queue_len == 0 {
        errors.push("stream.queue_len must be greater than zero".to_string());
    }

    if let Some(http) = &config.http {
        if http.listen.parse::<SocketAddr>().is_err() {
            errors.push(format!(
                "http.listen: '{}' is not a valid socket address (expected host:port)",
                http.listen
            ));
        }
    }

    if config.output.submit_attempts == 0 {
        errors.push("output.submit_attempts must be greater than zero".to_string());
    }

    if let Some(endpoint) = &config.output.endpoint {
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            errors.push(format!(
                "output.endpoint: '{}' must be an http:// or https:// URL",
                endpoint
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_server(name: &str, server: &ServerConfig, has_http: bool, errors: &mut Vec<String>) {
    if server.log_tail.is_none() && !has_http {
        errors.push(format!(
            "server '{}': no log input; set 'log_tail' or configure the 'http' receiver",
            name
        ));
    }

    if let Some(prefix) = &server.log_prefix {
        if !is_supported_prefix(prefix) {
            errors.push(format!(
                "server '{}': unsupported log_prefix '{}'",
                name, prefix
            ));
        }
    }

    for (i, pattern) in server.ignore_patterns.iter().enumerate() {
        if let Err(e) = Regex::new(pattern) {
            errors.push(format!(
                "server '{}': ignore_patterns[{}]: invalid regex: {}",
                name, i, e
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const MINIMAL: &str = r#"
servers:
  primary:
    log_tail: /var/log/postgresql/postgresql.log
"#;

    #[test]
    fn test_defaults() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.stream.ready_threshold, Duration::from_secs(3));
        assert_eq!(config.stream.tick_interval, Duration::from_secs(3));
        assert_eq!(config.stream.max_jitter, Duration::from_millis(500));
        assert_eq!(config.stream.queue_len, 10_000);
        assert!(config.http.is_none());
        assert!(config.output.spool_dir.is_none());

        let primary = &config.servers["primary"];
        assert!(!primary.log_tail_from_start);
        assert!(primary.ignore_patterns.is_empty());
        assert_eq!(config.tailed_servers().count(), 1);
    }

    #[test]
    fn test_humantime_durations() {
        let yaml = format!(
            "{}stream:\n  ready_threshold: 1500ms\n  tick_interval: 2s\n  max_jitter: 0s\n",
            MINIMAL
        );
        let config = parse_config(&yaml).unwrap();
        assert_eq!(config.stream.ready_threshold, Duration::from_millis(1500));
        assert_eq!(config.stream.tick_interval, Duration::from_secs(2));
        assert_eq!(config.stream.max_jitter, Duration::ZERO);
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let yaml = r#"
servers:
  a:
    log_prefix: "%h "
    ignore_patterns: ["(unclosed"]
stream:
  tick_interval: 0s
http:
  listen: not-an-address
output:
  endpoint: ftp://example.com
  submit_attempts: 0
"#;
        let errors = match parse_config(yaml).unwrap_err() {
            ConfigError::ValidationList(errors) => errors,
            other => panic!("expected validation list, got {other}"),
        };
        assert_eq!(errors.len(), 6, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("submit_attempts")));
        assert!(errors.iter().any(|e| e.contains("unsupported log_prefix")));
        assert!(errors.iter().any(|e| e.contains("ignore_patterns[0]")));
        assert!(errors.iter().any(|e| e.contains("tick_interval")));
        assert!(errors.iter().any(|e| e.contains("http.listen")));
        assert!(errors.iter().any(|e| e.contains("output.endpoint")));
    }

    #[test]
    fn test_server_needs_input() {
        let err = parse_config("servers:\n  lonely: {}\n").unwrap_err();
        assert!(err.to_string().contains("no log input"));

        let config = parse_config("servers:\n  pushed: {}\nhttp:\n  listen: 127.0.0.1:8089\n").unwrap();
        assert!(config.has_http());
        assert_eq!(config.tailed_servers().count(), 0);
    }

    #[test]
    fn test_empty_servers() {
        let err = parse_config("servers: {}\n").unwrap_err();
        assert!(err.to_string().contains("at least one server"));
    }

    #[test]
    fn test_unset_env_var() {
        let yaml = "servers:\n  a:\n    log_tail: $env{LOGSTITCH_UNSET_TEST_VAR}/pg.log\n";
        let err = parse_config(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("LOGSTITCH_UNSET_TEST_VAR"));
    }

    #[test]
    fn test_env_reference_in_comment_is_ignored() {
        let yaml = format!("# paths may use $env{{LOGSTITCH_UNSET_TEST_VAR}}\n{}", MINIMAL);
        let config = parse_config(&yaml).unwrap();
        assert_eq!(config.servers.len(), 1);
    }
}
