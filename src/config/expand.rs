use regex::Regex;
use std::path::{Path, PathBuf};

const ENV_REF: &str = r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}";

/// Compiled `$env{NAME}` reference matcher, built once per config load.
#[derive(Debug, Clone)]
pub struct EnvRefs {
    re: Regex,
}

impl EnvRefs {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            re: Regex::new(ENV_REF)?,
        })
    }

    /// Replace references with the variable's value. References to unset
    /// variables stay as written so validation can report them by name.
    pub fn expand(&self, text: &str) -> String {
        self.re
            .replace_all(text, |caps: &regex::Captures| {
                std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
            })
            .into_owned()
    }

    /// Names of references still present outside YAML comment lines, sorted
    /// and deduplicated.
    pub fn unexpanded(&self, text: &str) -> Vec<String> {
        let mut names: Vec<String> = text
            .lines()
            .filter(|line| !line.trim_start().starts_with('#'))
            .flat_map(|line| self.re.captures_iter(line))
            .map(|caps| caps[1].to_string())
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

/// Expand a leading `~` component to the home directory. `~user` forms are
/// left alone.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) if rest.as_os_str().is_empty() => home,
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

/// The config file to load: `explicit` if given, otherwise the first of
/// `<config dir>/logstitch/config.yml` and `/etc/logstitch/config.yml` that
/// exists.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(expand_tilde(path));
    }

    let user = dirs::config_dir().map(|dir| dir.join("logstitch").join("config.yml"));
    let system = Some(PathBuf::from("/etc/logstitch/config.yml"));
    [user, system].into_iter().flatten().find(|path| path.exists())
}
