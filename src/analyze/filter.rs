use regex::RegexSet;

/// Decides whether an analyzable record is noise that should never reach an
/// artifact.
pub trait LineFilter: Send + Sync {
    fn should_ignore(&self, content: &str) -> bool;
}

impl<F> LineFilter for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn should_ignore(&self, content: &str) -> bool {
        self(content)
    }
}

/// Keeps everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFilter;

impl LineFilter for NoFilter {
    fn should_ignore(&self, _content: &str) -> bool {
        false
    }
}

/// Suppresses records whose content matches any configured pattern.
#[derive(Debug, Clone)]
pub struct IgnorePatterns {
    set: RegexSet,
}

impl IgnorePatterns {
    pub fn new<I, S>(patterns: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            set: RegexSet::new(patterns)?,
        })
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

impl LineFilter for IgnorePatterns {
    fn should_ignore(&self, content: &str) -> bool {
        self.set.is_match(content)
    }
}
