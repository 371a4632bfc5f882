use std::path::PathBuf;

use geolint_model::{ConfigError, Cutoff};

/// Settings shared by every check.
#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub cutoff: Cutoff,
    pub output_dir: PathBuf,
}

impl CheckConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            cutoff: Cutoff::none(),
            output_dir: output_dir.into(),
        }
    }

    pub fn with_cutoff(mut self, cutoff: Cutoff) -> Self {
        self.cutoff = cutoff;
        self
    }
}

/// Which orphan candidates are reported.
///
/// `untagged`: entities without any tag. `tagged`: entities whose tags all
/// come from the ignorable set (`created_by`, `source`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrphanPolicy {
    pub untagged: bool,
    pub tagged: bool,
}

impl Default for OrphanPolicy {
    fn default() -> Self {
        Self {
            untagged: true,
            tagged: true,
        }
    }
}

impl OrphanPolicy {
    /// Build from the `--untagged-only` / `--no-untagged` switches.
    pub fn from_flags(untagged_only: bool, no_untagged: bool) -> Result<Self, ConfigError> {
        Self {
            untagged: !no_untagged,
            tagged: !untagged_only,
        }
        .validate()
    }

    pub fn validate(self) -> Result<Self, ConfigError> {
        if !self.untagged && !self.tagged {
            return Err(ConfigError::NoOrphanMode);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orphan_flags() {
        assert_eq!(
            OrphanPolicy::from_flags(false, false).unwrap(),
            OrphanPolicy::default()
        );
        assert_eq!(
            OrphanPolicy::from_flags(true, false).unwrap(),
            OrphanPolicy {
                untagged: true,
                tagged: false
            }
        );
        assert_eq!(
            OrphanPolicy::from_flags(true, true),
            Err(ConfigError::NoOrphanMode)
        );
    }
}
