//! Compiler configuration

use crate::error::CompileResult;
use crate::optimize::OptLevel;
use serde::{Deserialize, Serialize};

/// Name of the function the VM starts in unless configured otherwise
pub const DEFAULT_ENTRY: &str = "main";

/// Options controlling one compilation
///
/// Loadable from TOML:
///
/// ```toml
/// entry = "start"
/// opt_level = "none"
/// verify = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompileOptions {
    /// Entry function recorded in the program header
    pub entry: String,
    /// Optimization level
    pub opt_level: OptLevel,
    /// Run the bytecode verifier after relocation
    pub verify: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            entry: DEFAULT_ENTRY.to_string(),
            opt_level: OptLevel::default(),
            verify: true,
        }
    }
}

impl CompileOptions {
    /// Parse options from TOML text; missing keys keep their defaults
    pub fn from_toml(text: &str) -> CompileResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn with_opt_level(mut self, opt_level: OptLevel) -> Self {
        self.opt_level = opt_level;
        self
    }

    pub fn with_entry(mut self, entry: impl Into<String>) -> Self {
        self.entry = entry.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CompileOptions::default();
        assert_eq!(options.entry, "main");
        assert_eq!(options.opt_level, OptLevel::Basic);
        assert!(options.verify);
    }

    #[test]
    fn test_from_toml() {
        let options = CompileOptions::from_toml("entry = \"start\"\nopt_level = \"none\"\n").unwrap();
        assert_eq!(options.entry, "start");
        assert_eq!(options.opt_level, OptLevel::None);
        assert!(options.verify);
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        assert!(CompileOptions::from_toml("inline = true").is_err());
    }
}
