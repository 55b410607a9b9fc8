use crate::transfer::{CopyTool, Verification};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

fn default_program() -> PathBuf {
    PathBuf::from("rsync")
}

const fn default_validate_tool() -> bool {
    true
}

/// `copy:` section of the config file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CopyConfig {
    #[serde(default = "default_program")]
    pub program: PathBuf,
    /// Command prefix, e.g. `[ionice, -c3]`
    #[serde(default)]
    pub wrapper: Vec<String>,
    /// Elevation default for moves started from this config
    #[serde(default)]
    pub use_sudo: bool,
    #[serde(default)]
    pub extra_args: Vec<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub verify_checksum: bool,
    /// Run `program --version` while loading the config
    #[serde(default = "default_validate_tool")]
    pub validate_tool: bool,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            wrapper: Vec::new(),
            use_sudo: false,
            extra_args: Vec::new(),
            timeout_secs: None,
            verify_checksum: false,
            validate_tool: default_validate_tool(),
        }
    }
}

impl CopyConfig {
    pub fn to_tool(&self) -> CopyTool {
        let verification = if self.verify_checksum {
            Verification::Checksum
        } else {
            Verification::Size
        };

        CopyTool::new()
            .with_program(self.program.clone())
            .with_wrapper(self.wrapper.clone())
            .with_args(self.extra_args.clone())
            .with_timeout(self.timeout_secs.map(Duration::from_secs))
            .with_verification(verification)
    }
}
