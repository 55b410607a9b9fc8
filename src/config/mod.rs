mod copy;
mod error;

pub use copy::CopyConfig;
pub use error::{ConfigError, Result};

use crate::media::LibraryRoots;
use crate::naming::MovieLayout;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    pub library: LibraryRoots,
    #[serde(default)]
    pub copy: CopyConfig,
    #[serde(default)]
    pub movie_layout: MovieLayout,
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config = Self::parse(&contents)?;
        if config.copy.validate_tool {
            config.check_copy_tool()?;
        }
        Ok(config)
    }

    /// Parse and validate library paths; the copy tool is not probed
    pub fn parse(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (library, path) in [
            ("movies", &self.library.movie_path),
            ("tv", &self.library.tv_path),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::MissingLibraryPath { library });
            }
            if !path.is_absolute() {
                return Err(ConfigError::RelativeLibraryPath {
                    library,
                    path: path.clone(),
                });
            }
        }

        if self.library.movie_path == self.library.tv_path {
            return Err(ConfigError::SameLibraryPaths {
                path: self.library.movie_path.clone(),
            });
        }

        Ok(())
    }

    /// Make sure the configured copy program starts
    pub fn check_copy_tool(&self) -> Result<()> {
        self.copy
            .to_tool()
            .probe()
            .map_err(|e| ConfigError::CopyToolUnavailable {
                program: self.copy.program.display().to_string(),
                reason: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    #[test]
    fn test_deserialize_full_config() {
        let yaml = r"
library:
  movies: /library/Movies
  tv: /library/TV
copy:
  program: rsync
  use_sudo: true
  extra_args: [--bwlimit=50000]
  timeout_secs: 7200
  verify_checksum: true
movie_layout: folder
";
        let config = EngineConfig::parse(yaml).unwrap();
        assert_eq!(config.library.movie_path, PathBuf::from("/library/Movies"));
        assert_eq!(config.library.tv_path, PathBuf::from("/library/TV"));
        assert!(config.copy.use_sudo);
        assert_eq!(config.copy.timeout_secs, Some(7200));
        assert_eq!(config.movie_layout, MovieLayout::Folder);
    }

    #[test]
    fn test_minimal_config_defaults() {
        let yaml = r"
library:
  movies: /library/Movies
  tv: /library/TV
";
        let config = EngineConfig::parse(yaml).unwrap();
        assert_eq!(config.copy, CopyConfig::default());
        assert_eq!(config.movie_layout, MovieLayout::Flat);
    }

    #[test]
    fn test_missing_library_path() {
        let yaml = r"
library:
  movies: /library/Movies
";
        let err = EngineConfig::parse(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::MissingLibraryPath { library: "tv" }));
    }

    #[test]
    fn test_relative_library_path() {
        let yaml = r"
library:
  movies: library/Movies
  tv: /library/TV
";
        let err = EngineConfig::parse(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::RelativeLibraryPath { library: "movies", .. }));
    }

    #[test]
    fn test_same_library_paths() {
        let yaml = r"
library:
  movies: /library/Media
  tv: /library/Media
";
        assert!(matches!(
            EngineConfig::parse(yaml),
            Err(ConfigError::SameLibraryPaths { .. })
        ));
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            EngineConfig::parse("library: [unclosed"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_file_without_tool_probe() {
        let yaml = r"
library:
  movies: /library/Movies
  tv: /library/TV
copy:
  program: /nonexistent/rsync
  validate_tool: false
";
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.copy.program, PathBuf::from("/nonexistent/rsync"));
    }

    #[test]
    fn test_from_file_probes_tool() {
        let yaml = r"
library:
  movies: /library/Movies
  tv: /library/TV
copy:
  program: /nonexistent/rsync
";
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        assert!(matches!(
            EngineConfig::from_file(file.path()),
            Err(ConfigError::CopyToolUnavailable { .. })
        ));
    }

    #[test]
    fn test_from_file_missing() {
        assert!(matches!(
            EngineConfig::from_file(Path::new("/nonexistent/plexmove.yaml")),
            Err(ConfigError::Io(_))
        ));
    }
}
