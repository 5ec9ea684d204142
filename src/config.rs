//! Pipeline and runtime settings.

use std::env;
use std::path::PathBuf;

/// Default bound on nested calls before `StackOverflowException`.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 1024;

/// Settings shared by the compiler, the VM and the module loader.
#[derive(Debug, Clone)]
pub struct Config {
    /// Run the optimizer passes on every compiled method.
    pub optimize: bool,
    /// Print the disassembly of each compiled module.
    pub disassemble: bool,
    /// Directories searched for `a/b.id` when a script says `use a.b`.
    pub search_paths: Vec<PathBuf>,
    pub max_call_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            optimize: true,
            disassemble: false,
            search_paths: vec![PathBuf::from(".")],
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

impl Config {
    /// Defaults overridden by `IODINE_PATH` and `IODINE_MAX_DEPTH`.
    ///
    /// `IODINE_PATH` uses the platform path separator and is searched after
    /// the working directory. Unparsable depths are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(paths) = env::var_os("IODINE_PATH") {
            config.search_paths.extend(env::split_paths(&paths));
        }
        if let Some(depth) = env::var("IODINE_MAX_DEPTH")
            .ok()
            .and_then(|value| value.trim().parse::<usize>().ok())
        {
            config.max_call_depth = depth;
        }
        config
    }

    /// Search `dir` before every other path.
    pub fn with_search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_paths.insert(0, dir.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.optimize);
        assert!(!config.disassemble);
        assert_eq!(config.max_call_depth, DEFAULT_MAX_CALL_DEPTH);
        assert_eq!(config.search_paths, vec![PathBuf::from(".")]);
    }

    #[test]
    fn test_explicit_search_path_comes_first() {
        let config = Config::default().with_search_path("/opt/iodine");
        assert_eq!(config.search_paths[0], PathBuf::from("/opt/iodine"));
        assert_eq!(config.search_paths.len(), 2);
    }
}
