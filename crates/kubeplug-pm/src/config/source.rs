use std::env;
use std::path::PathBuf;

pub const ROOT_ENV: &str = "KUBEPLUG_ROOT";
pub const OS_ENV: &str = "KUBEPLUG_OS";
pub const ARCH_ENV: &str = "KUBEPLUG_ARCH";

/// Reads `KUBEPLUG_*` overrides, falling back to platform defaults.
#[derive(Debug)]
pub struct ConfigLoader {
    use_environment: bool,
}

impl ConfigLoader {
    pub fn new(use_environment: bool) -> Self {
        Self { use_environment }
    }

    /// Get a non-empty environment variable, if environment lookups are enabled
    pub fn get_env(&self, var: &str) -> Option<String> {
        if !self.use_environment {
            return None;
        }

        env::var(var).ok().filter(|s| !s.is_empty())
    }

    /// Get the base directory holding bin/, index/, receipts/ and store/
    pub fn get_base_dir(&self) -> PathBuf {
        if let Some(root) = self.get_env(ROOT_ENV) {
            return PathBuf::from(root);
        }

        if let Some(home_dir) = directories::BaseDirs::new() {
            home_dir.home_dir().join(".kubeplug")
        } else {
            PathBuf::from(".kubeplug")
        }
    }

    /// Target OS override
    pub fn get_os(&self) -> Option<String> {
        self.get_env(OS_ENV)
    }

    /// Target architecture override
    pub fn get_arch(&self) -> Option<String> {
        self.get_env(ARCH_ENV)
    }
}
