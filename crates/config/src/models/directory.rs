use crate::validation::{ConfigValidator, ValidationUtils};
use serde::{Deserialize, Serialize};

/// 启动时需要通知上线的已知接入点
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryConfig {
    pub known_destinations: Vec<String>,
}

impl ConfigValidator for DirectoryConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        for destination in &self.known_destinations {
            ValidationUtils::validate_not_empty(destination, "directory.known_destinations")?;
        }
        Ok(())
    }
}
