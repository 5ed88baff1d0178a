use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 关联 ID，格式为 `<destination>-<suffix>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// suffix 为空时生成随机 UUID 作为后缀
    pub fn new(destination: &str, suffix: Option<&str>) -> Self {
        match suffix {
            Some(suffix) => Self(format!("{destination}-{suffix}")),
            None => Self::generate(destination),
        }
    }

    pub fn generate(destination: &str) -> Self {
        Self(format!("{destination}-{}", Uuid::new_v4()))
    }

    /// 从回复消息中携带的原始字符串恢复
    pub fn from_raw<S: Into<String>>(raw: S) -> Self {
        Self(raw.into())
    }

    pub fn destination_prefix(destination: &str) -> String {
        format!("{destination}-")
    }

    /// 是否以 `<destination>-` 为前缀
    pub fn belongs_to(&self, destination: &str) -> bool {
        self.0
            .strip_prefix(destination)
            .is_some_and(|rest| rest.starts_with('-'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_explicit_suffix() {
        let id = CorrelationId::new("ap1", Some("req42"));
        assert_eq!(id.as_str(), "ap1-req42");
    }

    #[test]
    fn test_generated_suffixes_are_distinct() {
        let ids: HashSet<CorrelationId> =
            (0..256).map(|_| CorrelationId::new("ap1", None)).collect();
        assert_eq!(ids.len(), 256);
        assert!(ids.iter().all(|id| id.as_str().starts_with("ap1-")));
    }

    #[test]
    fn test_belongs_to() {
        let id = CorrelationId::new("ap1", Some("req42"));
        assert!(id.belongs_to("ap1"));
        assert!(!id.belongs_to("ap"));
        assert!(!id.belongs_to("ap12"));
        assert!(!id.belongs_to("ap1-req42"));
        assert_eq!(CorrelationId::destination_prefix("ap1"), "ap1-");
    }

    #[test]
    fn test_destination_round_trip() {
        for destination in ["ap1", "openflow-kevin", "10.0.0.7"] {
            let id = CorrelationId::new(destination, None);
            assert!(id.belongs_to(destination));
            assert!(id
                .as_str()
                .starts_with(&CorrelationId::destination_prefix(destination)));
        }
    }
}
