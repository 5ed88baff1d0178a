use std::fmt;

use aurora_errors::{DispatchError, DispatchResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 上线通知命令名，同时也是其超时分组键
pub const SYN_COMMAND: &str = "SYN";

/// 没有切片标签的普通命令使用的分组键
pub const UNTAGGED_GROUP: &str = "NONE";

/// 发往接入点的命令，JSON 对象原样作为消息体发布
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Command(Map<String, Value>);

impl Command {
    pub fn named(name: &str) -> Self {
        let mut body = Map::new();
        body.insert("command".to_string(), Value::String(name.to_string()));
        Self(body)
    }

    pub fn syn() -> Self {
        Self::named(SYN_COMMAND)
    }

    /// 切片插件生成的 create_slice 外层结构
    pub fn create_slice(user: &str, slice: &str, config: Value) -> Self {
        Self::named("create_slice")
            .with_slice(slice)
            .with_field("user", user)
            .with_field("config", config)
    }

    pub fn with_slice(self, slice: &str) -> Self {
        self.with_field("slice", slice)
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("command").and_then(Value::as_str)
    }

    pub fn slice(&self) -> Option<&str> {
        self.0.get("slice").and_then(Value::as_str)
    }

    pub fn is_presence_announcement(&self) -> bool {
        self.name() == Some(SYN_COMMAND)
    }

    pub fn group_key(&self) -> GroupKey {
        if self.is_presence_announcement() {
            return GroupKey::Syn;
        }
        match self.slice() {
            Some(slice) => GroupKey::Slice(slice.to_string()),
            None => GroupKey::Untagged,
        }
    }

    pub fn body(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl TryFrom<Value> for Command {
    type Error = DispatchError;

    fn try_from(value: Value) -> DispatchResult<Self> {
        match value {
            Value::Object(body) => Ok(Self(body)),
            other => Err(DispatchError::invalid_command(format!(
                "命令必须是JSON对象，实际为: {other}"
            ))),
        }
    }
}

impl std::str::FromStr for Command {
    type Err = DispatchError;

    fn from_str(s: &str) -> DispatchResult<Self> {
        let value: Value = serde_json::from_str(s)?;
        Self::try_from(value)
    }
}

/// 超时回调用来判断哪个逻辑单元失败的分组键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Syn,
    Slice(String),
    Untagged,
}

impl GroupKey {
    pub fn as_str(&self) -> &str {
        match self {
            GroupKey::Syn => SYN_COMMAND,
            GroupKey::Slice(slice) => slice,
            GroupKey::Untagged => UNTAGGED_GROUP,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_syn_command() {
        let command = Command::syn();
        assert!(command.is_presence_announcement());
        assert_eq!(command.group_key(), GroupKey::Syn);
        assert_eq!(command.into_value(), json!({"command": "SYN"}));
    }

    #[test]
    fn test_slice_group_key() {
        let command = Command::named("delete_slice").with_slice("tenant-7");
        assert_eq!(command.group_key(), GroupKey::Slice("tenant-7".to_string()));
        assert_eq!(command.group_key().to_string(), "tenant-7");
    }

    #[test]
    fn test_untagged_group_key() {
        let command = Command::named("reset");
        assert_eq!(command.group_key(), GroupKey::Untagged);
        assert_eq!(command.group_key().as_str(), "NONE");

        // slice 字段不是字符串时也视为未标记
        let command = Command::named("reset").with_field("slice", 42);
        assert_eq!(command.group_key(), GroupKey::Untagged);
    }

    #[test]
    fn test_create_slice_wrapper_shape() {
        let config = json!({"VirtualInterfaces": [{"name": "vif0"}]});
        let command = Command::create_slice("user-1", "slice-a", config.clone());
        assert_eq!(
            command.into_value(),
            json!({
                "command": "create_slice",
                "slice": "slice-a",
                "user": "user-1",
                "config": config,
            })
        );
    }

    #[test]
    fn test_command_from_value() {
        let command = Command::try_from(json!({"command": "SYN", "extra": [1, 2]})).unwrap();
        assert!(command.is_presence_announcement());
        assert_eq!(command.body().len(), 2);

        let err = Command::try_from(json!(["not", "an", "object"])).unwrap_err();
        assert!(matches!(err, DispatchError::InvalidCommand(_)));
    }

    #[test]
    fn test_command_from_str() {
        let command: Command = r#"{"command":"create_slice","slice":"s1"}"#.parse().unwrap();
        assert_eq!(command.name(), Some("create_slice"));
        assert_eq!(command.slice(), Some("s1"));

        assert!("{broken".parse::<Command>().is_err());
        assert!("42".parse::<Command>().is_err());
    }
}
