use std::fmt;
use std::str::FromStr;

use crate::errors::{HostStatError, HostStatResult};

/// 主机计数器路径 `object[instance]/counter`
///
/// `instance` 可选，可包含 `/`（如挂载点 `disk[/home]/used`），但不能包含 `]`。
/// 对象名与计数器名只允许ASCII字母、数字和下划线，解析后统一转为小写。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterPath {
    pub object: String,
    pub instance: Option<String>,
    pub counter: String,
}

impl CounterPath {
    pub fn new(object: &str, instance: Option<&str>, counter: &str) -> Self {
        Self {
            object: object.to_ascii_lowercase(),
            instance: instance.map(str::to_string),
            counter: counter.to_ascii_lowercase(),
        }
    }

    pub fn instance(&self) -> Option<&str> {
        self.instance.as_deref()
    }
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl FromStr for CounterPath {
    type Err = HostStatError;

    fn from_str(raw: &str) -> HostStatResult<Self> {
        let invalid = |message: &str| HostStatError::InvalidCounterPath {
            path: raw.to_string(),
            message: message.to_string(),
        };

        let path = raw.trim();
        let object_end = path
            .find(['[', '/'])
            .ok_or_else(|| invalid("缺少'/'分隔符"))?;
        let object = &path[..object_end];
        let mut rest = &path[object_end..];

        let mut instance = None;
        if let Some(after_bracket) = rest.strip_prefix('[') {
            let close = after_bracket
                .find(']')
                .ok_or_else(|| invalid("实例缺少右括号"))?;
            let name = &after_bracket[..close];
            if name.is_empty() {
                return Err(invalid("实例名称不能为空"));
            }
            instance = Some(name);
            rest = &after_bracket[close + 1..];
        }

        let counter = rest
            .strip_prefix('/')
            .ok_or_else(|| invalid("缺少'/'分隔符"))?;

        if !is_identifier(object) {
            return Err(invalid("对象名称无效"));
        }
        if !is_identifier(counter) {
            return Err(invalid("计数器名称无效"));
        }

        Ok(CounterPath::new(object, instance, counter))
    }
}

impl fmt::Display for CounterPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.instance {
            Some(instance) => write!(f, "{}[{}]/{}", self.object, instance, self.counter),
            None => write!(f, "{}/{}", self.object, self.counter),
        }
    }
}
