use serde::{Deserialize, Serialize};

use super::counter_path::CounterPath;
use crate::errors::{HostStatError, HostStatResult};

/// 脚本名称最大长度
pub const MAX_SCRIPT_NAME_LEN: usize = 64;

/// 用户脚本定义
///
/// 脚本需定义无参函数 `execute()`，可调用宿主函数 `persist(value)` 与 `getCounterValue()`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptDefinition {
    pub name: String,
    #[serde(alias = "scriptText")]
    pub source_text: String,
    #[serde(alias = "metricName")]
    pub counter_path: String,
}

impl ScriptDefinition {
    pub fn new(
        name: impl Into<String>,
        source_text: impl Into<String>,
        counter_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source_text: source_text.into(),
            counter_path: counter_path.into(),
        }
    }

    /// 校验脚本定义的字段格式
    pub fn validate(&self) -> HostStatResult<()> {
        if self.name.is_empty() {
            return Err(HostStatError::InvalidScript("脚本名称不能为空".to_string()));
        }

        if self.name.len() > MAX_SCRIPT_NAME_LEN {
            return Err(HostStatError::InvalidScript(format!(
                "脚本名称长度不能超过{MAX_SCRIPT_NAME_LEN}个字符"
            )));
        }

        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(HostStatError::InvalidScript(format!(
                "脚本名称只能包含字母、数字、'_'、'-'、'.': {}",
                self.name
            )));
        }

        if self.source_text.trim().is_empty() {
            return Err(HostStatError::InvalidScript(format!(
                "脚本内容不能为空: {}",
                self.name
            )));
        }

        self.counter_path.parse::<CounterPath>()?;

        Ok(())
    }
}

/// 脚本列表响应 `{"scripts": [...]}`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptList {
    pub scripts: Vec<ScriptDefinition>,
}
