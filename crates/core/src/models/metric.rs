use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::epoch::Epoch;
use crate::errors::{HostStatError, HostStatResult};

/// 列的存储类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Real,
    Integer,
    Text,
}

impl ColumnType {
    pub fn sql_type(self) -> &'static str {
        match self {
            ColumnType::Real => "REAL",
            ColumnType::Integer => "INTEGER",
            ColumnType::Text => "TEXT",
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, ColumnType::Text)
    }

    pub fn default_value(self) -> SampleValue {
        match self {
            ColumnType::Real => SampleValue::Real(0.0),
            ColumnType::Integer => SampleValue::Integer(0),
            ColumnType::Text => SampleValue::Text(String::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnType,
}

impl ColumnDef {
    pub const fn real(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnType::Real,
        }
    }

    pub const fn integer(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnType::Integer,
        }
    }

    pub const fn text(name: &'static str) -> Self {
        Self {
            name,
            kind: ColumnType::Text,
        }
    }
}

/// 采集表结构
///
/// 除业务列外，每张表固定带有 `id`、`epoch`、`timestamp` 三列。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub table: &'static str,
    pub columns: &'static [ColumnDef],
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// 查找可聚合的数值列，列不存在或非数值列时返回错误
    pub fn numeric_column(&self, name: &str) -> HostStatResult<&ColumnDef> {
        self.column(name)
            .filter(|c| c.kind.is_numeric())
            .ok_or_else(|| HostStatError::InvalidColumn {
                table: self.table.to_string(),
                column: name.to_string(),
            })
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }
}

/// 脚本 `persist(value)` 写入的表
pub const SCRIPT_DATA_SCHEMA: TableSchema = TableSchema {
    table: "script_data",
    columns: &[ColumnDef::text("script_name"), ColumnDef::real("value")],
};

/// 单个字段的采样值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<f64> for SampleValue {
    fn from(value: f64) -> Self {
        SampleValue::Real(value)
    }
}

impl From<f32> for SampleValue {
    fn from(value: f32) -> Self {
        SampleValue::Real(value as f64)
    }
}

impl From<i64> for SampleValue {
    fn from(value: i64) -> Self {
        SampleValue::Integer(value)
    }
}

impl From<u64> for SampleValue {
    fn from(value: u64) -> Self {
        SampleValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for SampleValue {
    fn from(value: usize) -> Self {
        SampleValue::Integer(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<String> for SampleValue {
    fn from(value: String) -> Self {
        SampleValue::Text(value)
    }
}

impl From<&str> for SampleValue {
    fn from(value: &str) -> Self {
        SampleValue::Text(value.to_string())
    }
}

/// 某个采集源在一个周期内的一行样本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub epoch: Epoch,
    pub values: BTreeMap<String, SampleValue>,
    /// Unix时间戳（秒）
    pub timestamp: i64,
}

impl MetricSample {
    pub fn new(epoch: Epoch) -> Self {
        Self {
            epoch,
            values: BTreeMap::new(),
            timestamp: Utc::now().timestamp(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn set(&mut self, column: &str, value: impl Into<SampleValue>) -> &mut Self {
        self.values.insert(column.to_string(), value.into());
        self
    }

    /// 按表结构取列值，缺失的列使用类型默认值
    pub fn value_for(&self, column: &ColumnDef) -> SampleValue {
        self.values
            .get(column.name)
            .cloned()
            .unwrap_or_else(|| column.kind.default_value())
    }

    /// 样本中是否含有表结构之外的列
    pub fn unknown_columns<'a>(&'a self, schema: &TableSchema) -> Vec<&'a str> {
        self.values
            .keys()
            .filter(|k| schema.column(k).is_none())
            .map(String::as_str)
            .collect()
    }
}

/// 列聚合结果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub max: Option<f64>,
    pub min: Option<f64>,
    pub avg: Option<f64>,
    pub total: f64,
    pub count: i64,
}

/// 采集调度器状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectorInfo {
    pub is_active: bool,
    pub provider_names: Vec<String>,
}
