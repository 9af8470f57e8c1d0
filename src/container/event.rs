//! 容器事件
//!
//! 定义模块容器发布的事件以及监听器使用的主题过滤器。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 日志配置事件中的元数据键
pub mod logger_keys {
    /// 需要调整的日志目标，逗号分隔
    pub const NAMES: &str = "logger.names";
    /// 日志级别
    pub const LEVEL: &str = "logger.level";
}

/// 容器事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerEventKind {
    /// 容器已启动
    Started,
    /// 容器已停止
    Stopped,
    /// 容器错误
    Error,
    /// 容器警告
    Warning,
    /// 容器提示信息
    Info,
    /// 等待停止超时
    WaitTimedOut,
    /// 模块已安装
    ModuleInstalled,
    /// 模块已启动
    ModuleStarted,
    /// 模块已停止
    ModuleStopped,
    /// 配置已更新
    ConfigurationUpdated,
}

impl ContainerEventKind {
    /// 稳定的显示名称
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerEventKind::Started => "STARTED",
            ContainerEventKind::Stopped => "STOPPED",
            ContainerEventKind::Error => "ERROR",
            ContainerEventKind::Warning => "WARNING",
            ContainerEventKind::Info => "INFO",
            ContainerEventKind::WaitTimedOut => "WAIT_TIMEDOUT",
            ContainerEventKind::ModuleInstalled => "MODULE_INSTALLED",
            ContainerEventKind::ModuleStarted => "MODULE_STARTED",
            ContainerEventKind::ModuleStopped => "MODULE_STOPPED",
            ContainerEventKind::ConfigurationUpdated => "CONFIGURATION_UPDATED",
        }
    }
}

impl fmt::Display for ContainerEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 容器事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerEvent {
    /// 事件类型
    pub kind: ContainerEventKind,

    /// 事件来源（容器名称或模块 ID）
    pub source: String,

    /// 附带消息
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// 事件元数据
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,

    /// 事件时间戳
    pub timestamp: DateTime<Utc>,
}

impl ContainerEvent {
    /// 创建新事件
    pub fn new(kind: ContainerEventKind, source: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            message: None,
            metadata: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// 设置消息
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// 添加元数据
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// 构造日志配置更新事件
    ///
    /// `names` 为空时表示调整全局级别。
    pub fn logger_update(source: impl Into<String>, names: &[&str], level: &str) -> Self {
        let mut event = Self::new(ContainerEventKind::ConfigurationUpdated, source)
            .with_metadata(logger_keys::LEVEL, level);
        if !names.is_empty() {
            event = event.with_metadata(logger_keys::NAMES, names.join(","));
        }
        event
    }

    /// 获取元数据
    pub fn get(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// 事件主题过滤器
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicFilter {
    /// 匹配所有事件
    Any,
    /// 按事件类型匹配
    Kind(ContainerEventKind),
    /// 元数据中存在指定键
    HasKey(String),
    /// 任一子过滤器匹配
    AnyOf(Vec<TopicFilter>),
    /// 所有子过滤器匹配
    AllOf(Vec<TopicFilter>),
}

impl TopicFilter {
    /// 日志配置主题：元数据声明了 `logger.names` 或 `logger.level`
    pub fn logger_config() -> Self {
        TopicFilter::AnyOf(vec![
            TopicFilter::HasKey(logger_keys::NAMES.to_string()),
            TopicFilter::HasKey(logger_keys::LEVEL.to_string()),
        ])
    }

    /// 容器生命周期主题：除配置更新外的所有事件
    pub fn container_lifecycle() -> Self {
        use ContainerEventKind::*;
        TopicFilter::AnyOf(
            [
                Started,
                Stopped,
                Error,
                Warning,
                Info,
                WaitTimedOut,
                ModuleInstalled,
                ModuleStarted,
                ModuleStopped,
            ]
            .into_iter()
            .map(TopicFilter::Kind)
            .collect(),
        )
    }

    /// 检查事件是否匹配
    pub fn matches(&self, event: &ContainerEvent) -> bool {
        match self {
            TopicFilter::Any => true,
            TopicFilter::Kind(kind) => event.kind == *kind,
            TopicFilter::HasKey(key) => event.metadata.contains_key(key),
            TopicFilter::AnyOf(filters) => filters.iter().any(|f| f.matches(event)),
            TopicFilter::AllOf(filters) => filters.iter().all(|f| f.matches(event)),
        }
    }
}

impl fmt::Display for TopicFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicFilter::Any => f.write_str("(*)"),
            TopicFilter::Kind(kind) => write!(f, "(kind={})", kind),
            TopicFilter::HasKey(key) => write!(f, "({}=*)", key),
            TopicFilter::AnyOf(filters) => {
                f.write_str("(|")?;
                for filter in filters {
                    write!(f, "{}", filter)?;
                }
                f.write_str(")")
            }
            TopicFilter::AllOf(filters) => {
                f.write_str("(&")?;
                for filter in filters {
                    write!(f, "{}", filter)?;
                }
                f.write_str(")")
            }
        }
    }
}
