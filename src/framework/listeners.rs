//! 事件监听与挂接
//!
//! 容器启动后、安装模块前挂接两个监听器：
//!
//! - [`LifecycleListener`]：记录容器生命周期事件
//! - [`ConfigTopicListener`]：把容器发布的日志配置应用到当前进程

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::container::{
    logger_keys, ContainerEvent, ContainerEventKind, ContainerListener, ListenerId,
    ModuleContainer, TopicFilter,
};
use crate::utils::{LogLevelControl, Result};

/// 容器生命周期日志监听器
///
/// 只记录日志，不修改任何状态。
#[derive(Debug, Default)]
pub struct LifecycleListener;

impl ContainerListener for LifecycleListener {
    fn on_event(&self, event: &ContainerEvent) {
        let detail = event.message.as_deref().unwrap_or_default();
        match event.kind {
            ContainerEventKind::Error => {
                error!(source = %event.source, event = %event.kind, detail, "模块容器报告错误")
            }
            ContainerEventKind::Warning | ContainerEventKind::WaitTimedOut => {
                warn!(source = %event.source, event = %event.kind, detail, "模块容器警告")
            }
            ContainerEventKind::Started | ContainerEventKind::Stopped => {
                info!(source = %event.source, event = %event.kind, "模块容器状态变更")
            }
            _ => debug!(source = %event.source, event = %event.kind, detail, "模块容器事件"),
        }
    }
}

/// 把日志配置事件转换为 EnvFilter 指令
///
/// `logger.names` 为逗号分隔的目标列表，每个目标生成 `name=level`；
/// 没有目标时返回单独的级别。缺少级别时返回 `None`。
pub fn logging_directives(event: &ContainerEvent) -> Option<String> {
    let level = event
        .get(logger_keys::LEVEL)
        .map(str::trim)
        .filter(|l| !l.is_empty())?
        .to_lowercase();

    let names: Vec<&str> = event
        .get(logger_keys::NAMES)
        .map(|names| {
            names
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if names.is_empty() {
        Some(level)
    } else {
        Some(
            names
                .iter()
                .map(|name| format!("{}={}", name, level))
                .collect::<Vec<_>>()
                .join(","),
        )
    }
}

/// 日志配置主题监听器
#[derive(Default)]
pub struct ConfigTopicListener {
    control: Option<Arc<dyn LogLevelControl>>,
}

impl ConfigTopicListener {
    pub fn new(control: Option<Arc<dyn LogLevelControl>>) -> Self {
        Self { control }
    }
}

impl ContainerListener for ConfigTopicListener {
    fn on_event(&self, event: &ContainerEvent) {
        let Some(directives) = logging_directives(event) else {
            warn!(source = %event.source, "日志配置事件缺少 logger.level，已忽略");
            return;
        };

        match &self.control {
            Some(control) => {
                if let Err(e) = control.apply(&directives) {
                    warn!(directives = %directives, error = %e, "应用日志配置失败");
                }
            }
            None => debug!(directives = %directives, "未配置日志控制句柄，忽略日志配置事件"),
        }
    }
}

/// 已注册的监听器标识
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ListenerSet {
    pub lifecycle: Option<ListenerId>,
    pub config_topic: Option<ListenerId>,
}

impl ListenerSet {
    pub fn is_empty(&self) -> bool {
        self.lifecycle.is_none() && self.config_topic.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.lifecycle.is_some() && self.config_topic.is_some()
    }
}

/// 事件挂接
#[derive(Default, Clone)]
pub struct EventWiring {
    log_control: Option<Arc<dyn LogLevelControl>>,
}

impl EventWiring {
    pub fn new(log_control: Option<Arc<dyn LogLevelControl>>) -> Self {
        Self { log_control }
    }

    /// 注册两个监听器
    ///
    /// 每注册成功一个就写入 `set`，失败时已注册的部分仍可由 [`detach`](Self::detach) 移除。
    pub async fn attach(&self, container: &dyn ModuleContainer, set: &mut ListenerSet) -> Result<()> {
        let lifecycle = container
            .add_listener(
                Arc::new(LifecycleListener),
                TopicFilter::container_lifecycle(),
            )
            .await?;
        set.lifecycle = Some(lifecycle);

        let config_topic = container
            .add_listener(
                Arc::new(ConfigTopicListener::new(self.log_control.clone())),
                TopicFilter::logger_config(),
            )
            .await?;
        set.config_topic = Some(config_topic);

        debug!(%lifecycle, %config_topic, "容器事件监听器已注册");
        Ok(())
    }

    /// 移除监听器
    ///
    /// 先移除配置主题监听器，再移除生命周期监听器。错误只记录日志，结束后 `set` 被清空。
    pub async fn detach(&self, container: Option<&dyn ModuleContainer>, set: &mut ListenerSet) {
        let pending = [set.config_topic.take(), set.lifecycle.take()];

        let Some(container) = container else {
            if pending.iter().any(Option::is_some) {
                warn!("模块容器句柄已释放，无法移除监听器");
            }
            return;
        };

        for id in pending.into_iter().flatten() {
            if let Err(e) = container.remove_listener(id).await {
                warn!(listener = %id, error = %e, "移除监听器失败");
            }
        }
    }
}
