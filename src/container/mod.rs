//! 模块容器
//!
//! 定义启动器与模块容器之间的接口：
//!
//! - [`ModuleContainer`]：运行中的容器（启动、停止、监听器、模块安装）
//! - [`ContainerProvider`]：容器实现的工厂，注册在 `ProviderRegistry` 中
//! - [`ContainerListener`]：容器事件的同步回调
//!
//! 内置实现见 [`local`]。

pub mod event;
pub mod local;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::core::ConfigMap;
use crate::utils::Result;

pub use event::{logger_keys, ContainerEvent, ContainerEventKind, TopicFilter};
pub use local::{LocalContainer, LocalProvider};

/// 框架配置键
pub mod keys {
    /// 模块存储目录
    pub const MODULE_STORE_DIR: &str = "chips.module.store.dir";
    /// 内存转储目录
    pub const MEMORY_DUMP_LOCATION: &str = "chips.memoryusage.dump.location";
    /// 框架日志级别
    pub const LOG_LEVEL: &str = "chips.log.level";

    /// 容器启动前必须存在且非空的配置项
    pub const REQUIRED_KEYS: [&str; 2] = [MODULE_STORE_DIR, MEMORY_DUMP_LOCATION];
}

/// 监听器注册标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// 容器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
    /// 已创建，未启动
    Installed,
    /// 启动中
    Starting,
    /// 运行中
    Active,
    /// 停止中
    Stopping,
    /// 已停止
    Stopped,
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContainerState::Installed => "installed",
            ContainerState::Starting => "starting",
            ContainerState::Active => "active",
            ContainerState::Stopping => "stopping",
            ContainerState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// 已安装模块的信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledModule {
    pub module_id: String,
    pub name: String,
    pub version: String,
    pub location: String,
}

/// 容器事件监听器
///
/// 回调在容器的事件分发任务中执行，必须快速返回且不得阻塞。
pub trait ContainerListener: Send + Sync {
    fn on_event(&self, event: &ContainerEvent);
}

/// 模块容器接口
#[async_trait]
pub trait ModuleContainer: Send + Sync {
    /// 容器名称
    fn name(&self) -> &str;

    /// 容器版本
    fn version(&self) -> &str;

    /// 当前状态
    async fn state(&self) -> ContainerState;

    /// 启动容器
    async fn start(&self) -> Result<()>;

    /// 发起停止，不等待停止完成
    async fn stop(&self) -> Result<()>;

    /// 等待容器停止
    ///
    /// 返回 `Stopped` 事件；超时返回 `WaitTimedOut` 事件。`None` 表示一直等待。
    async fn wait_for_stop(&self, timeout: Option<Duration>) -> Result<ContainerEvent>;

    /// 注册监听器
    async fn add_listener(
        &self,
        listener: Arc<dyn ContainerListener>,
        filter: TopicFilter,
    ) -> Result<ListenerId>;

    /// 移除监听器
    async fn remove_listener(&self, id: ListenerId) -> Result<()>;

    /// 从制品位置安装模块
    async fn install(&self, location: &str) -> Result<InstalledModule>;

    /// 启动已安装的模块
    async fn start_module(&self, module_id: &str) -> Result<()>;

    /// 发布事件给匹配的监听器
    async fn post_event(&self, event: ContainerEvent) -> Result<()>;
}

/// 容器实现提供者
pub trait ContainerProvider: Send + Sync {
    /// 提供者名称
    fn name(&self) -> &str;

    /// 以框架配置为环境创建容器（未启动）
    fn create(&self, config: ConfigMap) -> Result<Arc<dyn ModuleContainer>>;
}
