//! # Chips Launcher - 薯片模块容器启动器
//!
//! 负责模块运行时的启动与停止：
//!
//! - **框架配置解析**: 合并磁盘配置、内置默认配置、应用配置和环境变量
//! - **容器工厂**: 从注册表选择容器实现并启动
//! - **事件挂接**: 在安装模块前注册生命周期监听器和日志配置监听器
//! - **模块安装**: 按配置顺序安装并启动模块，失败收集后继续
//! - **生命周期管理**: 启动失败时执行完整的停止流程
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use chips_launcher::{LauncherConfig, LifecycleManager};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LauncherConfig::builder()
//!         .install("modules/editor", true)
//!         .build();
//!
//!     let mut manager = LifecycleManager::new(config);
//!     manager.start().await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     manager.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## 模块结构
//!
//! - `framework` - 启动流程与生命周期管理
//! - `container` - 模块容器接口与内置实现
//! - `core` - 启动器配置与 properties 文件格式
//! - `module` - 模块元数据
//! - `utils` - 错误类型与日志系统

#![warn(rustdoc::missing_crate_level_docs)]

pub mod container;
pub mod core;
pub mod framework;
pub mod module;
pub mod utils;

// 重导出常用类型，方便使用
pub use container::{
    ContainerEvent, ContainerEventKind, ContainerListener, ContainerProvider, ContainerState,
    InstalledModule, ListenerId, LocalContainer, LocalProvider, ModuleContainer, TopicFilter,
};

pub use framework::{
    ConfigResolver, ContainerFactory, EventWiring, InstallReport, LifecycleManager,
    ModuleInstaller, ProviderRegistry, ResolverOptions, RuntimeState, StartupTimings,
};

pub use module::{Dependency, ModuleMetadata, ModuleState};

pub use utils::logger::{
    LogGuard, LogLevelControl, LogReloadHandle, Logger, LoggerConfig, LoggerConfigBuilder,
    RotationStrategy,
};
pub use utils::{error_code, LauncherError, Result};

pub use core::{ConfigMap, LauncherConfig, LauncherConfigBuilder, ModuleDescriptor};

/// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
