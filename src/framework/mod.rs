//! 启动框架
//!
//! 模块运行时的启动与停止流程：
//!
//! ```text
//! ConfigResolver ─▶ ConfigMap ─▶ ContainerFactory ─▶ 容器句柄
//!        ─▶ EventWiring ─▶ ModuleInstaller ─▶ LifecycleManager 持有句柄直到停止
//! ```

pub mod factory;
pub mod installer;
pub mod listeners;
pub mod manager;
pub mod resolver;

#[cfg(test)]
pub(crate) mod testing;

pub use factory::{ContainerFactory, ProviderRegistry};
pub use installer::{InstallFailure, InstallReport, ModuleInstaller};
pub use listeners::{
    logging_directives, ConfigTopicListener, EventWiring, LifecycleListener, ListenerSet,
};
pub use manager::{LifecycleManager, LifecycleManagerBuilder, RuntimeState, StartupTimings};
pub use resolver::{
    ConfigResolver, DefaultProperties, ResolverOptions, ENV_LOG_LEVEL, ENV_OVERWRITE_CONF,
};
