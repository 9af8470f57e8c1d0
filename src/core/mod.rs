//! 核心模块
//!
//! 包含启动器配置与框架属性文件格式。

pub mod config;
pub mod properties;

pub use config::{
    ContainerConfig, LauncherConfig, LauncherConfigBuilder, LogConfig, ModuleDescriptor,
    ModulesConfig,
};
pub use properties::ConfigMap;
