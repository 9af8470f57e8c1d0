//! 工具模块
//!
//! 包含错误类型与日志系统等通用工具。

pub mod error;
pub mod logger;

// 重导出常用类型
pub use error::{error_code, LauncherError, Result};
pub use logger::{
    LogGuard, LogLevelControl, LogReloadHandle, Logger, LoggerConfig, LoggerConfigBuilder,
    RotationStrategy,
};
