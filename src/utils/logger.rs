//! 日志系统模块
//!
//! 本模块基于 tracing 生态实现启动器的日志系统，包括：
//!
//! - 多级别日志支持（TRACE, DEBUG, INFO, WARN, ERROR）
//! - 结构化日志（JSON 格式输出）
//! - 文件日志输出（异步非阻塞，按时间轮转）
//! - 运行时调整日志过滤规则（容器发布的日志配置事件）
//!
//! # 示例
//!
//! ```rust,no_run
//! use chips_launcher::utils::logger::{Logger, LoggerConfig, LogLevelControl};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let guard = Logger::init(LoggerConfig::default())?;
//!
//!     // 运行时把容器模块调到 debug
//!     guard.reload_handle().apply("chips_launcher::container=debug")?;
//!
//!     tracing::info!(module_id = "editor", "模块已启动");
//!     Ok(())
//! }
//! ```

use crate::core::config::LogConfig;
use crate::utils::{LauncherError, Result};
use std::io;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

// ============================================================================
// 日志轮转策略
// ============================================================================

/// 日志轮转策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationStrategy {
    /// 不轮转（单个日志文件）
    Never,
    /// 每小时轮转
    Hourly,
    /// 每天轮转（默认）
    #[default]
    Daily,
}

impl RotationStrategy {
    fn to_rotation(self) -> Rotation {
        match self {
            RotationStrategy::Never => Rotation::NEVER,
            RotationStrategy::Hourly => Rotation::HOURLY,
            RotationStrategy::Daily => Rotation::DAILY,
        }
    }

    /// 从字符串解析轮转策略，无法识别时使用每天轮转
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "never" | "none" => RotationStrategy::Never,
            "hourly" | "hour" => RotationStrategy::Hourly,
            _ => RotationStrategy::Daily,
        }
    }
}

impl std::fmt::Display for RotationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RotationStrategy::Never => write!(f, "never"),
            RotationStrategy::Hourly => write!(f, "hourly"),
            RotationStrategy::Daily => write!(f, "daily"),
        }
    }
}

// ============================================================================
// 日志配置
// ============================================================================

/// 日志系统配置
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// 默认日志级别（例如 "trace", "debug", "info", "warn", "error"）
    pub level: String,

    /// 是否使用 JSON 格式输出
    pub json_format: bool,

    /// 是否输出到控制台
    pub console_output: bool,

    /// 文件输出目录（None 表示不输出到文件）
    pub file_output: Option<PathBuf>,

    /// 日志文件名前缀
    pub file_prefix: String,

    /// 日志轮转策略
    pub rotation: RotationStrategy,

    /// 是否显示目标模块
    pub show_target: bool,

    /// 是否显示线程 ID
    pub show_thread_ids: bool,

    /// 是否显示文件名和行号
    pub show_file_line: bool,

    /// 自定义过滤指令（EnvFilter 格式）
    /// 例如："chips_launcher=debug,chips_launcher::container=trace"
    pub filter_directives: Option<String>,

    /// 是否启用 ANSI 颜色（控制台输出）
    pub ansi_colors: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            console_output: true,
            file_output: None,
            file_prefix: "chips-launcher".to_string(),
            rotation: RotationStrategy::Daily,
            show_target: true,
            show_thread_ids: false,
            show_file_line: false,
            filter_directives: None,
            ansi_colors: true,
        }
    }
}

impl LoggerConfig {
    /// 创建配置构建器
    pub fn builder() -> LoggerConfigBuilder {
        LoggerConfigBuilder::new()
    }

    /// 从应用配置的 `logging` 段创建
    pub fn from_log_config(log_config: &LogConfig) -> Self {
        LoggerConfigBuilder::from_log_config(log_config).build()
    }
}

/// 日志配置构建器
#[derive(Debug, Default)]
pub struct LoggerConfigBuilder {
    config: LoggerConfig,
}

impl LoggerConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            config: LoggerConfig::default(),
        }
    }

    /// 以应用配置的 `logging` 段为起点
    ///
    /// `file_output` 关闭时忽略 `log_dir`。
    pub fn from_log_config(log_config: &LogConfig) -> Self {
        let mut builder = Self::new()
            .level(log_config.level.clone())
            .json_format(log_config.json_format)
            .rotation(RotationStrategy::parse(&log_config.rotation));
        if let (true, Some(dir)) = (log_config.file_output, &log_config.log_dir) {
            builder = builder.file_output(dir.clone());
        }
        if let Some(ref filter) = log_config.filter {
            builder = builder.filter_directives(filter.clone());
        }
        builder
    }

    /// 设置日志级别
    pub fn level(mut self, level: impl Into<String>) -> Self {
        self.config.level = level.into();
        self
    }

    /// 启用 JSON 格式输出
    pub fn json_format(mut self, enable: bool) -> Self {
        self.config.json_format = enable;
        self
    }

    /// 设置文件输出目录
    pub fn file_output(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.file_output = Some(dir.into());
        self
    }

    /// 设置轮转策略
    pub fn rotation(mut self, strategy: RotationStrategy) -> Self {
        self.config.rotation = strategy;
        self
    }

    /// 显示线程 ID 与文件行号（开发模式）
    pub fn verbose(mut self, enable: bool) -> Self {
        self.config.show_thread_ids = enable;
        self.config.show_file_line = enable;
        self
    }

    /// 设置过滤指令
    pub fn filter_directives(mut self, directives: impl Into<String>) -> Self {
        self.config.filter_directives = Some(directives.into());
        self
    }

    /// 构建配置
    pub fn build(self) -> LoggerConfig {
        self.config
    }
}

// ============================================================================
// 运行时日志控制
// ============================================================================

/// 运行时日志过滤控制
///
/// 配置主题监听器通过该接口把容器发布的日志配置应用到当前进程。
pub trait LogLevelControl: Send + Sync {
    /// 应用一组 EnvFilter 指令（如 `chips_launcher=debug` 或单独的级别 `warn`）
    fn apply(&self, directives: &str) -> Result<()>;
}

/// 基于 `tracing_subscriber::reload` 的日志控制句柄
#[derive(Clone)]
pub struct LogReloadHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    /// 初始化时使用的基础过滤规则
    base: String,
}

impl LogReloadHandle {
    /// 包装 reload 句柄
    pub fn new(handle: reload::Handle<EnvFilter, Registry>, base: impl Into<String>) -> Self {
        Self {
            handle,
            base: base.into(),
        }
    }

    /// 计算应用指令后的完整过滤规则
    ///
    /// 带 `=` 的指令叠加在基础规则之上，单独的级别替换基础规则。
    fn compose(&self, directives: &str) -> String {
        let directives = directives.trim();
        if directives.contains('=') && !self.base.is_empty() {
            format!("{},{}", self.base, directives)
        } else {
            directives.to_string()
        }
    }
}

impl LogLevelControl for LogReloadHandle {
    fn apply(&self, directives: &str) -> Result<()> {
        let composed = self.compose(directives);
        let filter = EnvFilter::try_new(&composed).map_err(|e| {
            LauncherError::ConfigLoadFailed(format!("无效的日志过滤规则 '{}': {}", composed, e))
        })?;
        self.handle
            .reload(filter)
            .map_err(|e| LauncherError::InitFailed(format!("日志过滤规则更新失败: {}", e)))?;
        tracing::info!(filter = %composed, "日志过滤规则已更新");
        Ok(())
    }
}

// ============================================================================
// 日志守卫
// ============================================================================

/// 日志系统守卫
///
/// 持有非阻塞写入器的 WorkerGuard，丢弃时等待挂起的日志写入完成。
pub struct LogGuard {
    _console_guard: Option<WorkerGuard>,
    _file_guard: Option<WorkerGuard>,
    reload: LogReloadHandle,
}

impl LogGuard {
    /// 获取运行时日志控制句柄
    pub fn reload_handle(&self) -> LogReloadHandle {
        self.reload.clone()
    }
}

// ============================================================================
// 日志系统
// ============================================================================

/// 全局日志初始化状态
static LOGGER_INITIALIZED: OnceLock<bool> = OnceLock::new();

/// 日志系统
pub struct Logger;

impl Logger {
    /// 初始化日志系统
    ///
    /// 根据配置初始化 tracing-subscriber，支持控制台和文件输出。
    /// 返回的 `LogGuard` 必须保持活动状态直到程序退出。
    ///
    /// # Errors
    ///
    /// 日志系统已初始化或过滤规则无效时返回错误
    pub fn init(config: LoggerConfig) -> Result<LogGuard> {
        if LOGGER_INITIALIZED.get().is_some() {
            return Err(LauncherError::InitFailed(
                "日志系统已初始化，不能重复初始化".to_string(),
            ));
        }

        let (env_filter, base) = Self::create_env_filter(&config)?;
        let (filter_layer, reload_handle) = reload::Layer::new(env_filter);

        let mut console_guard = None;
        let mut file_guard = None;

        let console_writer = if config.console_output {
            let (non_blocking, guard) = tracing_appender::non_blocking(io::stdout());
            console_guard = Some(guard);
            Some(non_blocking)
        } else {
            None
        };

        let file_writer = if let Some(ref log_dir) = config.file_output {
            let file_appender = RollingFileAppender::new(
                config.rotation.to_rotation(),
                log_dir,
                format!("{}.log", config.file_prefix),
            );
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            file_guard = Some(guard);
            Some(non_blocking)
        } else {
            None
        };

        let registry = tracing_subscriber::registry().with(filter_layer);

        let result = if config.json_format {
            let console_layer = console_writer.map(|writer| {
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_target(config.show_target)
                    .with_thread_ids(config.show_thread_ids)
                    .with_file(config.show_file_line)
                    .with_line_number(config.show_file_line)
                    .with_ansi(false)
            });
            let file_layer = file_writer.map(|writer| {
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_target(config.show_target)
                    .with_ansi(false)
            });
            registry.with(console_layer).with(file_layer).try_init()
        } else {
            let console_layer = console_writer.map(|writer| {
                fmt::layer()
                    .with_writer(writer)
                    .with_target(config.show_target)
                    .with_thread_ids(config.show_thread_ids)
                    .with_file(config.show_file_line)
                    .with_line_number(config.show_file_line)
                    .with_ansi(config.ansi_colors)
            });
            // 文件不使用 ANSI
            let file_layer = file_writer.map(|writer| {
                fmt::layer()
                    .with_writer(writer)
                    .with_target(config.show_target)
                    .with_ansi(false)
            });
            registry.with(console_layer).with(file_layer).try_init()
        };

        result.map_err(|e| LauncherError::InitFailed(format!("日志系统初始化失败: {}", e)))?;
        let _ = LOGGER_INITIALIZED.set(true);

        Ok(LogGuard {
            _console_guard: console_guard,
            _file_guard: file_guard,
            reload: LogReloadHandle::new(reload_handle, base),
        })
    }

    /// 创建 EnvFilter，返回过滤器与其文本规则
    ///
    /// 环境变量 RUST_LOG 优先于配置中的级别。
    fn create_env_filter(config: &LoggerConfig) -> Result<(EnvFilter, String)> {
        let mut base = std::env::var(EnvFilter::DEFAULT_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| config.level.clone());

        if let Some(ref directives) = config.filter_directives {
            for directive in directives.split(',').map(str::trim).filter(|d| !d.is_empty()) {
                base.push(',');
                base.push_str(directive);
            }
        }

        let filter = EnvFilter::try_new(&base).map_err(|e| {
            LauncherError::InitFailed(format!("无效的日志过滤规则 '{}': {}", base, e))
        })?;
        Ok((filter, base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reload_pair(base: &str) -> (reload::Layer<EnvFilter, Registry>, LogReloadHandle) {
        let (layer, handle) = reload::Layer::new(EnvFilter::new(base));
        (layer, LogReloadHandle::new(handle, base))
    }

    #[test]
    fn test_rotation_strategy_parse() {
        assert_eq!(RotationStrategy::parse("DAILY"), RotationStrategy::Daily);
        assert_eq!(RotationStrategy::parse("hour"), RotationStrategy::Hourly);
        assert_eq!(RotationStrategy::parse("none"), RotationStrategy::Never);
        assert_eq!(RotationStrategy::parse("weekly"), RotationStrategy::Daily);
        assert_eq!(RotationStrategy::Hourly.to_string(), "hourly");
    }

    #[test]
    fn test_logger_config_from_log_config() {
        let mut log_config = LogConfig {
            level: "debug".to_string(),
            file_output: false,
            log_dir: Some(PathBuf::from("/var/log/chips")),
            json_format: true,
            rotation: "hourly".to_string(),
            filter: Some("chips_launcher::container=trace".to_string()),
        };

        let logger_config = LoggerConfig::from_log_config(&log_config);
        assert_eq!(logger_config.level, "debug");
        assert!(logger_config.json_format);
        // file_output=false 时即使有目录也不输出
        assert!(logger_config.file_output.is_none());
        assert_eq!(logger_config.rotation, RotationStrategy::Hourly);
        assert_eq!(
            logger_config.filter_directives.as_deref(),
            Some("chips_launcher::container=trace")
        );

        log_config.file_output = true;
        let logger_config = LoggerConfig::from_log_config(&log_config);
        assert_eq!(logger_config.file_output, Some(PathBuf::from("/var/log/chips")));
    }

    #[test]
    fn test_builder_overrides_for_cli() {
        let config = LoggerConfigBuilder::from_log_config(&LogConfig::default())
            .level("trace")
            .verbose(true)
            .build();

        assert_eq!(config.level, "trace");
        assert!(config.show_thread_ids);
        assert!(config.show_file_line);
        assert!(config.console_output);
    }

    #[test]
    fn test_create_env_filter_with_directives() {
        let config = LoggerConfig::builder()
            .level("info")
            .filter_directives("chips_launcher=debug, chips_launcher::container=trace")
            .build();

        let (_, base) = Logger::create_env_filter(&config).unwrap();
        if std::env::var(EnvFilter::DEFAULT_ENV).is_err() {
            assert_eq!(
                base,
                "info,chips_launcher=debug,chips_launcher::container=trace"
            );
        }
    }

    #[test]
    fn test_reload_handle_compose() {
        let (_layer, handle) = reload_pair("info");
        assert_eq!(
            handle.compose("chips_launcher=debug"),
            "info,chips_launcher=debug"
        );
        assert_eq!(handle.compose(" warn "), "warn");
    }

    #[test]
    fn test_reload_handle_apply() {
        let (_layer, handle) = reload_pair("info");
        assert!(handle.apply("chips_launcher=debug").is_ok());
        assert!(handle.apply("chips_launcher=loud").is_err());
    }
}
