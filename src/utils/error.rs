//! 启动器错误类型定义
//!
//! 本模块定义了启动器中使用的所有错误类型。

use thiserror::Error;

/// 启动器核心错误类型
#[derive(Error, Debug)]
pub enum LauncherError {
    // ==================== 配置错误 ====================

    /// 框架配置解析失败（缺少必需项等）
    #[error("框架配置解析失败: {0}")]
    ConfigResolution(String),

    /// 应用配置加载失败
    #[error("配置加载失败: {0}")]
    ConfigLoadFailed(String),

    /// properties 文本格式错误
    #[error("properties 格式错误: 第 {line} 行 - {reason}")]
    InvalidProperties {
        line: usize,
        reason: String,
    },

    // ==================== 容器错误 ====================

    /// 没有可用的容器实现
    #[error("未找到可用的模块容器实现: {0}")]
    NoContainerProvider(String),

    /// 容器启动失败
    #[error("模块容器启动失败: {0}")]
    ContainerStart(String),

    /// 容器未运行
    #[error("模块容器未运行: {0}")]
    ContainerNotRunning(String),

    /// 容器停止失败
    #[error("模块容器停止失败: {0}")]
    Stop(String),

    /// 监听器移除失败
    #[error("监听器移除失败: {0}")]
    ListenerRemoval(String),

    // ==================== 模块错误 ====================

    /// 模块安装失败
    #[error("模块安装失败: '{location}' - {reason}")]
    ModuleInstall {
        location: String,
        reason: String,
    },

    /// 模块启动失败
    #[error("模块启动失败: '{module_id}' - {reason}")]
    ModuleStart {
        module_id: String,
        reason: String,
    },

    /// 模块未安装
    #[error("模块未安装: '{0}'")]
    ModuleNotFound(String),

    /// 模块安装结果不可接受
    #[error("模块安装结果不可接受: {failed}/{total} 个模块失败")]
    ModulesFailed {
        failed: usize,
        total: usize,
    },

    /// 无效的模块元数据
    #[error("无效的模块元数据: {0}")]
    InvalidMetadata(String),

    // ==================== 状态错误 ====================

    /// 当前状态不允许该操作
    #[error("当前状态 {state} 不允许执行 {operation}")]
    InvalidState {
        state: String,
        operation: &'static str,
    },

    /// 初始化失败
    #[error("初始化失败: {0}")]
    InitFailed(String),

    // ==================== IO 和序列化错误 ====================

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 序列化/反序列化错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML 序列化/反序列化错误
    #[error("YAML 错误: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// 版本解析错误
    #[error("版本解析错误: {0}")]
    VersionParse(#[from] semver::Error),
}

/// 启动器操作结果类型别名
pub type Result<T> = std::result::Result<T, LauncherError>;

/// 错误码常量
pub mod error_code {
    // 配置错误 (CONFIG-xxx)
    pub const CONFIG_RESOLUTION_FAILED: &str = "CONFIG-001";
    pub const CONFIG_LOAD_FAILED: &str = "CONFIG-002";
    pub const CONFIG_INVALID_PROPERTIES: &str = "CONFIG-003";

    // 容器错误 (CONTAINER-xxx)
    pub const CONTAINER_NO_PROVIDER: &str = "CONTAINER-001";
    pub const CONTAINER_START_FAILED: &str = "CONTAINER-002";
    pub const CONTAINER_NOT_RUNNING: &str = "CONTAINER-003";
    pub const CONTAINER_STOP_FAILED: &str = "CONTAINER-004";
    pub const CONTAINER_LISTENER_REMOVAL: &str = "CONTAINER-005";

    // 模块错误 (MODULE-xxx)
    pub const MODULE_INSTALL_FAILED: &str = "MODULE-001";
    pub const MODULE_START_FAILED: &str = "MODULE-002";
    pub const MODULE_NOT_FOUND: &str = "MODULE-003";
    pub const MODULE_AGGREGATE_FAILED: &str = "MODULE-004";
    pub const MODULE_INVALID_METADATA: &str = "MODULE-005";

    // 核心错误 (CORE-xxx)
    pub const CORE_INVALID_STATE: &str = "CORE-001";
    pub const CORE_INIT_FAILED: &str = "CORE-002";
    pub const CORE_IO: &str = "CORE-003";
}

impl LauncherError {
    /// 获取错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            LauncherError::ConfigResolution(_) => error_code::CONFIG_RESOLUTION_FAILED,
            LauncherError::ConfigLoadFailed(_)
            | LauncherError::Json(_)
            | LauncherError::Yaml(_) => error_code::CONFIG_LOAD_FAILED,
            LauncherError::InvalidProperties { .. } => error_code::CONFIG_INVALID_PROPERTIES,
            LauncherError::NoContainerProvider(_) => error_code::CONTAINER_NO_PROVIDER,
            LauncherError::ContainerStart(_) => error_code::CONTAINER_START_FAILED,
            LauncherError::ContainerNotRunning(_) => error_code::CONTAINER_NOT_RUNNING,
            LauncherError::Stop(_) => error_code::CONTAINER_STOP_FAILED,
            LauncherError::ListenerRemoval(_) => error_code::CONTAINER_LISTENER_REMOVAL,
            LauncherError::ModuleInstall { .. } => error_code::MODULE_INSTALL_FAILED,
            LauncherError::ModuleStart { .. } => error_code::MODULE_START_FAILED,
            LauncherError::ModuleNotFound(_) => error_code::MODULE_NOT_FOUND,
            LauncherError::ModulesFailed { .. } => error_code::MODULE_AGGREGATE_FAILED,
            LauncherError::InvalidMetadata(_) | LauncherError::VersionParse(_) => {
                error_code::MODULE_INVALID_METADATA
            }
            LauncherError::InvalidState { .. } => error_code::CORE_INVALID_STATE,
            LauncherError::InitFailed(_) => error_code::CORE_INIT_FAILED,
            LauncherError::Io(_) => error_code::CORE_IO,
        }
    }
}
