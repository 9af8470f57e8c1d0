//! 启动器配置
//!
//! 定义应用配置文件（YAML/JSON）的结构和加载逻辑。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 模块容器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// 模块存储目录（对应 `chips.module.store.dir`）
    #[serde(default = "default_module_store_dir")]
    pub module_store_dir: String,

    /// 内存转储目录（对应 `chips.memoryusage.dump.location`）
    #[serde(default = "default_memory_dump_location")]
    pub memory_dump_location: String,

    /// 磁盘上的框架属性文件路径
    #[serde(default = "default_framework_conf_path")]
    pub framework_conf_path: PathBuf,

    /// 是否强制用内置默认配置覆盖磁盘文件
    #[serde(default)]
    pub overwrite_framework_conf: bool,

    /// 等待容器停止的超时时间（秒），不设置则一直等待
    #[serde(default)]
    pub stop_timeout_secs: Option<u64>,

    /// 指定使用的容器实现名称，不设置则使用第一个注册的实现
    #[serde(default)]
    pub provider: Option<String>,
}

fn default_module_store_dir() -> String {
    "chips/module-store".to_string()
}

fn default_memory_dump_location() -> String {
    "chips/dumps".to_string()
}

fn default_framework_conf_path() -> PathBuf {
    PathBuf::from("chips/conf/framework.properties")
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            module_store_dir: default_module_store_dir(),
            memory_dump_location: default_memory_dump_location(),
            framework_conf_path: default_framework_conf_path(),
            overwrite_framework_conf: false,
            stop_timeout_secs: None,
            provider: None,
        }
    }
}

impl ContainerConfig {
    /// 停止等待超时
    pub fn stop_timeout(&self) -> Option<Duration> {
        self.stop_timeout_secs.map(Duration::from_secs)
    }
}

/// 待安装的模块
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// 模块制品位置（模块目录或 module.yaml 路径）
    pub location: String,

    /// 安装后是否立即启动
    #[serde(default = "default_true")]
    pub start: bool,
}

impl ModuleDescriptor {
    pub fn new(location: impl Into<String>, start: bool) -> Self {
        Self {
            location: location.into(),
            start,
        }
    }
}

fn default_true() -> bool {
    true
}

/// 模块安装配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// 按顺序安装的模块列表
    #[serde(default)]
    pub install: Vec<ModuleDescriptor>,

    /// 任一模块失败即视为启动失败
    #[serde(default)]
    pub fail_on_error: bool,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出到文件
    #[serde(default)]
    pub file_output: bool,

    /// 日志文件目录
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json_format: bool,

    /// 日志轮转策略
    #[serde(default = "default_rotation")]
    pub rotation: String,

    /// 附加的过滤指令（EnvFilter 格式，例如 "chips_launcher::container=debug"）
    #[serde(default)]
    pub filter: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_output: false,
            log_dir: None,
            json_format: false,
            rotation: default_rotation(),
            filter: None,
        }
    }
}

/// 启动器配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// 配置文件路径
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// 模块容器配置
    #[serde(default)]
    pub container: ContainerConfig,

    /// 模块安装配置
    #[serde(default)]
    pub modules: ModulesConfig,

    /// 日志配置
    #[serde(default)]
    pub logging: LogConfig,

    /// 是否为开发模式
    #[serde(default)]
    pub dev_mode: bool,
}

impl LauncherConfig {
    /// 创建配置构建器
    pub fn builder() -> LauncherConfigBuilder {
        LauncherConfigBuilder::new()
    }

    /// 从文件加载配置
    ///
    /// 扩展名为 `.json` 时按 JSON 解析，否则按 YAML 解析。
    pub async fn from_file(path: impl Into<PathBuf>) -> crate::utils::Result<Self> {
        let path = path.into();
        let content = tokio::fs::read_to_string(&path).await?;

        let mut config: LauncherConfig = if path.extension().map(|e| e == "json").unwrap_or(false)
        {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        config.config_path = Some(path);
        Ok(config)
    }

    /// 合并另一个配置（用于覆盖）
    pub fn merge(&mut self, other: LauncherConfig) {
        // 只覆盖非默认值的配置
        if other.container.module_store_dir != default_module_store_dir() {
            self.container.module_store_dir = other.container.module_store_dir;
        }
        if other.container.memory_dump_location != default_memory_dump_location() {
            self.container.memory_dump_location = other.container.memory_dump_location;
        }
        if other.container.framework_conf_path != default_framework_conf_path() {
            self.container.framework_conf_path = other.container.framework_conf_path;
        }
        if other.container.overwrite_framework_conf {
            self.container.overwrite_framework_conf = true;
        }
        if other.container.stop_timeout_secs.is_some() {
            self.container.stop_timeout_secs = other.container.stop_timeout_secs;
        }
        if other.container.provider.is_some() {
            self.container.provider = other.container.provider;
        }
        if !other.modules.install.is_empty() {
            self.modules.install.extend(other.modules.install);
        }
        if other.modules.fail_on_error {
            self.modules.fail_on_error = true;
        }
        if other.logging.level != default_log_level() {
            self.logging.level = other.logging.level;
        }
        if other.logging.file_output {
            self.logging.file_output = true;
            self.logging.log_dir = other.logging.log_dir;
        }
        if other.logging.filter.is_some() {
            self.logging.filter = other.logging.filter;
        }
        if other.dev_mode {
            self.dev_mode = true;
        }
    }
}

/// 配置构建器
#[derive(Debug, Default)]
pub struct LauncherConfigBuilder {
    config: LauncherConfig,
}

impl LauncherConfigBuilder {
    /// 创建新的构建器
    pub fn new() -> Self {
        Self {
            config: LauncherConfig::default(),
        }
    }

    /// 设置模块存储目录
    pub fn module_store_dir(mut self, dir: impl Into<String>) -> Self {
        self.config.container.module_store_dir = dir.into();
        self
    }

    /// 设置内存转储目录
    pub fn memory_dump_location(mut self, dir: impl Into<String>) -> Self {
        self.config.container.memory_dump_location = dir.into();
        self
    }

    /// 设置框架属性文件路径
    pub fn framework_conf_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.container.framework_conf_path = path.into();
        self
    }

    /// 强制覆盖框架属性文件
    pub fn overwrite_framework_conf(mut self, enable: bool) -> Self {
        self.config.container.overwrite_framework_conf = enable;
        self
    }

    /// 设置停止等待超时
    pub fn stop_timeout_secs(mut self, secs: u64) -> Self {
        self.config.container.stop_timeout_secs = Some(secs);
        self
    }

    /// 指定容器实现
    pub fn provider(mut self, name: impl Into<String>) -> Self {
        self.config.container.provider = Some(name.into());
        self
    }

    /// 添加待安装模块
    pub fn install(mut self, location: impl Into<String>, start: bool) -> Self {
        self.config
            .modules
            .install
            .push(ModuleDescriptor::new(location, start));
        self
    }

    /// 任一模块失败即中止启动
    pub fn fail_on_error(mut self, enable: bool) -> Self {
        self.config.modules.fail_on_error = enable;
        self
    }

    /// 设置日志级别
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// 启用开发模式
    pub fn dev_mode(mut self) -> Self {
        self.config.dev_mode = true;
        self
    }

    /// 构建配置
    pub fn build(self) -> LauncherConfig {
        self.config
    }
}
