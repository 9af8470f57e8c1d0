//! 框架配置解析
//!
//! 按以下顺序叠加得到容器环境：
//!
//! 1. 磁盘上的 framework.properties（存在且未强制覆盖时）
//! 2. 内置默认配置（磁盘文件不存在、读取失败或强制覆盖时使用，文件不存在或强制覆盖时写回磁盘）
//!
//! 磁盘文件格式无效（例如非法的 `\u` 转义）时解析失败，不回退。
//! 3. 应用配置中的必需配置项
//! 4. 环境变量中的日志级别

use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use crate::container::keys;
use crate::core::properties::{self, ConfigMap};
use crate::core::ContainerConfig;
use crate::utils::{LauncherError, Result};

/// 框架日志级别覆盖
pub const ENV_LOG_LEVEL: &str = "CHIPS_FRAMEWORK_LOG_LEVEL";

/// 为 `true` 时强制用内置默认配置覆盖磁盘文件
pub const ENV_OVERWRITE_CONF: &str = "CHIPS_OVERWRITE_FRAMEWORK_CONF";

static BUNDLED_PROPERTIES: &[u8] = include_bytes!("../../resources/framework.properties");

/// 默认配置来源
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DefaultProperties {
    /// 编译进二进制的默认配置
    #[default]
    Bundled,
    /// 指定文件
    File(PathBuf),
}

impl DefaultProperties {
    async fn read(&self) -> Result<Vec<u8>> {
        match self {
            DefaultProperties::Bundled => Ok(BUNDLED_PROPERTIES.to_vec()),
            DefaultProperties::File(path) => Ok(tokio::fs::read(path).await?),
        }
    }
}

/// 解析选项
#[derive(Debug, Clone, Default)]
pub struct ResolverOptions {
    /// 磁盘上的框架属性文件
    pub conf_path: PathBuf,
    /// 是否强制覆盖磁盘文件
    pub force_overwrite: bool,
    /// 默认配置来源
    pub defaults: DefaultProperties,
    /// 日志级别覆盖
    pub log_level_override: Option<String>,
}

impl ResolverOptions {
    /// 由容器配置与进程环境变量构造
    pub fn from_config(config: &ContainerConfig) -> Self {
        Self::from_env_lookup(config, |name| std::env::var(name).ok())
    }

    /// 由容器配置与给定的环境变量查询构造
    pub fn from_env_lookup<F>(config: &ContainerConfig, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_force = lookup(ENV_OVERWRITE_CONF)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Self {
            conf_path: config.framework_conf_path.clone(),
            force_overwrite: config.overwrite_framework_conf || env_force,
            defaults: DefaultProperties::Bundled,
            log_level_override: lookup(ENV_LOG_LEVEL),
        }
    }

    /// 设置默认配置来源
    pub fn with_defaults(mut self, defaults: DefaultProperties) -> Self {
        self.defaults = defaults;
        self
    }
}

/// 框架配置解析器
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    options: ResolverOptions,
}

impl ConfigResolver {
    pub fn new(options: ResolverOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// 解析容器环境
    ///
    /// # Errors
    ///
    /// - 必需配置项在应用配置中缺失或为空时返回 `ConfigResolution`
    /// - 磁盘文件格式无效时返回 `ConfigResolution`
    ///
    /// 文件读写失败只记录日志。
    #[instrument(skip_all, fields(conf = %self.options.conf_path.display()))]
    pub async fn resolve(&self, container: &ContainerConfig) -> Result<ConfigMap> {
        let mut map = ConfigMap::new();
        let conf_path = &self.options.conf_path;

        let use_file = !self.options.force_overwrite && path_exists(conf_path).await;
        let loaded_from_file = use_file && self.load_file(&mut map, conf_path).await?;

        if !loaded_from_file {
            // 磁盘文件读取失败时不覆盖
            self.load_defaults(&mut map, conf_path, !use_file).await;
        }

        for (key, value) in [
            (keys::MODULE_STORE_DIR, &container.module_store_dir),
            (keys::MEMORY_DUMP_LOCATION, &container.memory_dump_location),
        ] {
            if value.trim().is_empty() {
                return Err(LauncherError::ConfigResolution(format!(
                    "应用配置缺少 '{}'",
                    key
                )));
            }
            map.insert(key.to_string(), value.clone());
        }

        if let Some(level) = self
            .options
            .log_level_override
            .as_deref()
            .map(str::trim)
            .filter(|level| !level.is_empty())
        {
            map.insert(keys::LOG_LEVEL.to_string(), level.to_string());
        }

        debug!(entries = map.len(), config = ?map, "框架配置解析完成");
        Ok(map)
    }

    /// 读取磁盘文件，读取失败时返回 `false` 由调用方改用默认配置
    async fn load_file(&self, map: &mut ConfigMap, path: &Path) -> Result<bool> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "读取框架配置失败，改用默认配置"
                );
                return Ok(false);
            }
        };

        properties::load_into(map, &bytes).map_err(|e| {
            LauncherError::ConfigResolution(format!("框架配置文件 {} 无效: {}", path.display(), e))
        })?;
        info!(path = %path.display(), "使用磁盘上的框架配置");
        Ok(true)
    }

    async fn load_defaults(&self, map: &mut ConfigMap, conf_path: &Path, write_back: bool) {
        let bytes = match self.options.defaults.read().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    defaults = ?self.options.defaults,
                    error = %e,
                    "默认框架配置不可读"
                );
                return;
            }
        };

        if write_back {
            match write_file(conf_path, &bytes).await {
                Ok(()) => info!(path = %conf_path.display(), "已写入默认框架配置"),
                Err(e) => warn!(path = %conf_path.display(), error = %e, "写入框架配置失败"),
            }
        }

        if let Err(e) = properties::load_into(map, &bytes) {
            warn!(error = %e, "解析默认框架配置失败");
        }
    }
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}
