//! 容器工厂
//!
//! 维护容器实现的注册表，选择实现并以解析后的框架配置启动容器。

use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::container::{ContainerProvider, LocalProvider, ModuleContainer};
use crate::core::ConfigMap;
use crate::utils::{LauncherError, Result};

/// 容器实现注册表
///
/// 按注册顺序保存，未指定名称时使用第一个。
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ContainerProvider>>,
}

impl ProviderRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建包含内置实现的注册表
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(LocalProvider));
        registry
    }

    /// 注册容器实现
    pub fn register(&mut self, provider: Arc<dyn ContainerProvider>) {
        debug!(provider = provider.name(), "注册容器实现");
        self.providers.push(provider);
    }

    pub fn first(&self) -> Option<Arc<dyn ContainerProvider>> {
        self.providers.first().cloned()
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn ContainerProvider>> {
        self.providers.iter().find(|p| p.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// 容器工厂
#[derive(Clone)]
pub struct ContainerFactory {
    registry: ProviderRegistry,
    preferred: Option<String>,
}

impl ContainerFactory {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self {
            registry,
            preferred: None,
        }
    }

    /// 指定优先使用的实现名称
    pub fn with_preferred(mut self, name: Option<String>) -> Self {
        self.preferred = name;
        self
    }

    /// 选择容器实现
    pub fn select_provider(&self) -> Result<Arc<dyn ContainerProvider>> {
        match self.preferred.as_deref() {
            Some(name) => self.registry.find(name).ok_or_else(|| {
                LauncherError::NoContainerProvider(format!(
                    "'{}' 未注册，可用实现: {:?}",
                    name,
                    self.registry.names()
                ))
            }),
            None => self
                .registry
                .first()
                .ok_or_else(|| LauncherError::NoContainerProvider("注册表为空".to_string())),
        }
    }

    /// 创建并启动容器
    ///
    /// 只有启动成功时才返回句柄。启动失败统一转换为 `ContainerStart`。
    #[instrument(skip_all)]
    pub async fn create_and_start(&self, config: ConfigMap) -> Result<Arc<dyn ModuleContainer>> {
        let provider = self.select_provider()?;
        info!(provider = provider.name(), "创建模块容器");

        let container = provider.create(config).map_err(into_start_error)?;
        container.start().await.map_err(into_start_error)?;

        info!(
            provider = provider.name(),
            container = container.name(),
            version = container.version(),
            "模块容器已启动"
        );
        Ok(container)
    }
}

fn into_start_error(e: LauncherError) -> LauncherError {
    match e {
        LauncherError::ContainerStart(_) => e,
        other => LauncherError::ContainerStart(other.to_string()),
    }
}
