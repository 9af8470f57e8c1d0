//! 生命周期管理器
//!
//! 串联配置解析、容器启动、监听器挂接和模块安装，并负责对称的停止流程。
//!
//! # 状态机
//!
//! ```text
//! Stopped ──start──▶ Starting ──成功──▶ Running ──stop──▶ Stopping ──▶ Stopped
//!                       │
//!                       └──任一步骤失败──▶ 完整停止流程 ──▶ Stopped
//! ```

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};

use super::factory::{ContainerFactory, ProviderRegistry};
use super::installer::{InstallReport, ModuleInstaller};
use super::listeners::{EventWiring, ListenerSet};
use super::resolver::{ConfigResolver, ResolverOptions};
use crate::container::{ContainerEventKind, ModuleContainer};
use crate::core::LauncherConfig;
use crate::utils::{LauncherError, LogLevelControl, Result};

/// 运行时状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeState {
    /// 已停止
    #[default]
    Stopped,
    /// 启动中
    Starting,
    /// 运行中
    Running,
    /// 停止中
    Stopping,
}

impl RuntimeState {
    pub fn is_running(&self) -> bool {
        matches!(self, RuntimeState::Running)
    }
}

impl fmt::Display for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuntimeState::Stopped => "stopped",
            RuntimeState::Starting => "starting",
            RuntimeState::Running => "running",
            RuntimeState::Stopping => "stopping",
        };
        f.write_str(name)
    }
}

/// 启动耗时
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupTimings {
    /// 容器创建与启动
    pub container: Duration,
    /// 整个启动流程
    pub total: Duration,
}

/// 模块运行时生命周期管理器
///
/// 由入口程序显式构造并持有。`start`/`stop` 需要 `&mut self`，同一时刻只有一个调用方。
pub struct LifecycleManager {
    config: LauncherConfig,
    resolver: ConfigResolver,
    factory: ContainerFactory,
    wiring: EventWiring,
    installer: ModuleInstaller,
    state: RuntimeState,
    /// 启动成功后、停止前存在
    container: Option<Arc<dyn ModuleContainer>>,
    listeners: ListenerSet,
    timings: Option<StartupTimings>,
    last_report: Option<InstallReport>,
    stop_timeout: Option<Duration>,
}

impl LifecycleManager {
    /// 使用内置容器实现创建管理器
    pub fn new(config: LauncherConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn builder(config: LauncherConfig) -> LifecycleManagerBuilder {
        LifecycleManagerBuilder::new(config)
    }

    /// 启动模块运行时
    ///
    /// 任一步骤失败时记录一条错误日志，执行一次完整的停止流程，然后返回该错误。
    ///
    /// # Errors
    ///
    /// - 当前不是 `Stopped` 状态时返回 `InvalidState`
    /// - 配置解析、容器启动、监听器注册或模块安装失败时返回对应错误
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<()> {
        if self.state != RuntimeState::Stopped {
            return Err(LauncherError::InvalidState {
                state: self.state.to_string(),
                operation: "start",
            });
        }

        info!("启动模块运行时...");
        self.state = RuntimeState::Starting;
        self.timings = None;
        self.last_report = None;

        match self.try_start().await {
            Ok(timings) => {
                self.timings = Some(timings);
                self.state = RuntimeState::Running;
                info!(
                    container_ms = timings.container.as_millis() as u64,
                    elapsed_ms = timings.total.as_millis() as u64,
                    "模块运行时已启动"
                );
                Ok(())
            }
            Err(e) => {
                error!(error_code = e.error_code(), error = %e, "模块容器启动失败");
                self.stop().await;
                Err(e)
            }
        }
    }

    async fn try_start(&mut self) -> Result<StartupTimings> {
        let started_at = Instant::now();

        let config_map = self.resolver.resolve(&self.config.container).await?;

        let container_started = Instant::now();
        let container = self.factory.create_and_start(config_map).await?;
        let container_elapsed = container_started.elapsed();
        info!(
            elapsed_ms = container_elapsed.as_millis() as u64,
            "模块容器启动完成"
        );
        self.container = Some(Arc::clone(&container));

        self.wiring
            .attach(container.as_ref(), &mut self.listeners)
            .await?;

        let report = self
            .installer
            .install_all(container.as_ref(), &self.config.modules.install)
            .await;
        let outcome = self.installer.evaluate(&report);
        self.last_report = Some(report);
        outcome?;

        Ok(StartupTimings {
            container: container_elapsed,
            total: started_at.elapsed(),
        })
    }

    /// 停止模块运行时
    ///
    /// 依次移除监听器、停止容器并等待容器报告停止。错误只记录日志，结束后总是 `Stopped`。
    #[instrument(skip(self))]
    pub async fn stop(&mut self) {
        let Some(container) = self.container.take() else {
            self.wiring.detach(None, &mut self.listeners).await;
            self.state = RuntimeState::Stopped;
            info!("模块容器未运行，无需停止");
            return;
        };

        info!("正在停止模块运行时...");
        self.state = RuntimeState::Stopping;

        self.wiring
            .detach(Some(container.as_ref()), &mut self.listeners)
            .await;

        match container.stop().await {
            Ok(()) => match container.wait_for_stop(self.stop_timeout).await {
                Ok(event) if event.kind == ContainerEventKind::WaitTimedOut => {
                    warn!(
                        event = %event.kind,
                        detail = event.message.as_deref().unwrap_or_default(),
                        "等待模块容器停止超时"
                    );
                }
                Ok(event) => info!(event = %event.kind, "模块容器已停止"),
                Err(e) => warn!(error_code = e.error_code(), error = %e, "等待模块容器停止失败"),
            },
            Err(e) => warn!(error_code = e.error_code(), error = %e, "停止模块容器失败"),
        }

        self.state = RuntimeState::Stopped;
        info!("模块运行时已停止");
    }

    /// 等待关闭信号后停止模块运行时
    ///
    /// 信号返回错误时同样执行停止流程，随后把该错误交还调用方。
    pub async fn run_until<F, E>(&mut self, shutdown: F) -> std::result::Result<(), E>
    where
        F: Future<Output = std::result::Result<(), E>>,
        E: fmt::Display,
    {
        let signal = shutdown.await;
        match signal {
            Ok(()) => info!("收到关闭信号，正在停止..."),
            Err(ref e) => error!(error = %e, "监听关闭信号失败，正在停止..."),
        }
        self.stop().await;
        signal
    }

    pub fn state(&self) -> RuntimeState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// 运行中的容器句柄
    pub fn container(&self) -> Option<Arc<dyn ModuleContainer>> {
        self.container.clone()
    }

    pub fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }

    /// 最近一次成功启动的耗时
    pub fn timings(&self) -> Option<StartupTimings> {
        self.timings
    }

    /// 最近一次启动的模块安装结果
    pub fn install_report(&self) -> Option<&InstallReport> {
        self.last_report.as_ref()
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }
}

impl Drop for LifecycleManager {
    fn drop(&mut self) {
        if self.container.is_some() {
            warn!("生命周期管理器被释放时模块容器仍在运行");
        }
    }
}

/// 生命周期管理器构建器
pub struct LifecycleManagerBuilder {
    config: LauncherConfig,
    registry: ProviderRegistry,
    resolver_options: Option<ResolverOptions>,
    log_control: Option<Arc<dyn LogLevelControl>>,
}

impl LifecycleManagerBuilder {
    pub fn new(config: LauncherConfig) -> Self {
        Self {
            config,
            registry: ProviderRegistry::with_defaults(),
            resolver_options: None,
            log_control: None,
        }
    }

    /// 替换容器实现注册表
    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// 指定配置解析选项（默认由容器配置与环境变量构造）
    pub fn resolver_options(mut self, options: ResolverOptions) -> Self {
        self.resolver_options = Some(options);
        self
    }

    /// 设置运行时日志控制句柄
    pub fn log_control(mut self, control: Arc<dyn LogLevelControl>) -> Self {
        self.log_control = Some(control);
        self
    }

    pub fn build(self) -> LifecycleManager {
        let options = self
            .resolver_options
            .unwrap_or_else(|| ResolverOptions::from_config(&self.config.container));
        let factory =
            ContainerFactory::new(self.registry).with_preferred(self.config.container.provider.clone());

        LifecycleManager {
            resolver: ConfigResolver::new(options),
            factory,
            wiring: EventWiring::new(self.log_control),
            installer: ModuleInstaller::new(&self.config.modules),
            state: RuntimeState::Stopped,
            container: None,
            listeners: ListenerSet::default(),
            timings: None,
            last_report: None,
            stop_timeout: self.config.container.stop_timeout(),
            config: self.config,
        }
    }
}
