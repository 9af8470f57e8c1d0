//! 本地模块容器
//!
//! 进程内的模块容器实现：
//!
//! - 启动时校验必需配置项并创建模块存储目录
//! - 独立的事件分发任务，监听器回调互相隔离（panic 不影响其他监听器）
//! - 从 module.yaml 安装模块，启动前检查必需依赖
//! - 停止时按安装顺序的逆序停止运行中的模块，通过 watch 通道报告停止完成

use async_trait::async_trait;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{
    keys, ContainerEvent, ContainerEventKind, ContainerListener, ContainerProvider,
    ContainerState, InstalledModule, ListenerId, ModuleContainer, TopicFilter,
};
use crate::core::ConfigMap;
use crate::module::{ModuleMetadata, ModuleParser, ModuleState};
use crate::utils::{LauncherError, Result};

/// 内置容器实现名称
pub const LOCAL_PROVIDER_NAME: &str = "local";

struct ListenerEntry {
    id: ListenerId,
    filter: TopicFilter,
    listener: Arc<dyn ContainerListener>,
}

type ListenerTable = Arc<RwLock<Vec<ListenerEntry>>>;

struct ModuleEntry {
    metadata: ModuleMetadata,
    location: String,
    state: ModuleState,
}

impl ModuleEntry {
    fn describe(&self) -> InstalledModule {
        InstalledModule {
            module_id: self.metadata.id.clone(),
            name: self.metadata.name.clone(),
            version: self.metadata.version.clone(),
            location: self.location.clone(),
        }
    }
}

struct Inner {
    config: ConfigMap,
    state_tx: watch::Sender<ContainerState>,
    listeners: ListenerTable,
    next_listener_id: AtomicU64,
    /// 按安装顺序排列
    modules: RwLock<Vec<ModuleEntry>>,
    events: Mutex<Option<mpsc::UnboundedSender<ContainerEvent>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn state(&self) -> ContainerState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: ContainerState) {
        self.state_tx.send_replace(state);
    }

    async fn emit(&self, event: ContainerEvent) {
        if let Some(sender) = self.events.lock().await.as_ref() {
            // 分发任务已退出时丢弃
            let _ = sender.send(event);
        }
    }

    async fn teardown(self: Arc<Self>) {
        let stopped: Vec<String> = {
            let mut modules = self.modules.write().await;
            modules
                .iter_mut()
                .rev()
                .filter(|m| m.state.is_active())
                .map(|m| {
                    m.state = ModuleState::Resolved;
                    m.metadata.id.clone()
                })
                .collect()
        };

        for module_id in stopped {
            info!(module_id = %module_id, "模块已停止");
            self.emit(
                ContainerEvent::new(ContainerEventKind::ModuleStopped, module_id.clone())
                    .with_metadata("module_id", module_id),
            )
            .await;
        }

        self.emit(ContainerEvent::new(
            ContainerEventKind::Stopped,
            LOCAL_PROVIDER_NAME,
        ))
        .await;

        // 关闭发送端，等待分发任务处理完剩余事件
        drop(self.events.lock().await.take());
        if let Some(handle) = self.dispatcher.lock().await.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "事件分发任务异常退出");
            }
        }

        self.set_state(ContainerState::Stopped);
        info!("本地模块容器已停止");
    }
}

async fn dispatch_loop(listeners: ListenerTable, mut rx: mpsc::UnboundedReceiver<ContainerEvent>) {
    while let Some(event) = rx.recv().await {
        let targets: Vec<(ListenerId, Arc<dyn ContainerListener>)> = listeners
            .read()
            .await
            .iter()
            .filter(|entry| entry.filter.matches(&event))
            .map(|entry| (entry.id, Arc::clone(&entry.listener)))
            .collect();

        for (id, listener) in targets {
            let outcome =
                std::panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(&event)));
            if outcome.is_err() {
                warn!(listener = %id, event = %event.kind, "监听器处理事件时发生 panic");
            }
        }
    }
    debug!("事件分发任务退出");
}

/// 本地模块容器
#[derive(Clone)]
pub struct LocalContainer {
    inner: Arc<Inner>,
}

impl LocalContainer {
    /// 以框架配置创建容器
    pub fn new(config: ConfigMap) -> Self {
        let (state_tx, _) = watch::channel(ContainerState::Installed);
        Self {
            inner: Arc::new(Inner {
                config,
                state_tx,
                listeners: Arc::new(RwLock::new(Vec::new())),
                next_listener_id: AtomicU64::new(0),
                modules: RwLock::new(Vec::new()),
                events: Mutex::new(None),
                dispatcher: Mutex::new(None),
            }),
        }
    }

    /// 容器环境
    pub fn config(&self) -> &ConfigMap {
        &self.inner.config
    }

    /// 已安装的模块（按安装顺序）
    pub async fn installed_modules(&self) -> Vec<InstalledModule> {
        self.inner
            .modules
            .read()
            .await
            .iter()
            .map(ModuleEntry::describe)
            .collect()
    }

    /// 模块状态
    pub async fn module_state(&self, module_id: &str) -> Option<ModuleState> {
        self.inner
            .modules
            .read()
            .await
            .iter()
            .find(|m| m.metadata.id == module_id)
            .map(|m| m.state)
    }

    /// 已注册的监听器数量
    pub async fn listener_count(&self) -> usize {
        self.inner.listeners.read().await.len()
    }

    fn required(&self, key: &str) -> Result<&str> {
        match self.inner.config.get(key).map(|v| v.trim()) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(LauncherError::ContainerStart(format!(
                "缺少必需的配置项 '{}'",
                key
            ))),
        }
    }

    async fn prepare(&self) -> Result<()> {
        for key in keys::REQUIRED_KEYS {
            let dir = self.required(key)?;
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                LauncherError::ContainerStart(format!("无法创建目录 '{}': {}", dir, e))
            })?;
        }
        Ok(())
    }

    fn ensure_active(&self) -> Result<()> {
        let state = self.inner.state();
        if state == ContainerState::Active {
            Ok(())
        } else {
            Err(LauncherError::ContainerNotRunning(format!(
                "{} ({})",
                LOCAL_PROVIDER_NAME, state
            )))
        }
    }

    /// 相对位置优先在模块存储目录下查找
    async fn resolve_location(&self, location: &str) -> PathBuf {
        let path = Path::new(location);
        if path.is_relative() {
            if let Some(store) = self.inner.config.get(keys::MODULE_STORE_DIR) {
                let candidate = Path::new(store).join(path);
                if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                    return candidate;
                }
            }
        }
        path.to_path_buf()
    }
}

#[async_trait]
impl ModuleContainer for LocalContainer {
    fn name(&self) -> &str {
        LOCAL_PROVIDER_NAME
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    async fn state(&self) -> ContainerState {
        self.inner.state()
    }

    async fn start(&self) -> Result<()> {
        let previous = self.inner.state();
        if !matches!(previous, ContainerState::Installed | ContainerState::Stopped) {
            return Err(LauncherError::InvalidState {
                state: previous.to_string(),
                operation: "start",
            });
        }

        self.inner.set_state(ContainerState::Starting);
        if let Err(e) = self.prepare().await {
            self.inner.set_state(previous);
            return Err(e);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(dispatch_loop(Arc::clone(&self.inner.listeners), rx));
        *self.inner.events.lock().await = Some(tx);
        *self.inner.dispatcher.lock().await = Some(handle);

        self.inner.set_state(ContainerState::Active);
        info!(
            module_store = self
                .inner
                .config
                .get(keys::MODULE_STORE_DIR)
                .map(String::as_str)
                .unwrap_or_default(),
            "本地模块容器已启动"
        );
        self.inner
            .emit(ContainerEvent::new(
                ContainerEventKind::Started,
                LOCAL_PROVIDER_NAME,
            ))
            .await;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        match self.inner.state() {
            ContainerState::Active => {}
            ContainerState::Installed | ContainerState::Starting => {
                self.inner.set_state(ContainerState::Stopped);
                return Ok(());
            }
            ContainerState::Stopping | ContainerState::Stopped => return Ok(()),
        }

        self.inner.set_state(ContainerState::Stopping);
        info!("正在停止本地模块容器...");
        tokio::spawn(Arc::clone(&self.inner).teardown());
        Ok(())
    }

    async fn wait_for_stop(&self, timeout: Option<Duration>) -> Result<ContainerEvent> {
        let mut rx = self.inner.state_tx.subscribe();
        let wait = async move {
            rx.wait_for(|state| *state == ContainerState::Stopped)
                .await
                .is_ok()
        };

        let stopped = match timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(stopped) => stopped,
                Err(_) => {
                    return Ok(ContainerEvent::new(
                        ContainerEventKind::WaitTimedOut,
                        LOCAL_PROVIDER_NAME,
                    )
                    .with_message(format!("{} 秒内未停止", limit.as_secs_f64())));
                }
            },
            None => wait.await,
        };

        if stopped {
            Ok(ContainerEvent::new(
                ContainerEventKind::Stopped,
                LOCAL_PROVIDER_NAME,
            ))
        } else {
            Err(LauncherError::Stop("容器状态通道已关闭".to_string()))
        }
    }

    async fn add_listener(
        &self,
        listener: Arc<dyn ContainerListener>,
        filter: TopicFilter,
    ) -> Result<ListenerId> {
        let state = self.inner.state();
        if !matches!(state, ContainerState::Active | ContainerState::Starting) {
            return Err(LauncherError::ContainerNotRunning(format!(
                "{} ({})",
                LOCAL_PROVIDER_NAME, state
            )));
        }

        let id = ListenerId(self.inner.next_listener_id.fetch_add(1, Ordering::SeqCst) + 1);
        debug!(listener = %id, filter = %filter, "注册监听器");
        self.inner.listeners.write().await.push(ListenerEntry {
            id,
            filter,
            listener,
        });
        Ok(id)
    }

    async fn remove_listener(&self, id: ListenerId) -> Result<()> {
        let mut listeners = self.inner.listeners.write().await;
        match listeners.iter().position(|entry| entry.id == id) {
            Some(index) => {
                listeners.remove(index);
                debug!(listener = %id, "移除监听器");
                Ok(())
            }
            None => Err(LauncherError::ListenerRemoval(format!("{} 未注册", id))),
        }
    }

    async fn install(&self, location: &str) -> Result<InstalledModule> {
        self.ensure_active()?;

        let path = self.resolve_location(location).await;
        let metadata =
            ModuleParser::parse_location(&path)
                .await
                .map_err(|e| LauncherError::ModuleInstall {
                    location: location.to_string(),
                    reason: e.to_string(),
                })?;

        let installed = {
            let mut modules = self.inner.modules.write().await;
            if let Some(existing) = modules.iter().find(|m| m.metadata.id == metadata.id) {
                if existing.location == location {
                    return Ok(existing.describe());
                }
                return Err(LauncherError::ModuleInstall {
                    location: location.to_string(),
                    reason: format!(
                        "模块 '{}' 已从 '{}' 安装",
                        metadata.id, existing.location
                    ),
                });
            }

            let entry = ModuleEntry {
                metadata,
                location: location.to_string(),
                state: ModuleState::Installed,
            };
            let installed = entry.describe();
            modules.push(entry);
            installed
        };

        info!(
            module_id = %installed.module_id,
            version = %installed.version,
            location = %location,
            "模块已安装"
        );
        self.inner
            .emit(
                ContainerEvent::new(
                    ContainerEventKind::ModuleInstalled,
                    installed.module_id.clone(),
                )
                .with_metadata("module_id", installed.module_id.clone())
                .with_metadata("version", installed.version.clone()),
            )
            .await;
        Ok(installed)
    }

    async fn start_module(&self, module_id: &str) -> Result<()> {
        self.ensure_active()?;

        {
            let mut modules = self.inner.modules.write().await;
            let index = modules
                .iter()
                .position(|m| m.metadata.id == module_id)
                .ok_or_else(|| LauncherError::ModuleNotFound(module_id.to_string()))?;

            if !modules[index].state.can_start() {
                return Ok(());
            }

            let dependencies = modules[index].metadata.dependencies.clone();
            for dep in dependencies.iter().filter(|d| d.required) {
                let satisfied = modules.iter().any(|m| {
                    m.metadata.id == dep.module_id
                        && m.state.is_active()
                        && m
                            .metadata
                            .parsed_version()
                            .map(|v| dep.version_matches(&v))
                            .unwrap_or(false)
                });
                if !satisfied {
                    return Err(LauncherError::ModuleStart {
                        module_id: module_id.to_string(),
                        reason: format!("依赖 '{}' ({}) 未满足", dep.module_id, dep.version),
                    });
                }
            }

            modules[index].state = ModuleState::Active;
        }

        info!(module_id = %module_id, "模块已启动");
        self.inner
            .emit(
                ContainerEvent::new(ContainerEventKind::ModuleStarted, module_id)
                    .with_metadata("module_id", module_id),
            )
            .await;
        Ok(())
    }

    async fn post_event(&self, event: ContainerEvent) -> Result<()> {
        match self.inner.events.lock().await.as_ref() {
            Some(sender) => sender.send(event).map_err(|_| {
                LauncherError::ContainerNotRunning("事件分发任务已退出".to_string())
            }),
            None => Err(LauncherError::ContainerNotRunning(format!(
                "{} ({})",
                LOCAL_PROVIDER_NAME,
                self.inner.state()
            ))),
        }
    }
}

/// 本地模块容器提供者
#[derive(Debug, Default, Clone)]
pub struct LocalProvider;

impl ContainerProvider for LocalProvider {
    fn name(&self) -> &str {
        LOCAL_PROVIDER_NAME
    }

    fn create(&self, config: ConfigMap) -> Result<Arc<dyn ModuleContainer>> {
        Ok(Arc::new(LocalContainer::new(config)))
    }
}
