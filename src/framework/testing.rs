//! 记录调用顺序的桩容器

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::container::{
    ContainerEvent, ContainerEventKind, ContainerListener, ContainerProvider, ContainerState,
    InstalledModule, ListenerId, ModuleContainer, TopicFilter,
};
use crate::core::ConfigMap;
use crate::utils::{LauncherError, Result};

struct State {
    calls: Vec<String>,
    container_state: ContainerState,
    fail_start: bool,
    fail_remove: bool,
    failing_locations: HashSet<String>,
    failing_starts: HashSet<String>,
    listeners: BTreeMap<ListenerId, (TopicFilter, Arc<dyn ContainerListener>)>,
    next_id: u64,
    config: Option<ConfigMap>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            container_state: ContainerState::Installed,
            fail_start: false,
            fail_remove: false,
            failing_locations: HashSet::new(),
            failing_starts: HashSet::new(),
            listeners: BTreeMap::new(),
            next_id: 0,
            config: None,
        }
    }
}

/// 桩容器与测试共享的记录
#[derive(Clone, Default)]
pub(crate) struct Recording {
    state: Arc<Mutex<State>>,
}

impl Recording {
    fn record(&self, call: impl Into<String>) {
        self.state.lock().unwrap().calls.push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().unwrap().listeners.len()
    }

    pub fn config(&self) -> Option<ConfigMap> {
        self.state.lock().unwrap().config.clone()
    }

    pub fn fail_start(&self) {
        self.state.lock().unwrap().fail_start = true;
    }

    pub fn fail_remove(&self) {
        self.state.lock().unwrap().fail_remove = true;
    }

    pub fn fail_install(&self, location: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_locations
            .insert(location.to_string());
    }

    pub fn fail_start_module(&self, module_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_starts
            .insert(module_id.to_string());
    }
}

pub(crate) struct StubContainer {
    recording: Recording,
}

#[async_trait]
impl ModuleContainer for StubContainer {
    fn name(&self) -> &str {
        "stub"
    }

    fn version(&self) -> &str {
        "0.0.0"
    }

    async fn state(&self) -> ContainerState {
        self.recording.state.lock().unwrap().container_state
    }

    async fn start(&self) -> Result<()> {
        self.recording.record("start");
        let mut state = self.recording.state.lock().unwrap();
        if state.fail_start {
            return Err(LauncherError::InitFailed("stub start failure".to_string()));
        }
        state.container_state = ContainerState::Active;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.recording.record("stop");
        self.recording.state.lock().unwrap().container_state = ContainerState::Stopped;
        Ok(())
    }

    async fn wait_for_stop(&self, _timeout: Option<Duration>) -> Result<ContainerEvent> {
        self.recording.record("wait_for_stop");
        Ok(ContainerEvent::new(ContainerEventKind::Stopped, "stub"))
    }

    async fn add_listener(
        &self,
        listener: Arc<dyn ContainerListener>,
        filter: TopicFilter,
    ) -> Result<ListenerId> {
        self.recording.record("add_listener");
        let mut state = self.recording.state.lock().unwrap();
        state.next_id += 1;
        let id = ListenerId(state.next_id);
        state.listeners.insert(id, (filter, listener));
        Ok(id)
    }

    async fn remove_listener(&self, id: ListenerId) -> Result<()> {
        self.recording.record(format!("remove_listener:{}", id.0));
        let mut state = self.recording.state.lock().unwrap();
        if state.fail_remove {
            return Err(LauncherError::ListenerRemoval("stub removal failure".to_string()));
        }
        state
            .listeners
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| LauncherError::ListenerRemoval(id.to_string()))
    }

    async fn install(&self, location: &str) -> Result<InstalledModule> {
        self.recording.record(format!("install:{}", location));
        if self
            .recording
            .state
            .lock()
            .unwrap()
            .failing_locations
            .contains(location)
        {
            return Err(LauncherError::ModuleInstall {
                location: location.to_string(),
                reason: "stub install failure".to_string(),
            });
        }
        Ok(InstalledModule {
            module_id: location.to_string(),
            name: location.to_string(),
            version: "1.0.0".to_string(),
            location: location.to_string(),
        })
    }

    async fn start_module(&self, module_id: &str) -> Result<()> {
        self.recording.record(format!("start_module:{}", module_id));
        if self
            .recording
            .state
            .lock()
            .unwrap()
            .failing_starts
            .contains(module_id)
        {
            return Err(LauncherError::ModuleStart {
                module_id: module_id.to_string(),
                reason: "stub start failure".to_string(),
            });
        }
        Ok(())
    }

    async fn post_event(&self, event: ContainerEvent) -> Result<()> {
        let targets: Vec<Arc<dyn ContainerListener>> = self
            .recording
            .state
            .lock()
            .unwrap()
            .listeners
            .values()
            .filter(|(filter, _)| filter.matches(&event))
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in targets {
            listener.on_event(&event);
        }
        Ok(())
    }
}

pub(crate) struct StubProvider {
    name: String,
    recording: Recording,
}

impl StubProvider {
    pub fn new(recording: Recording) -> Self {
        Self::named("stub", recording)
    }

    pub fn named(name: &str, recording: Recording) -> Self {
        Self {
            name: name.to_string(),
            recording,
        }
    }
}

impl ContainerProvider for StubProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn create(&self, config: ConfigMap) -> Result<Arc<dyn ModuleContainer>> {
        self.recording.state.lock().unwrap().config = Some(config);
        Ok(Arc::new(StubContainer {
            recording: self.recording.clone(),
        }))
    }
}
