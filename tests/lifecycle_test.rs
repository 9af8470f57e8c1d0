//! # 生命周期集成测试
//!
//! 使用内置本地容器测试完整的启动与停止流程：
//! - 配置解析 → 容器启动 → 监听器注册 → 模块安装
//! - 启动失败时的回滚
//! - 容器发布的日志配置事件

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chips_launcher::framework::ResolverOptions;
use chips_launcher::{
    ContainerEvent, ContainerState, LauncherConfig, LauncherError, LifecycleManager,
    LogLevelControl, RuntimeState,
};
use tempfile::TempDir;

// ============================================================================
// 测试辅助
// ============================================================================

/// 记录收到的日志过滤指令
#[derive(Default)]
struct RecordingControl {
    applied: Mutex<Vec<String>>,
}

impl LogLevelControl for RecordingControl {
    fn apply(&self, directives: &str) -> chips_launcher::Result<()> {
        self.applied.lock().unwrap().push(directives.to_string());
        Ok(())
    }
}

fn write_module(dir: &Path, id: &str, version: &str, deps: &[(&str, &str)]) -> String {
    let module_dir = dir.join(id);
    std::fs::create_dir_all(&module_dir).unwrap();

    let mut yaml = format!("id: {}\nname: {}\nversion: {}\n", id, id, version);
    if !deps.is_empty() {
        yaml.push_str("dependencies:\n");
        for (dep, req) in deps {
            yaml.push_str(&format!("  - module_id: {}\n    version: \"{}\"\n", dep, req));
        }
    }
    std::fs::write(module_dir.join("module.yaml"), yaml).unwrap();
    module_dir.display().to_string()
}

fn base_config(dir: &TempDir) -> chips_launcher::LauncherConfigBuilder {
    LauncherConfig::builder()
        .module_store_dir(dir.path().join("store").display().to_string())
        .memory_dump_location(dir.path().join("dumps").display().to_string())
        .framework_conf_path(dir.path().join("conf/framework.properties"))
        .stop_timeout_secs(5)
}

fn manager_for(dir: &TempDir, config: LauncherConfig) -> LifecycleManager {
    LifecycleManager::builder(config)
        .resolver_options(ResolverOptions {
            conf_path: dir.path().join("conf/framework.properties"),
            ..Default::default()
        })
        .build()
}

// ============================================================================
// 启动与停止
// ============================================================================

#[tokio::test]
async fn test_start_and_stop_with_local_container() {
    let dir = TempDir::new().unwrap();
    let modules = dir.path().join("modules");
    let base = write_module(&modules, "base", "1.0.0", &[]);
    let editor = write_module(&modules, "editor", "0.3.0", &[("base", "^1.0")]);

    let config = base_config(&dir)
        .install(base, true)
        .install(editor, true)
        .build();
    let mut manager = manager_for(&dir, config);

    manager.start().await.unwrap();

    assert_eq!(manager.state(), RuntimeState::Running);
    assert!(manager.listeners().is_complete());
    assert!(dir.path().join("conf/framework.properties").exists());
    assert!(dir.path().join("store").is_dir());

    let report = manager.install_report().unwrap();
    assert_eq!(report.started, vec!["base", "editor"]);
    assert!(report.is_clean());

    let timings = manager.timings().unwrap();
    assert!(timings.total >= timings.container);

    let container = manager.container().unwrap();
    assert_eq!(container.state().await, ContainerState::Active);

    manager.stop().await;

    assert_eq!(manager.state(), RuntimeState::Stopped);
    assert!(manager.container().is_none());
    assert!(manager.listeners().is_empty());
    assert_eq!(container.state().await, ContainerState::Stopped);
}

#[tokio::test]
async fn test_install_only_module_is_not_started() {
    let dir = TempDir::new().unwrap();
    let viewer = write_module(&dir.path().join("modules"), "viewer", "1.0.0", &[]);

    let config = base_config(&dir).install(viewer, false).build();
    let mut manager = manager_for(&dir, config);

    manager.start().await.unwrap();
    let report = manager.install_report().unwrap();
    assert_eq!(report.installed.len(), 1);
    assert!(report.started.is_empty());

    manager.stop().await;
}

#[tokio::test]
async fn test_stop_twice_is_noop() {
    let dir = TempDir::new().unwrap();
    let mut manager = manager_for(&dir, base_config(&dir).build());

    manager.start().await.unwrap();
    manager.stop().await;
    manager.stop().await;

    assert_eq!(manager.state(), RuntimeState::Stopped);
}

#[tokio::test]
async fn test_stop_without_start() {
    let dir = TempDir::new().unwrap();
    let mut manager = manager_for(&dir, base_config(&dir).build());

    manager.stop().await;
    assert_eq!(manager.state(), RuntimeState::Stopped);
}

// ============================================================================
// 启动失败
// ============================================================================

#[tokio::test]
async fn test_all_modules_missing_rolls_back() {
    let dir = TempDir::new().unwrap();
    let config = base_config(&dir)
        .install(dir.path().join("nowhere").display().to_string(), true)
        .build();
    let mut manager = manager_for(&dir, config);

    let err = manager.start().await.unwrap_err();

    assert!(matches!(
        err,
        LauncherError::ModulesFailed { failed: 1, total: 1 }
    ));
    assert_eq!(manager.state(), RuntimeState::Stopped);
    assert!(manager.container().is_none());
    assert!(manager.listeners().is_empty());
}

#[tokio::test]
async fn test_unmet_dependency_with_fail_on_error() {
    let dir = TempDir::new().unwrap();
    let modules = dir.path().join("modules");
    let base = write_module(&modules, "base", "1.0.0", &[]);
    let editor = write_module(&modules, "editor", "1.0.0", &[("base", "^2.0")]);

    let lenient = base_config(&dir)
        .install(base.clone(), true)
        .install(editor.clone(), true)
        .build();
    let mut manager = manager_for(&dir, lenient);
    manager.start().await.unwrap();
    assert_eq!(manager.install_report().unwrap().failures.len(), 1);
    manager.stop().await;

    let strict = base_config(&dir)
        .install(base, true)
        .install(editor, true)
        .fail_on_error(true)
        .build();
    let mut manager = manager_for(&dir, strict);
    let err = manager.start().await.unwrap_err();
    assert!(matches!(err, LauncherError::ModulesFailed { .. }));
    assert_eq!(manager.state(), RuntimeState::Stopped);
}

#[tokio::test]
async fn test_only_module_with_missing_dependency_rolls_back() {
    let dir = TempDir::new().unwrap();
    let editor = write_module(
        &dir.path().join("modules"),
        "editor",
        "1.0.0",
        &[("ghost", "^1.0")],
    );

    let config = base_config(&dir).install(editor, true).build();
    let mut manager = manager_for(&dir, config);

    let err = manager.start().await.unwrap_err();

    assert!(matches!(
        err,
        LauncherError::ModulesFailed { failed: 1, total: 1 }
    ));
    assert_eq!(manager.state(), RuntimeState::Stopped);
    assert!(manager.container().is_none());

    let report = manager.install_report().unwrap();
    assert_eq!(report.installed.len(), 1);
    assert!(report.started.is_empty());
}

#[tokio::test]
async fn test_unknown_provider_is_fatal() {
    let dir = TempDir::new().unwrap();
    let config = base_config(&dir).provider("remote").build();
    let mut manager = manager_for(&dir, config);

    let err = manager.start().await.unwrap_err();
    assert!(matches!(err, LauncherError::NoContainerProvider(_)));
    assert_eq!(manager.state(), RuntimeState::Stopped);
}

// ============================================================================
// 日志配置事件
// ============================================================================

#[tokio::test]
async fn test_logger_event_reaches_log_control() {
    let dir = TempDir::new().unwrap();
    let control = Arc::new(RecordingControl::default());

    let mut manager = LifecycleManager::builder(base_config(&dir).build())
        .resolver_options(ResolverOptions {
            conf_path: dir.path().join("conf/framework.properties"),
            ..Default::default()
        })
        .log_control(control.clone())
        .build();
    manager.start().await.unwrap();

    let container = manager.container().unwrap();
    container
        .post_event(ContainerEvent::logger_update(
            "test",
            &["chips_launcher::container"],
            "debug",
        ))
        .await
        .unwrap();

    // 事件在容器的分发任务中异步处理
    let mut applied = Vec::new();
    for _ in 0..100 {
        applied = control.applied.lock().unwrap().clone();
        if !applied.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(applied, vec!["chips_launcher::container=debug".to_string()]);

    manager.stop().await;
}
