//! 框架配置解析集成测试
//!
//! 测试磁盘配置、内置默认配置与应用配置的叠加

use chips_launcher::container::keys;
use chips_launcher::core::properties;
use chips_launcher::framework::{ConfigResolver, DefaultProperties, ResolverOptions};
use chips_launcher::{LauncherConfig, LauncherError};
use tempfile::TempDir;

fn launcher_config(dir: &TempDir) -> LauncherConfig {
    LauncherConfig::builder()
        .module_store_dir("/data/chips/store")
        .memory_dump_location("/data/chips/dumps")
        .framework_conf_path(dir.path().join("conf/framework.properties"))
        .build()
}

/// 文件存在/不存在 × 强制覆盖开/关
#[tokio::test]
async fn test_file_presence_and_force_matrix() {
    for (file_present, force) in [(false, false), (false, true), (true, false), (true, true)] {
        let dir = TempDir::new().unwrap();
        let config = launcher_config(&dir);
        let conf_path = config.container.framework_conf_path.clone();

        if file_present {
            std::fs::create_dir_all(conf_path.parent().unwrap()).unwrap();
            std::fs::write(&conf_path, "from.disk=yes\nchips.log.level=warn\n").unwrap();
        }

        let options = ResolverOptions {
            force_overwrite: force,
            ..ResolverOptions::from_config(&config.container)
        };
        let map = ConfigResolver::new(options)
            .resolve(&config.container)
            .await
            .unwrap();

        assert_eq!(map[keys::MODULE_STORE_DIR], "/data/chips/store");
        assert_eq!(map[keys::MEMORY_DUMP_LOCATION], "/data/chips/dumps");

        let disk_wins = file_present && !force;
        assert_eq!(map.contains_key("from.disk"), disk_wins, "{:?}", (file_present, force));
        assert_eq!(map.contains_key("chips.container.name"), !disk_wins);
        assert!(conf_path.exists());
    }
}

/// 写出的默认配置再次读取与直接解析内置字节一致
#[tokio::test]
async fn test_written_defaults_match_bundled_parse() {
    let dir = TempDir::new().unwrap();
    let config = launcher_config(&dir);
    let conf_path = config.container.framework_conf_path.clone();

    let options = ResolverOptions {
        conf_path: conf_path.clone(),
        ..Default::default()
    };
    ConfigResolver::new(options)
        .resolve(&config.container)
        .await
        .unwrap();

    let written = std::fs::read(&conf_path).unwrap();
    let reparsed = properties::parse(&written).unwrap();
    let bundled = properties::parse(include_bytes!("../resources/framework.properties")).unwrap();
    assert_eq!(reparsed, bundled);
}

/// 指定的默认配置文件
#[tokio::test]
async fn test_custom_defaults_file() {
    let dir = TempDir::new().unwrap();
    let defaults = dir.path().join("defaults.properties");
    std::fs::write(&defaults, "custom.default: 42\n").unwrap();

    let config = launcher_config(&dir);
    let options = ResolverOptions {
        conf_path: config.container.framework_conf_path.clone(),
        ..Default::default()
    }
    .with_defaults(DefaultProperties::File(defaults));

    let map = ConfigResolver::new(options)
        .resolve(&config.container)
        .await
        .unwrap();

    assert_eq!(map["custom.default"], "42");
    assert_eq!(
        std::fs::read_to_string(&config.container.framework_conf_path).unwrap(),
        "custom.default: 42\n"
    );
}

/// 应用配置缺少必需项
#[tokio::test]
async fn test_required_key_missing() {
    let dir = TempDir::new().unwrap();
    let mut config = launcher_config(&dir);
    config.container.module_store_dir.clear();

    let options = ResolverOptions {
        conf_path: config.container.framework_conf_path.clone(),
        ..Default::default()
    };
    let err = ConfigResolver::new(options)
        .resolve(&config.container)
        .await
        .unwrap_err();

    assert!(matches!(err, LauncherError::ConfigResolution(_)));
    assert_eq!(err.error_code(), chips_launcher::error_code::CONFIG_RESOLUTION_FAILED);
}

/// 从 YAML 文件加载应用配置
#[tokio::test]
async fn test_launcher_config_from_yaml_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("launcher.yaml");
    std::fs::write(
        &path,
        r#"
container:
  module_store_dir: /opt/chips/store
  overwrite_framework_conf: true
modules:
  fail_on_error: true
  install:
    - location: modules/editor
    - location: modules/viewer
      start: false
"#,
    )
    .unwrap();

    let config = LauncherConfig::from_file(&path).await.unwrap();
    assert_eq!(config.container.module_store_dir, "/opt/chips/store");
    assert!(config.container.overwrite_framework_conf);
    assert!(config.modules.fail_on_error);
    assert_eq!(config.modules.install.len(), 2);
    assert!(!config.modules.install[1].start);
}
