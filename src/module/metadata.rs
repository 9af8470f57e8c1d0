//! 模块元数据定义
//!
//! 定义模块描述文件 (module.yaml) 中的数据结构，以及模块在容器中的状态。

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

/// 依赖声明
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    /// 依赖模块 ID
    pub module_id: String,

    /// 版本要求（semver 格式）
    pub version: String,

    /// 是否必须
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl Dependency {
    pub fn new(module_id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            module_id: module_id.into(),
            version: version.into(),
            required: true,
        }
    }

    /// 检查版本是否满足要求
    pub fn version_matches(&self, version: &Version) -> bool {
        VersionReq::parse(&self.version)
            .map(|req| req.matches(version))
            .unwrap_or(false)
    }
}

/// 模块元数据
///
/// 对应模块目录下 module.yaml 文件中的配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleMetadata {
    /// 模块唯一标识
    pub id: String,

    /// 模块显示名称
    pub name: String,

    /// 模块版本（semver 格式）
    pub version: String,

    /// 模块描述
    #[serde(default)]
    pub description: String,

    /// 依赖声明
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

impl ModuleMetadata {
    /// 创建新的模块元数据
    pub fn new(id: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version: version.into(),
            description: String::new(),
            dependencies: vec![],
        }
    }

    /// 解析版本号
    pub fn parsed_version(&self) -> Option<Version> {
        Version::parse(&self.version).ok()
    }
}

/// 模块在容器中的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModuleState {
    /// 已安装，未启动
    #[default]
    Installed,
    /// 运行中
    Active,
    /// 已停止
    Resolved,
}

impl ModuleState {
    /// 是否可以启动
    pub fn can_start(&self) -> bool {
        matches!(self, ModuleState::Installed | ModuleState::Resolved)
    }

    /// 是否正在运行
    pub fn is_active(&self) -> bool {
        matches!(self, ModuleState::Active)
    }
}
