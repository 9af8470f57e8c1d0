//! 模块元数据解析器
//!
//! 负责从模块制品位置读取并校验 module.yaml。

use std::path::{Path, PathBuf};

use crate::module::metadata::ModuleMetadata;
use crate::utils::{LauncherError, Result};

/// 模块描述文件名
pub const MODULE_DESCRIPTOR_FILE: &str = "module.yaml";

/// 模块元数据解析器
#[derive(Debug, Clone, Default)]
pub struct ModuleParser;

impl ModuleParser {
    /// 将模块制品位置解析为描述文件路径
    ///
    /// 位置可以是模块目录（包含 module.yaml），也可以直接是描述文件路径。
    pub async fn descriptor_path(location: &Path) -> PathBuf {
        match tokio::fs::metadata(location).await {
            Ok(meta) if meta.is_dir() => location.join(MODULE_DESCRIPTOR_FILE),
            _ => location.to_path_buf(),
        }
    }

    /// 从模块制品位置解析模块元数据
    ///
    /// # Errors
    ///
    /// - 描述文件不存在或无法读取时返回 IO 错误
    /// - 文件内容不符合 YAML 格式时返回 YAML 错误
    /// - 元数据验证失败时返回 `InvalidMetadata` 错误
    pub async fn parse_location(location: &Path) -> Result<ModuleMetadata> {
        let path = Self::descriptor_path(location).await;
        let content = tokio::fs::read_to_string(&path).await?;
        Self::parse_string(&content)
    }

    /// 从字符串解析模块元数据
    pub fn parse_string(content: &str) -> Result<ModuleMetadata> {
        let metadata: ModuleMetadata = serde_yaml::from_str(content)?;
        Self::validate(&metadata)?;
        Ok(metadata)
    }

    /// 验证模块元数据
    ///
    /// 执行以下验证：
    /// - 必填字段检查（id, name, version）
    /// - 版本号格式验证（semver）
    /// - 依赖声明版本格式验证
    pub fn validate(metadata: &ModuleMetadata) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        if metadata.id.is_empty() {
            errors.push("模块 ID 不能为空".to_string());
        } else if !Self::is_valid_module_id(&metadata.id) {
            errors.push(format!(
                "模块 ID '{}' 格式无效，只允许字母、数字、下划线和连字符",
                metadata.id
            ));
        }

        if metadata.name.is_empty() {
            errors.push("模块名称不能为空".to_string());
        }

        if metadata.version.is_empty() {
            errors.push("模块版本号不能为空".to_string());
        } else if semver::Version::parse(&metadata.version).is_err() {
            errors.push(format!(
                "无效的版本号格式 '{}', 请使用 semver 格式 (如 1.0.0)",
                metadata.version
            ));
        }

        for (index, dep) in metadata.dependencies.iter().enumerate() {
            if dep.module_id.is_empty() {
                errors.push(format!("第 {} 个依赖的模块 ID 不能为空", index + 1));
            }

            if semver::VersionReq::parse(&dep.version).is_err() {
                errors.push(format!(
                    "依赖 '{}' 的版本要求格式无效: '{}'",
                    dep.module_id, dep.version
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(LauncherError::InvalidMetadata(errors.join("; ")))
        }
    }

    /// 有效格式：字母开头，只包含字母、数字、下划线和连字符
    fn is_valid_module_id(id: &str) -> bool {
        let mut chars = id.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            }
            _ => false,
        }
    }
}
