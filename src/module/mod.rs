//! 模块描述
//!
//! 包含模块制品的元数据定义与 module.yaml 解析器。

pub mod metadata;
pub mod parser;

// 重导出常用类型
pub use metadata::{Dependency, ModuleMetadata, ModuleState};
pub use parser::{ModuleParser, MODULE_DESCRIPTOR_FILE};
