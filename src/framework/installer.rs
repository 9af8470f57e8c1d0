//! 模块安装
//!
//! 按配置顺序把模块安装到运行中的容器。每个模块互相独立，失败被收集后继续下一个。

use tracing::{info, instrument, warn};

use crate::container::{InstalledModule, ModuleContainer};
use crate::core::{ModuleDescriptor, ModulesConfig};
use crate::utils::{LauncherError, Result};

/// 单个模块的失败记录
#[derive(Debug)]
pub struct InstallFailure {
    pub location: String,
    pub error: LauncherError,
}

/// 安装结果汇总
#[derive(Debug, Default)]
pub struct InstallReport {
    /// 尝试安装的模块数
    pub attempted: usize,
    /// 安装成功的模块（按安装顺序）
    pub installed: Vec<InstalledModule>,
    /// 配置为安装后启动的模块数
    pub start_requested: usize,
    /// 已启动的模块 ID
    pub started: Vec<String>,
    pub failures: Vec<InstallFailure>,
}

impl InstallReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// 模块安装器
#[derive(Debug, Clone, Default)]
pub struct ModuleInstaller {
    fail_on_error: bool,
}

impl ModuleInstaller {
    pub fn new(config: &ModulesConfig) -> Self {
        Self {
            fail_on_error: config.fail_on_error,
        }
    }

    /// 依次安装并按需启动模块
    #[instrument(skip_all, fields(count = descriptors.len()))]
    pub async fn install_all(
        &self,
        container: &dyn ModuleContainer,
        descriptors: &[ModuleDescriptor],
    ) -> InstallReport {
        let mut report = InstallReport {
            attempted: descriptors.len(),
            start_requested: descriptors.iter().filter(|d| d.start).count(),
            ..Default::default()
        };

        for descriptor in descriptors {
            let module = match container.install(&descriptor.location).await {
                Ok(module) => module,
                Err(e) => {
                    warn!(
                        location = %descriptor.location,
                        error_code = e.error_code(),
                        error = %e,
                        "模块安装失败"
                    );
                    report.failures.push(InstallFailure {
                        location: descriptor.location.clone(),
                        error: e,
                    });
                    continue;
                }
            };

            if descriptor.start {
                match container.start_module(&module.module_id).await {
                    Ok(()) => report.started.push(module.module_id.clone()),
                    Err(e) => {
                        warn!(
                            module_id = %module.module_id,
                            error_code = e.error_code(),
                            error = %e,
                            "模块启动失败"
                        );
                        report.failures.push(InstallFailure {
                            location: descriptor.location.clone(),
                            error: e,
                        });
                    }
                }
            }

            report.installed.push(module);
        }

        info!(
            attempted = report.attempted,
            installed = report.installed.len(),
            started = report.started.len(),
            failed = report.failures.len(),
            "模块安装完成"
        );
        report
    }

    /// 判断安装结果是否可接受
    ///
    /// 以下情况不可接受：
    /// - 配置了模块但一个都没有安装成功
    /// - 有模块要求启动但一个都没有启动
    /// - 启用 `fail_on_error` 且存在失败
    pub fn evaluate(&self, report: &InstallReport) -> Result<()> {
        let nothing_installed = report.attempted > 0 && report.installed.is_empty();
        let nothing_started = report.start_requested > 0 && report.started.is_empty();
        let strict_failure = self.fail_on_error && !report.failures.is_empty();

        if nothing_installed || nothing_started || strict_failure {
            return Err(LauncherError::ModulesFailed {
                failed: report.failures.len(),
                total: report.attempted,
            });
        }
        Ok(())
    }
}
