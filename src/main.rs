//! Chips Launcher 命令行入口
//!
//! # 命令概览
//!
//! - `start` - 启动模块运行时（默认命令）
//! - `check-config` - 验证配置文件
//! - `version` - 显示版本信息
//!
//! # 使用示例
//!
//! ```bash
//! # 使用自定义配置文件启动
//! chips-launcher -c launcher.yaml start
//!
//! # 开发模式启动
//! chips-launcher --dev
//!
//! # 检查配置文件并显示解析后的框架配置
//! chips-launcher check-config --resolve
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tracing::info;

use chips_launcher::core::properties;
use chips_launcher::framework::{ConfigResolver, ResolverOptions};
use chips_launcher::{LauncherConfig, LifecycleManager, Logger, LoggerConfigBuilder};

/// Chips Launcher - 薯片模块容器启动器
#[derive(Parser)]
#[command(name = "chips-launcher")]
#[command(version, about = "薯片生态的模块容器启动器", long_about = None)]
#[command(author = "Chips Team")]
#[command(propagate_version = true)]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = "launcher.yaml", global = true)]
    config: PathBuf,

    /// 日志级别 (trace, debug, info, warn, error)，覆盖配置文件
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// 开发模式（输出线程 ID 与源码位置）
    #[arg(long, global = true)]
    dev: bool,

    /// 子命令
    #[command(subcommand)]
    command: Option<Commands>,
}

/// 可用的子命令
#[derive(Subcommand)]
enum Commands {
    /// 启动模块运行时
    ///
    /// 解析框架配置、启动模块容器并安装配置的模块。
    /// 按 Ctrl+C 停止。
    Start,

    /// 验证配置文件
    CheckConfig {
        /// 同时解析并显示框架配置（会在缺失时写出默认框架配置文件）
        #[arg(long)]
        resolve: bool,
    },

    /// 查看版本信息
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Start) | None => {
            let config = load_config(&cli.config, cli.dev).await?;
            run_start(config, cli.log_level.as_deref()).await?;
        }
        Some(Commands::CheckConfig { resolve }) => {
            check_config(&cli.config, resolve).await?;
        }
        Some(Commands::Version) => print_version(),
    }

    Ok(())
}

/// 加载配置文件，不存在时使用默认配置
async fn load_config(path: &Path, dev_mode: bool) -> anyhow::Result<LauncherConfig> {
    let mut config = if path.exists() {
        LauncherConfig::from_file(path)
            .await
            .with_context(|| format!("加载配置文件失败: {}", path.display()))?
    } else {
        LauncherConfig::default()
    };
    if dev_mode {
        config.dev_mode = true;
    }
    Ok(config)
}

/// 启动模块运行时并等待关闭信号
async fn run_start(config: LauncherConfig, level_override: Option<&str>) -> anyhow::Result<()> {
    let mut logger_config =
        LoggerConfigBuilder::from_log_config(&config.logging).verbose(config.dev_mode);
    if let Some(level) = level_override {
        logger_config = logger_config.level(level);
    }
    let guard = Logger::init(logger_config.build()).context("初始化日志系统失败")?;

    match config.config_path {
        Some(ref path) => info!(path = %path.display(), "已加载配置文件"),
        None => info!("配置文件不存在，使用默认配置"),
    }

    let mut manager = LifecycleManager::builder(config)
        .log_control(Arc::new(guard.reload_handle()))
        .build();

    manager.start().await.context("模块运行时启动失败")?;

    let timings = manager.timings();
    let report = manager.install_report();
    println!();
    println!("╔════════════════════════════════════════════════════════╗");
    println!("║      薯片模块运行时已启动 (Chips Launcher Started)     ║");
    println!("╚════════════════════════════════════════════════════════╝");
    println!("  版本:     {}", chips_launcher::VERSION);
    if let Some(timings) = timings {
        println!("  启动耗时: {} ms", timings.total.as_millis());
    }
    if let Some(report) = report {
        println!(
            "  模块:     {} 个已安装，{} 个已启动，{} 个失败",
            report.installed.len(),
            report.started.len(),
            report.failures.len()
        );
    }
    println!("  按 Ctrl+C 停止");
    println!();

    manager
        .run_until(signal::ctrl_c())
        .await
        .context("监听关闭信号失败")
}

/// 检查配置文件
async fn check_config(path: &Path, resolve: bool) -> anyhow::Result<()> {
    println!("检查配置文件: {}", path.display());
    println!();

    let config = if path.exists() {
        let config = LauncherConfig::from_file(path)
            .await
            .with_context(|| format!("配置文件无效: {}", path.display()))?;
        println!("✅ 配置文件有效！");
        config
    } else {
        println!("⚠️  警告: 配置文件不存在，将使用默认配置");
        LauncherConfig::default()
    };

    println!();
    println!("配置内容:");
    println!("────────────────────────────────────────");
    println!("  [容器配置]");
    println!("    模块存储目录:   {}", config.container.module_store_dir);
    println!("    内存转储目录:   {}", config.container.memory_dump_location);
    println!(
        "    框架配置文件:   {}",
        config.container.framework_conf_path.display()
    );
    println!(
        "    强制覆盖:       {}",
        if config.container.overwrite_framework_conf { "是" } else { "否" }
    );
    match config.container.stop_timeout_secs {
        Some(secs) => println!("    停止超时:       {} 秒", secs),
        None => println!("    停止超时:       无限等待"),
    }
    println!();
    println!("  [模块配置]");
    for (index, module) in config.modules.install.iter().enumerate() {
        println!(
            "    {}. {}{}",
            index + 1,
            module.location,
            if module.start { "" } else { " (仅安装)" }
        );
    }
    println!(
        "    任一失败即中止: {}",
        if config.modules.fail_on_error { "是" } else { "否" }
    );
    println!();
    println!("  [日志配置]");
    println!("    日志级别:       {}", config.logging.level);
    println!(
        "    文件输出:       {}",
        if config.logging.file_output { "是" } else { "否" }
    );
    println!("────────────────────────────────────────");

    if resolve {
        let resolver = ConfigResolver::new(ResolverOptions::from_config(&config.container));
        let map = resolver
            .resolve(&config.container)
            .await
            .context("框架配置解析失败")?;
        println!();
        println!("框架配置:");
        print!("{}", properties::store(&map, None));
    }

    Ok(())
}

/// 打印版本信息
fn print_version() {
    println!();
    println!("Chips Launcher - 薯片模块容器启动器");
    println!("═══════════════════════════════════════");
    println!("  版本:             {}", chips_launcher::VERSION);
    println!();
    println!("构建信息:");
    println!("  目标平台:         {}", std::env::consts::ARCH);
    println!("  操作系统:         {}", std::env::consts::OS);
    println!("═══════════════════════════════════════");
    println!();
}
