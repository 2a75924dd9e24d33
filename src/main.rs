//! clocktower-coins - Blood on the Clocktower 角色硬币生成工具
//!
//! 工作流程：
//! - `roles`：抓取wiki上的角色清单，写出 `roles.json`
//! - `coins`：根据角色清单下载缩略图并生成 OpenSCAD 模型
//! - `export`：调用 OpenSCAD 把生成的模型导出为 STL

pub mod core;
pub mod storage;

use crate::core::models::{AppConfig, CoinStyle};
use crate::core::pipeline::{export_directory, CoinMaker};
use crate::core::roles::{write_catalog, RoleFetcher};
use crate::core::tools::SystemRunner;
use crate::storage::config::ConfigManager;
use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "clocktower-coins",
    version,
    about = "生成 Blood on the Clocktower 角色硬币的 OpenSCAD 模型"
)]
struct Cli {
    /// 配置文件路径（默认位于用户配置目录）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 工作目录，配置中的相对输出路径都以它为根
    #[arg(short, long, global = true)]
    work_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 抓取角色清单并写出JSON
    Roles {
        /// 输出文件（默认取配置中的 roles_file）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// 根据角色清单生成SCAD文件
    Coins {
        /// 角色清单文件
        #[arg(short, long)]
        roles: Option<PathBuf>,
        /// 硬币样式
        #[arg(long, value_enum)]
        style: Option<StyleArg>,
        /// overlay 样式计算字符宽度所用的字体
        #[arg(long)]
        font: Option<PathBuf>,
        /// 生成后立即导出STL
        #[arg(long)]
        stl: bool,
    },
    /// 把SCAD目录中的所有文件导出为STL
    Export {
        #[arg(long)]
        scads: Option<PathBuf>,
        #[arg(long)]
        stls: Option<PathBuf>,
    },
    /// 写出默认配置文件
    InitConfig,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StyleArg {
    Relief,
    Overlay,
}

impl From<StyleArg> for CoinStyle {
    fn from(arg: StyleArg) -> Self {
        match arg {
            StyleArg::Relief => CoinStyle::Relief,
            StyleArg::Overlay => CoinStyle::Overlay,
        }
    }
}

/// 加载配置并应用工作目录
fn load_config(manager: &ConfigManager, work_dir: Option<&Path>) -> Result<AppConfig> {
    let mut config = manager.load()?;
    if let Some(root) = work_dir {
        config.layout = config.layout.rooted_at(root);
        tracing::debug!("输出路径以 {} 为根", root.display());
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let manager = ConfigManager::new(cli.config.unwrap_or_else(ConfigManager::default_path));
    let mut config = load_config(&manager, cli.work_dir.as_deref())?;

    match cli.command {
        Command::Roles { output } => {
            let output = output.unwrap_or_else(|| config.layout.roles_file.clone());
            let catalog = RoleFetcher::new(&config)?.fetch_all().await?;
            write_catalog(&catalog, &output)?;
        }
        Command::Coins {
            roles,
            style,
            font,
            stl,
        } => {
            if let Some(style) = style {
                config.style = style.into();
            }
            if font.is_some() {
                config.font_path = font;
            }
            let roles = roles.unwrap_or_else(|| config.layout.roles_file.clone());

            tracing::info!("使用 {} 样式生成硬币", config.style);
            let maker = CoinMaker::new(&config, SystemRunner)?.export_stl(stl);
            let report = maker.make_from_file(&roles).await?;

            if !report.is_all_successful() {
                for (role, reason) in &report.failures {
                    tracing::error!("{}: {}", role, reason);
                }
                anyhow::bail!("部分角色生成失败: {}", report.summary());
            }
        }
        Command::Export { scads, stls } => {
            let scads = scads.unwrap_or_else(|| config.layout.scad_dir.clone());
            let stls = stls.unwrap_or_else(|| config.layout.stl_dir.clone());

            let report = export_directory(&SystemRunner, &config.tools, &scads, &stls)?;
            tracing::info!("{}", report.summary());
            if !report.failures.is_empty() {
                anyhow::bail!("部分文件导出失败: {}", report.summary());
            }
        }
        Command::InitConfig => {
            // 写出的配置不带工作目录前缀
            manager.save(&manager.load()?)?;
            tracing::info!("已写出配置文件: {}", manager.path().display());
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志，未设置 RUST_LOG 时默认 info
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    run(Cli::parse()).await
}
