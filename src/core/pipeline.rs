//! 硬币批量生成模块
//!
//! 按角色清单顺序逐个处理：下载缩略图、转换灰度、构建模型、渲染SCAD，
//! 可选导出STL。单个角色失败只记录并跳过，不中断整批。

use crate::core::coin::{
    coin_model, felt_coin_model, role_overlay_model, FontGlyphWidths, GlyphWidths,
};
use crate::core::error::{CoinError, Result};
use crate::core::imaging::{convert_png_to_greyscale, download_png};
use crate::core::models::{
    safe_file_stem, AppConfig, CoinDimensions, CoinStyle, OutputLayout, RoleCatalog, RoleColor,
    RoleEntry, ToolPaths,
};
use crate::core::scad::render_to_file;
use crate::core::tools::{export_coin_to_stl, CommandRunner};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 字形度量使用的字号
const METRICS_FONT_SIZE: f32 = 12.0;

/// 批量生成结果
#[derive(Debug, Default)]
pub struct MakeReport {
    /// 生成的SCAD文件
    pub generated: Vec<PathBuf>,
    /// 导出的STL文件
    pub exported: Vec<PathBuf>,
    /// 新下载的图片数量
    pub downloaded: usize,
    /// 失败的角色及原因
    pub failures: Vec<(String, String)>,
}

impl MakeReport {
    /// 是否全部成功
    pub fn is_all_successful(&self) -> bool {
        self.failures.is_empty()
    }

    /// 获取摘要
    pub fn summary(&self) -> String {
        format!(
            "生成SCAD: {}, 导出STL: {}, 新下载: {}, 失败: {}",
            self.generated.len(),
            self.exported.len(),
            self.downloaded,
            self.failures.len()
        )
    }
}

/// 单个角色的产物
struct RoleOutput {
    scads: Vec<PathBuf>,
    downloaded: bool,
}

/// 硬币生成器
pub struct CoinMaker<R: CommandRunner> {
    client: reqwest::Client,
    runner: R,
    layout: OutputLayout,
    tools: ToolPaths,
    dims: CoinDimensions,
    style: CoinStyle,
    metrics: Option<Box<dyn GlyphWidths>>,
    export_stl: bool,
}

impl<R: CommandRunner> CoinMaker<R> {
    /// 根据配置创建生成器
    ///
    /// overlay 样式会立即加载配置中的字体。
    pub fn new(config: &AppConfig, runner: R) -> Result<Self> {
        let metrics: Option<Box<dyn GlyphWidths>> = match (&config.style, &config.font_path) {
            (CoinStyle::Overlay, Some(path)) => {
                Some(Box::new(FontGlyphWidths::load(path, METRICS_FONT_SIZE)?))
            }
            _ => None,
        };

        Ok(Self {
            client: reqwest::Client::new(),
            runner,
            layout: config.layout.clone(),
            tools: config.tools.clone(),
            dims: config.dimensions.clone(),
            style: config.style,
            metrics,
            export_stl: false,
        })
    }

    /// 替换字形度量
    pub fn with_metrics(mut self, metrics: Box<dyn GlyphWidths>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// 生成后是否导出STL
    pub fn export_stl(mut self, enabled: bool) -> Self {
        self.export_stl = enabled;
        self
    }

    /// 读取角色清单文件并生成
    pub async fn make_from_file(&self, roles_file: &Path) -> Result<MakeReport> {
        let catalog = crate::core::roles::load_catalog(roles_file)?;
        tracing::info!("从 {} 读取到 {} 个角色", roles_file.display(), catalog.len());
        self.make_all(&catalog).await
    }

    /// 为清单中的每个角色生成硬币
    pub async fn make_all(&self, catalog: &RoleCatalog) -> Result<MakeReport> {
        if self.style == CoinStyle::Overlay && self.metrics.is_none() {
            return Err(CoinError::FontNotConfigured);
        }

        std::fs::create_dir_all(&self.layout.png_dir)?;
        std::fs::create_dir_all(&self.layout.grey_png_dir)?;
        std::fs::create_dir_all(&self.layout.scad_dir)?;
        if self.style == CoinStyle::Overlay {
            std::fs::create_dir_all(&self.layout.svg_dir)?;
        }

        let mut report = MakeReport::default();

        for (role, entry) in catalog {
            match self.make_role(role, entry).await {
                Ok(output) => {
                    if output.downloaded {
                        report.downloaded += 1;
                    }
                    if self.export_stl {
                        self.export_outputs(role, &output.scads, &mut report);
                    }
                    report.generated.extend(output.scads);
                }
                Err(e) => {
                    tracing::warn!("角色 {} 生成失败: {}", role, e);
                    report.failures.push((role.clone(), e.to_string()));
                }
            }
        }

        tracing::info!("生成完成，{}", report.summary());
        Ok(report)
    }

    async fn make_role(&self, role: &str, entry: &RoleEntry) -> Result<RoleOutput> {
        let stem = safe_file_stem(role);
        let png = self.layout.png_dir.join(format!("{}.png", stem));
        let grey = self.layout.grey_png_dir.join(format!("{}.png", stem));

        // 已下载的图片不重复下载
        let downloaded = if png.exists() {
            false
        } else {
            download_png(&self.client, &entry.image, &png).await?;
            true
        };

        convert_png_to_greyscale(&png, &grey)?;

        let header = self.dims.file_header();
        let scads = match self.style {
            CoinStyle::Relief => {
                let scad = self.layout.scad_dir.join(format!("{}_coin.scad", stem));
                let model = coin_model(role, &grey, &self.layout.scad_dir, &self.dims)?;
                render_to_file(&model, &scad, &header)?;
                vec![scad]
            }
            CoinStyle::Overlay => self.make_overlay(role, entry, &stem, &grey, &header)?,
        };

        for scad in &scads {
            tracing::info!("已为角色 {} 生成 {}", role, scad.display());
        }

        Ok(RoleOutput { scads, downloaded })
    }

    fn make_overlay(
        &self,
        role: &str,
        entry: &RoleEntry,
        stem: &str,
        grey: &Path,
        header: &str,
    ) -> Result<Vec<PathBuf>> {
        let metrics = self.metrics.as_deref().ok_or(CoinError::FontNotConfigured)?;

        let svg = self.layout.svg_dir.join(format!("{}.svg", stem));
        crate::core::tools::convert_to_svg_with_potrace(&self.runner, &self.tools, grey, &svg)?;

        let felt_path = self.layout.scad_dir.join(format!("{}_felt.scad", stem));
        render_to_file(&felt_coin_model(&self.dims), &felt_path, header)?;

        let mut overlay =
            role_overlay_model(role, &svg, &self.layout.scad_dir, metrics, &self.dims)?;
        if entry.color != RoleColor::Unknown {
            overlay = overlay.color(entry.color.to_string());
        }
        let overlay_path = self.layout.scad_dir.join(format!("{}_overlay.scad", stem));
        render_to_file(&overlay, &overlay_path, header)?;

        Ok(vec![felt_path, overlay_path])
    }

    fn export_outputs(&self, role: &str, scads: &[PathBuf], report: &mut MakeReport) {
        for scad in scads {
            let stl = stl_path_for(scad, &self.layout.stl_dir);
            match export_coin_to_stl(&self.runner, &self.tools, role, scad, &stl) {
                Ok(()) => report.exported.push(stl),
                Err(e) => {
                    tracing::warn!("导出 {} 失败: {}", scad.display(), e);
                    report.failures.push((role.to_string(), e.to_string()));
                }
            }
        }
    }
}

fn stl_path_for(scad: &Path, stl_dir: &Path) -> PathBuf {
    let stem = scad
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stl_dir.join(format!("{}.stl", stem))
}

/// 导出目录结果
#[derive(Debug, Default)]
pub struct ExportReport {
    pub exported: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, String)>,
}

impl ExportReport {
    /// 获取摘要
    pub fn summary(&self) -> String {
        format!("导出成功: {}, 失败: {}", self.exported.len(), self.failures.len())
    }
}

/// 把目录下所有 `.scad` 文件导出为STL（不递归，按文件名排序）
pub fn export_directory(
    runner: &impl CommandRunner,
    tools: &ToolPaths,
    scad_dir: &Path,
    stl_dir: &Path,
) -> Result<ExportReport> {
    if !scad_dir.is_dir() {
        return Err(CoinError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("SCAD目录不存在: {}", scad_dir.display()),
        )));
    }

    let mut scads = Vec::new();
    for entry in WalkDir::new(scad_dir).max_depth(1).sort_by_file_name() {
        match entry {
            Ok(entry) => {
                let path = entry.path();
                if entry.file_type().is_file()
                    && path.extension().is_some_and(|ext| ext == "scad")
                {
                    scads.push(path.to_path_buf());
                }
            }
            Err(e) => {
                tracing::warn!("扫描SCAD目录时出错: {}", e);
            }
        }
    }

    tracing::info!("在 {} 找到 {} 个SCAD文件", scad_dir.display(), scads.len());

    let mut report = ExportReport::default();
    for scad in scads {
        let stl = stl_path_for(&scad, stl_dir);
        let name = scad
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match export_coin_to_stl(runner, tools, &name, &scad, &stl) {
            Ok(()) => report.exported.push(stl),
            Err(e) => {
                tracing::warn!("导出 {} 失败: {}", scad.display(), e);
                report.failures.push((scad, e.to_string()));
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tools::testing::RecordingRunner;
    use tempfile::tempdir;

    #[test]
    fn test_stl_path_for() {
        assert_eq!(
            stl_path_for(Path::new("scads/Imp_coin.scad"), Path::new("stls")),
            PathBuf::from("stls/Imp_coin.stl")
        );
    }

    #[test]
    fn test_export_directory_only_scad_files() {
        let dir = tempdir().unwrap();
        let scads = dir.path().join("scads");
        std::fs::create_dir_all(scads.join("nested")).unwrap();
        std::fs::write(scads.join("b_coin.scad"), "").unwrap();
        std::fs::write(scads.join("a_coin.scad"), "").unwrap();
        std::fs::write(scads.join("a.png"), "").unwrap();
        std::fs::write(scads.join("nested").join("c.scad"), "").unwrap();

        let runner = RecordingRunner::default();
        let stls = dir.path().join("stls");
        let report = export_directory(&runner, &ToolPaths::default(), &scads, &stls).unwrap();

        assert_eq!(
            report.exported,
            vec![stls.join("a_coin.stl"), stls.join("b_coin.stl")]
        );
        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1[2], scads.join("a_coin.scad").to_string_lossy());
    }

    #[test]
    fn test_export_directory_records_failures() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("x.scad"), "").unwrap();

        let runner = RecordingRunner::failing("openscad");
        let stls = dir.path().join("stls");
        let report = export_directory(&runner, &ToolPaths::default(), dir.path(), &stls).unwrap();

        assert!(report.exported.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.summary(), "导出成功: 0, 失败: 1");
    }

    #[test]
    fn test_export_directory_missing_dir_is_error() {
        let dir = tempdir().unwrap();
        let runner = RecordingRunner::default();

        let err = export_directory(
            &runner,
            &ToolPaths::default(),
            &dir.path().join("absent"),
            &dir.path().join("stls"),
        )
        .unwrap_err();

        match err {
            CoinError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(runner.calls.borrow().is_empty());
    }
}
