//! 核心数据模型定义
//!
//! 角色清单、硬币尺寸与应用配置。角色清单的JSON格式与 `roles.json` 保持一致。

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 角色颜色，由角色所属阵营决定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoleColor {
    /// 镇民与外来者
    Blue,
    /// 爪牙与恶魔
    Red,
    /// 旅行者
    Purple,
    /// 传奇角色
    Yellow,
    /// 奇遇角色
    Green,
    #[default]
    Unknown,
}

impl std::fmt::Display for RoleColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RoleColor::Blue => "blue",
            RoleColor::Red => "red",
            RoleColor::Purple => "purple",
            RoleColor::Yellow => "yellow",
            RoleColor::Green => "green",
            RoleColor::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// 单个角色条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEntry {
    /// 角色缩略图的完整URL
    pub image: String,
    /// 角色颜色
    pub color: RoleColor,
}

/// 角色清单：角色名 -> 条目，保持插入顺序
///
/// 同名角色再次插入时覆盖值但保留原位置。
pub type RoleCatalog = IndexMap<String, RoleEntry>;

/// 把角色名转换为安全的文件名主干：空格换成下划线，去掉撇号
pub fn safe_file_stem(role: &str) -> String {
    role.replace(' ', "_").replace('\'', "")
}

/// 硬币尺寸参数（单位：毫米）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoinDimensions {
    /// 直径
    pub diameter: f64,
    /// 厚度
    pub height: f64,
    /// 文字雕刻深度
    pub text_depth: f64,
    /// 文字字号
    pub text_size: f64,
    /// 浮雕最大高度
    pub relief_height: f64,
    /// 图像最长边占直径的比例
    pub image_fraction: f64,
    /// 毛毡底垫厚度
    pub felt_thickness: f64,
    /// 叠加层（矢量图标与文字）挤出高度
    pub overlay_height: f64,
    /// OpenSCAD 圆细分数 `$fn`
    pub segments: u32,
}

impl Default for CoinDimensions {
    fn default() -> Self {
        Self {
            diameter: 50.0,
            height: 6.0,
            text_depth: 2.0,
            text_size: 3.0,
            relief_height: 6.0,
            image_fraction: 0.55,
            felt_thickness: 1.0,
            overlay_height: 1.0,
            segments: 100,
        }
    }
}

impl CoinDimensions {
    /// 渲染SCAD文件时使用的文件头
    pub fn file_header(&self) -> String {
        format!("$fn={};", self.segments)
    }
}

/// 硬币样式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CoinStyle {
    /// 灰度浮雕雕刻在硬币顶面
    #[default]
    Relief,
    /// 矢量化图标与弧形角色名，配合毛毡底垫
    Overlay,
}

impl std::fmt::Display for CoinStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoinStyle::Relief => write!(f, "relief"),
            CoinStyle::Overlay => write!(f, "overlay"),
        }
    }
}

/// 外部程序路径
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub openscad: String,
    pub potrace: String,
    /// ImageMagick convert
    pub convert: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            openscad: "openscad".to_string(),
            potrace: "potrace".to_string(),
            convert: "convert".to_string(),
        }
    }
}

/// 输出目录布局
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputLayout {
    /// 角色清单文件
    pub roles_file: PathBuf,
    /// 原始PNG下载目录
    pub png_dir: PathBuf,
    /// 灰度PNG目录
    pub grey_png_dir: PathBuf,
    /// 矢量SVG目录
    pub svg_dir: PathBuf,
    /// SCAD输出目录
    pub scad_dir: PathBuf,
    /// STL导出目录
    pub stl_dir: PathBuf,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self {
            roles_file: PathBuf::from("roles.json"),
            png_dir: PathBuf::from("pngs"),
            grey_png_dir: PathBuf::from("grey_pngs"),
            svg_dir: PathBuf::from("svgs"),
            scad_dir: PathBuf::from("scads"),
            stl_dir: PathBuf::from("stls"),
        }
    }
}

impl OutputLayout {
    /// 以 `root` 为根重新定位所有相对路径
    pub fn rooted_at(&self, root: &std::path::Path) -> Self {
        Self {
            roles_file: root.join(&self.roles_file),
            png_dir: root.join(&self.png_dir),
            grey_png_dir: root.join(&self.grey_png_dir),
            svg_dir: root.join(&self.svg_dir),
            scad_dir: root.join(&self.scad_dir),
            stl_dir: root.join(&self.stl_dir),
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// wiki 根地址，图片相对路径基于它解析
    pub wiki_base_url: String,
    /// 按顺序抓取的剧本页面
    pub edition_pages: Vec<String>,
    /// 旅行者页面（该页所有角色均为紫色）
    pub travellers_page: String,
    /// 输出路径
    pub layout: OutputLayout,
    /// 外部程序
    pub tools: ToolPaths,
    /// 计算字符宽度所用的字体（Overlay 样式需要）
    pub font_path: Option<PathBuf>,
    /// 硬币尺寸
    pub dimensions: CoinDimensions,
    /// 默认样式
    pub style: CoinStyle,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            wiki_base_url: "https://wiki.bloodontheclocktower.com/".to_string(),
            edition_pages: vec![
                "Experimental".to_string(),
                "Trouble_Brewing".to_string(),
                "Sects_%26_Violets".to_string(),
                "Bad_Moon_Rising".to_string(),
            ],
            travellers_page: "Travellers".to_string(),
            layout: OutputLayout::default(),
            tools: ToolPaths::default(),
            font_path: None,
            dimensions: CoinDimensions::default(),
            style: CoinStyle::default(),
        }
    }
}
