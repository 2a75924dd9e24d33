//! 硬币模型模块
//!
//! - 浮雕硬币：灰度图作为高度图，与角色名一起从硬币顶面减去
//! - 毛毡底垫：与硬币同直径的薄圆柱
//! - 叠加层：矢量图标加上沿下半圆排列的角色名

use crate::core::error::{CoinError, Result};
use crate::core::imaging::{inspect_greyscale, scale_factor};
use crate::core::models::CoinDimensions;
use crate::core::scad::{self, cylinder, import, surface, text, ScadNode};
use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use indexmap::IndexMap;
use std::path::Path;

/// 把文件复制到SCAD目录，返回文件名（SCAD文件内按相对路径引用）
fn copy_into_scad_dir(file: &Path, scad_dir: &Path) -> Result<String> {
    let name = file
        .file_name()
        .ok_or_else(|| CoinError::MissingFileName(file.to_path_buf()))?;
    std::fs::create_dir_all(scad_dir)?;
    let target = scad_dir.join(name);
    if target != file {
        std::fs::copy(file, &target)?;
    }

    tracing::debug!("已复制 {} 到 {}", file.display(), scad_dir.display());
    Ok(name.to_string_lossy().into_owned())
}

/// 生成带浮雕的硬币
///
/// 灰度最小值映射到高度0，最大值映射到 `relief_height`，
/// 浮雕底部与硬币顶面对齐后连同角色名一起从硬币中减去。
pub fn coin_model(
    role_name: &str,
    grey_png: &Path,
    scad_dir: &Path,
    dims: &CoinDimensions,
) -> Result<ScadNode> {
    let file_name = copy_into_scad_dir(grey_png, scad_dir)?;
    let info = inspect_greyscale(grey_png)?;

    let coin = cylinder(dims.diameter, dims.height);

    let engraved_text = text(role_name, dims.text_size)
        .linear_extrude(dims.text_depth)
        .translate([
            0.0,
            -dims.diameter / 2.0 + dims.text_size + 5.0,
            dims.height - dims.text_depth / 2.0,
        ]);

    if info.max_pixel == info.min_pixel {
        tracing::warn!("{} 的灰度图没有明暗变化，跳过浮雕", role_name);
        return Ok(coin - engraved_text);
    }

    let xy_scale = scale_factor(info.width, info.height, dims.diameter, dims.image_fraction);
    let z_scale = dims.relief_height / f64::from(info.max_pixel - info.min_pixel);

    let relief = surface(file_name, true)
        .scale([xy_scale, xy_scale, z_scale])
        .translate([0.0, 0.0, dims.height - f64::from(info.min_pixel) * z_scale]);

    Ok(coin - engraved_text - relief)
}

/// 毛毡底垫
pub fn felt_coin_model(dims: &CoinDimensions) -> ScadNode {
    cylinder(dims.diameter, dims.felt_thickness)
}

/// 字形宽度度量
pub trait GlyphWidths {
    /// 度量时使用的字号（像素）
    fn font_size(&self) -> f64;

    /// 单个字符的宽度（像素）
    fn glyph_width(&self, c: char) -> f64;
}

/// 基于TTF/OTF字体文件的字形度量
pub struct FontGlyphWidths {
    font: FontVec,
    size: f32,
}

impl FontGlyphWidths {
    /// 加载字体
    pub fn load(path: &Path, size: f32) -> Result<Self> {
        let data = std::fs::read(path)?;
        let font = FontVec::try_from_vec(data).map_err(|e| CoinError::Font {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self { font, size })
    }
}

impl GlyphWidths for FontGlyphWidths {
    fn font_size(&self) -> f64 {
        f64::from(self.size)
    }

    fn glyph_width(&self, c: char) -> f64 {
        let scaled = self.font.as_scaled(PxScale::from(self.size));
        let glyph = scaled.scaled_glyph(c);
        let advance = scaled.h_advance(glyph.id);

        // 空白字符没有轮廓，用步进宽度代替
        match self.font.outline_glyph(glyph) {
            Some(outlined) => f64::from(outlined.px_bounds().width()),
            None => f64::from(advance),
        }
    }
}

/// 计算字符串中每个不同字符的宽度，按首次出现顺序
pub fn relative_widths(
    metrics: &(impl GlyphWidths + ?Sized),
    content: &str,
) -> IndexMap<char, f64> {
    let mut widths = IndexMap::new();
    for c in content.chars() {
        widths.entry(c).or_insert_with(|| metrics.glyph_width(c));
    }
    widths
}

/// 生成叠加层：矢量图标 + 沿底部弧线排列的大写角色名
pub fn role_overlay_model(
    role_name: &str,
    svg: &Path,
    scad_dir: &Path,
    metrics: &(impl GlyphWidths + ?Sized),
    dims: &CoinDimensions,
) -> Result<ScadNode> {
    let radius = dims.diameter / 2.0 - dims.text_size - 5.0;
    if radius <= 0.0 {
        return Err(CoinError::InvalidDimensions(format!(
            "直径 {} 放不下字号 {} 的环形文字",
            dims.diameter, dims.text_size
        )));
    }

    let file_name = copy_into_scad_dir(svg, scad_dir)?;
    let logo_size = dims.diameter * dims.image_fraction;

    let logo = import(file_name, true)
        .resize([logo_size, logo_size, 0.0], true)
        .linear_extrude(dims.overlay_height);

    let label = role_name.to_uppercase();
    let widths = relative_widths(metrics, &label);
    let mm_per_px = dims.text_size / metrics.font_size().max(f64::EPSILON);

    let total: f64 = label.chars().map(|c| widths[&c] * mm_per_px).sum();
    // 从左侧开始，以正下方为中心排列
    let start = -std::f64::consts::FRAC_PI_2 - total / radius / 2.0;

    let mut parts = vec![logo];
    let mut offset = 0.0;
    for c in label.chars() {
        let width = widths[&c] * mm_per_px;
        let theta = start + (offset + width / 2.0) / radius;
        offset += width;

        if c.is_whitespace() {
            continue;
        }

        let glyph = text(c.to_string(), dims.text_size)
            .linear_extrude(dims.overlay_height)
            .rotate([0.0, 0.0, theta.to_degrees() + 90.0])
            .translate([radius * theta.cos(), radius * theta.sin(), 0.0]);
        parts.push(glyph);
    }

    Ok(scad::union(parts))
}
