//! 图像准备模块
//!
//! 下载角色缩略图，去除透明通道并转换为灰度图，供 OpenSCAD 的 `surface()` 使用。

use crate::core::error::{CoinError, Result};
use image::{GrayImage, ImageFormat, Luma, RgbaImage};
use reqwest::StatusCode;
use std::path::Path;

/// 下载PNG图片并保存到 `path`
pub async fn download_png(client: &reqwest::Client, url: &str, path: &Path) -> Result<()> {
    let response = client.get(url).send().await?;
    if response.status() != StatusCode::OK {
        return Err(CoinError::HttpStatus {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    let bytes = response.bytes().await?;
    // 基于magic number校验，wiki偶尔会返回HTML错误页
    if !matches!(infer::get(&bytes), Some(kind) if kind.mime_type() == "image/png") {
        return Err(CoinError::NotPng {
            url: url.to_string(),
        });
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &bytes)?;

    tracing::info!("已下载 {}", path.display());
    Ok(())
}

/// 把RGBA图像合成到白色背景上再转为灰度
///
/// 灰度使用 ITU-R 601-2 权重的16位定点形式，与 Pillow 的 `convert("L")` 逐像素一致：
/// `L = (R*19595 + G*38470 + B*7471 + 0x8000) >> 16`。
pub fn flatten_to_greyscale(rgba: &RgbaImage) -> GrayImage {
    GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = u32::from(a);
        let over_white = |c: u8| (u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255;

        let (r, g, b) = (over_white(r), over_white(g), over_white(b));
        let luma = (r * 19595 + g * 38470 + b * 7471 + 0x8000) >> 16;
        Luma([luma as u8])
    })
}

/// 将PNG转换为灰度PNG
pub fn convert_png_to_greyscale(png_path: &Path, grey_path: &Path) -> Result<()> {
    let rgba = image::open(png_path)?.to_rgba8();
    let grey = flatten_to_greyscale(&rgba);

    if let Some(parent) = grey_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    grey.save_with_format(grey_path, ImageFormat::Png)?;

    tracing::info!("已转换 {} -> {}", png_path.display(), grey_path.display());
    Ok(())
}

/// 计算XY缩放系数，使图像最长边占硬币直径的 `fraction`
pub fn scale_factor(width: u32, height: u32, diameter: f64, fraction: f64) -> f64 {
    let longest = width.max(height).max(1);
    diameter * fraction / f64::from(longest)
}

/// 灰度图的最小/最大像素值
pub fn pixel_extrema(grey: &GrayImage) -> (u8, u8) {
    grey.pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), Luma([v])| (lo.min(*v), hi.max(*v)))
}

/// 读取灰度图后返回的基本信息
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GreyscaleInfo {
    pub width: u32,
    pub height: u32,
    pub min_pixel: u8,
    pub max_pixel: u8,
}

/// 读取灰度图的尺寸与像素范围
pub fn inspect_greyscale(path: &Path) -> Result<GreyscaleInfo> {
    let grey = image::open(path)?.to_luma8();
    let (min_pixel, max_pixel) = pixel_extrema(&grey);
    Ok(GreyscaleInfo {
        width: grey.width(),
        height: grey.height(),
        min_pixel,
        max_pixel,
    })
}
