//! 错误类型定义

use std::path::PathBuf;
use thiserror::Error;

/// 核心模块统一的 Result 别名
pub type Result<T> = std::result::Result<T, CoinError>;

/// 生成流程中可能出现的错误
#[derive(Error, Debug)]
pub enum CoinError {
    /// 页面或图片请求返回了非 200 状态
    #[error("请求 {url} 失败，状态码 {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("网络请求失败: {0}")]
    Request(#[from] reqwest::Error),

    #[error("无效的URL {url}: {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error("图像处理失败: {0}")]
    Image(#[from] image::ImageError),

    /// 下载内容不是PNG
    #[error("{url} 返回的内容不是PNG图片")]
    NotPng { url: String },

    #[error("CSS选择器无效: {0}")]
    Selector(String),

    #[error("字体加载失败 {path}: {reason}")]
    Font { path: PathBuf, reason: String },

    #[error("overlay 样式需要配置字体 (font_path)")]
    FontNotConfigured,

    /// 外部程序以非零状态退出
    #[error("外部程序 {program} 执行失败 ({status}): {stderr}")]
    ToolFailed {
        program: String,
        status: String,
        stderr: String,
    },

    /// 硬币尺寸无法容纳所需几何
    #[error("硬币尺寸无效: {0}")]
    InvalidDimensions(String),

    #[error("路径没有文件名: {0}")]
    MissingFileName(PathBuf),
}
