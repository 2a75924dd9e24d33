//! 角色清单抓取模块
//!
//! 从 Blood on the Clocktower wiki 的剧本页面抓取角色名与缩略图，
//! 根据所在章节推断角色颜色，最终写出 `roles.json`。

use crate::core::error::{CoinError, Result};
use crate::core::models::{AppConfig, RoleCatalog, RoleColor, RoleEntry};
use reqwest::StatusCode;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::path::Path;
use url::Url;

/// 每个角色所在的容器
const ROLE_CONTAINER: &str = "div.small-6.medium-6.large-2.columns";

/// 根据角色分类返回颜色
///
/// 分类名必须完全匹配，未知或缺失的分类返回 [`RoleColor::Unknown`]。
pub fn category_color(category: Option<&str>) -> RoleColor {
    match category {
        Some("Townsfolk") | Some("Outsiders") => RoleColor::Blue,
        Some("Minions") | Some("Demons") => RoleColor::Red,
        Some("Travellers") | Some("Travelers") => RoleColor::Purple,
        Some("Fabled") => RoleColor::Yellow,
        Some("Loric") => RoleColor::Green,
        _ => RoleColor::Unknown,
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| CoinError::Selector(format!("{}: {:?}", css, e)))
}

/// 去掉每段文本首尾空白后拼接
fn stripped_text(element: ElementRef<'_>) -> String {
    element.text().map(str::trim).collect()
}

/// 章节标题文本；MediaWiki 的标题带有编辑链接，优先取 `mw-headline`
fn heading_text(heading: ElementRef<'_>, headline: &Selector) -> String {
    heading
        .select(headline)
        .next()
        .map(stripped_text)
        .unwrap_or_else(|| stripped_text(heading))
}

/// 解析单个剧本页面
///
/// `forced_color` 不为空时覆盖章节推断的颜色（旅行者页面）。
pub fn parse_role_page(
    html: &str,
    base: &Url,
    forced_color: Option<RoleColor>,
) -> Result<Vec<(String, RoleEntry)>> {
    let document = Html::parse_document(html);
    // 标题与容器按文档顺序交替出现，最近的 h2 即为容器所属分类
    let walk = selector(&format!("h2, {}", ROLE_CONTAINER))?;
    let name_selector = selector("span[data-role]")?;
    let image_selector = selector("img.thumbimage")?;
    let headline_selector = selector("span.mw-headline")?;

    let mut category: Option<String> = None;
    let mut roles = Vec::new();

    for element in document.select(&walk) {
        if element.value().name() == "h2" {
            category = Some(heading_text(element, &headline_selector));
            continue;
        }

        let name = match element.select(&name_selector).next() {
            Some(span) => stripped_text(span),
            None => continue,
        };
        let src = match element
            .select(&image_selector)
            .next()
            .and_then(|img| img.value().attr("src"))
        {
            Some(src) => src,
            None => continue,
        };

        let image = base.join(src).map_err(|source| CoinError::Url {
            url: src.to_string(),
            source,
        })?;
        let color = forced_color.unwrap_or_else(|| category_color(category.as_deref()));

        roles.push((
            name,
            RoleEntry {
                image: image.to_string(),
                color,
            },
        ));
    }

    Ok(roles)
}

/// 角色清单抓取器
pub struct RoleFetcher {
    client: reqwest::Client,
    base: Url,
    edition_pages: Vec<String>,
    travellers_page: String,
}

impl RoleFetcher {
    /// 根据配置创建抓取器
    pub fn new(config: &AppConfig) -> Result<Self> {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// 使用指定的HTTP客户端创建抓取器
    pub fn with_client(client: reqwest::Client, config: &AppConfig) -> Result<Self> {
        let base = Url::parse(&config.wiki_base_url).map_err(|source| CoinError::Url {
            url: config.wiki_base_url.clone(),
            source,
        })?;

        Ok(Self {
            client,
            base,
            edition_pages: config.edition_pages.clone(),
            travellers_page: config.travellers_page.clone(),
        })
    }

    fn page_url(&self, page: &str) -> Result<Url> {
        self.base.join(page).map_err(|source| CoinError::Url {
            url: page.to_string(),
            source,
        })
    }

    /// 获取页面HTML，非200状态视为失败
    async fn fetch_page(&self, page: &str) -> Result<String> {
        let url = self.page_url(page)?;
        tracing::debug!("抓取页面: {}", url);

        let response = self.client.get(url.clone()).send().await?;
        if response.status() != StatusCode::OK {
            return Err(CoinError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response.text().await?)
    }

    /// 抓取所有剧本页面与旅行者页面，合并为角色清单
    pub async fn fetch_all(&self) -> Result<RoleCatalog> {
        let mut catalog = RoleCatalog::new();

        for page in &self.edition_pages {
            let html = self.fetch_page(page).await?;
            let roles = parse_role_page(&html, &self.base, None)?;
            tracing::info!("页面 {} 解析出 {} 个角色", page, roles.len());
            catalog.extend(roles);
        }

        let html = self.fetch_page(&self.travellers_page).await?;
        let travellers = parse_role_page(&html, &self.base, Some(RoleColor::Purple))?;
        tracing::info!("旅行者页面解析出 {} 个角色", travellers.len());
        catalog.extend(travellers);

        for (role, entry) in &catalog {
            tracing::info!("角色: {}, 图片: {}, 颜色: {}", role, entry.image, entry.color);
        }

        Ok(catalog)
    }
}

/// 把非ASCII字符转义为 `\uXXXX`，BMP以外的字符写成UTF-16代理对
fn escape_non_ascii(json: &str) -> String {
    let mut escaped = String::with_capacity(json.len());
    let mut units = [0u16; 2];
    for c in json.chars() {
        if c.is_ascii() {
            escaped.push(c);
        } else {
            for unit in c.encode_utf16(&mut units) {
                escaped.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    escaped
}

/// 以4空格缩进写出角色清单，非ASCII字符转义后输出
pub fn write_catalog(catalog: &RoleCatalog, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    catalog.serialize(&mut serializer)?;

    let json = String::from_utf8_lossy(&buffer);
    std::fs::write(path, escape_non_ascii(&json))?;
    tracing::info!("已写出 {} 个角色到 {}", catalog.len(), path.display());
    Ok(())
}

/// 读取角色清单
pub fn load_catalog(path: &Path) -> Result<RoleCatalog> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
