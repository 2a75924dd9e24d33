use crate::core::coin::GlyphWidths;
use crate::core::error::CoinError;
use crate::core::models::{AppConfig, CoinStyle, OutputLayout, RoleCatalog, RoleColor, RoleEntry};
use crate::core::pipeline::CoinMaker;
use crate::core::roles::{write_catalog, RoleFetcher};
use crate::core::tools::testing::RecordingRunner;
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct MonoWidths;

impl GlyphWidths for MonoWidths {
    fn font_size(&self) -> f64 {
        12.0
    }

    fn glyph_width(&self, _c: char) -> f64 {
        8.0
    }
}

/// 左半透明、右半深色的缩略图，保证灰度有明暗变化
fn thumbnail_png() -> Vec<u8> {
    let image = RgbaImage::from_fn(20, 10, |x, _| {
        if x < 10 {
            Rgba([0, 0, 0, 0])
        } else {
            Rgba([40, 40, 40, 255])
        }
    });
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}

fn config_in(root: &Path, style: CoinStyle) -> AppConfig {
    AppConfig {
        layout: OutputLayout::default().rooted_at(root),
        style,
        ..Default::default()
    }
}

fn catalog_for(server: &MockServer, roles: &[(&str, &str, RoleColor)]) -> RoleCatalog {
    roles
        .iter()
        .map(|(name, image, color)| {
            (
                name.to_string(),
                RoleEntry {
                    image: format!("{}{}", server.uri(), image),
                    color: *color,
                },
            )
        })
        .collect()
}

async fn serve_png(server: &MockServer, at: &str, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(thumbnail_png())
                .insert_header("content-type", "image/png"),
        )
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn sim_relief_coins_are_generated_once_per_role() {
    let server = MockServer::start().await;
    // 第二次运行不应重新下载
    serve_png(&server, "/images/imp.png", 1).await;
    serve_png(&server, "/images/devils_advocate.png", 1).await;

    let dir = tempdir().unwrap();
    let config = config_in(dir.path(), CoinStyle::Relief);
    let catalog = catalog_for(
        &server,
        &[
            ("Imp", "/images/imp.png", RoleColor::Red),
            ("Devil's Advocate", "/images/devils_advocate.png", RoleColor::Red),
        ],
    );

    let maker = CoinMaker::new(&config, RecordingRunner::default()).unwrap();
    let report = maker.make_all(&catalog).await.unwrap();

    assert!(report.is_all_successful(), "{:?}", report.failures);
    assert_eq!(report.downloaded, 2);

    let layout = &config.layout;
    let imp_scad = layout.scad_dir.join("Imp_coin.scad");
    let advocate_scad = layout.scad_dir.join("Devils_Advocate_coin.scad");
    assert_eq!(report.generated, vec![imp_scad.clone(), advocate_scad.clone()]);

    assert!(layout.png_dir.join("Imp.png").exists());
    assert!(layout.grey_png_dir.join("Devils_Advocate.png").exists());
    // 灰度图被复制到SCAD目录，供 surface() 相对引用
    assert!(layout.scad_dir.join("Devils_Advocate.png").exists());

    let content = std::fs::read_to_string(&imp_scad).unwrap();
    assert!(content.contains("$fn=100;"));
    assert!(content.contains("difference() {"));
    assert!(content.contains("surface(center = true, file = \"Imp.png\");"));
    assert!(!content.contains("Advocate"));
    let advocate = std::fs::read_to_string(&advocate_scad).unwrap();
    assert!(advocate.contains("text = \"Devil's Advocate\""));

    let again = maker.make_all(&catalog).await.unwrap();
    assert_eq!(again.downloaded, 0);
    assert_eq!(again.generated.len(), 2);
}

#[tokio::test]
async fn sim_failed_role_does_not_stop_batch() {
    let server = MockServer::start().await;
    serve_png(&server, "/images/chef.png", 1).await;
    Mock::given(method("GET"))
        .and(path("/images/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempdir().unwrap();
    let config = config_in(dir.path(), CoinStyle::Relief);
    let catalog = catalog_for(
        &server,
        &[
            ("Missing", "/images/missing.png", RoleColor::Blue),
            ("Chef", "/images/chef.png", RoleColor::Blue),
        ],
    );

    let runner = RecordingRunner::default();
    let maker = CoinMaker::new(&config, runner).unwrap().export_stl(true);
    let report = maker.make_all(&catalog).await.unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "Missing");
    assert_eq!(report.generated.len(), 1);
    assert_eq!(
        report.exported,
        vec![config.layout.stl_dir.join("Chef_coin.stl")]
    );
}

#[tokio::test]
async fn sim_overlay_style_writes_felt_and_overlay() {
    let server = MockServer::start().await;
    serve_png(&server, "/images/thief.png", 1).await;

    let dir = tempdir().unwrap();
    let config = config_in(dir.path(), CoinStyle::Overlay);
    let catalog = catalog_for(&server, &[("Thief", "/images/thief.png", RoleColor::Purple)]);

    // potrace 被替换为记录型执行器，预先放置它本应产出的SVG
    std::fs::create_dir_all(&config.layout.svg_dir).unwrap();
    std::fs::write(config.layout.svg_dir.join("Thief.svg"), "<svg/>").unwrap();

    let maker = CoinMaker::new(&config, RecordingRunner::default())
        .unwrap()
        .with_metrics(Box::new(MonoWidths));
    let report = maker.make_all(&catalog).await.unwrap();

    assert!(report.is_all_successful(), "{:?}", report.failures);
    let felt = config.layout.scad_dir.join("Thief_felt.scad");
    let overlay = config.layout.scad_dir.join("Thief_overlay.scad");
    assert_eq!(report.generated, vec![felt.clone(), overlay.clone()]);

    assert!(std::fs::read_to_string(&felt)
        .unwrap()
        .contains("cylinder(d = 50, h = 1);"));
    let overlay_content = std::fs::read_to_string(&overlay).unwrap();
    assert!(overlay_content.contains("color(c = \"purple\") {"));
    assert!(overlay_content.contains("import(center = true, file = \"Thief.svg\");"));
    assert!(overlay_content.contains("text = \"H\""));
}

#[tokio::test]
async fn sim_overlay_without_font_is_rejected() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path(), CoinStyle::Overlay);

    let maker = CoinMaker::new(&config, RecordingRunner::default()).unwrap();
    let err = maker.make_all(&RoleCatalog::new()).await.unwrap_err();
    assert!(matches!(err, CoinError::FontNotConfigured));
}

#[tokio::test]
async fn sim_roles_file_feeds_coin_maker() {
    let server = MockServer::start().await;
    let page = r#"<h2>Demons</h2>
        <div class="small-6 medium-6 large-2 columns">
          <img class="thumbimage" src="/images/imp.png"><span data-role="imp">Imp</span>
        </div>"#;
    Mock::given(method("GET"))
        .and(path("/Trouble_Brewing"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/Travellers"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;
    serve_png(&server, "/images/imp.png", 1).await;

    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path(), CoinStyle::Relief);
    config.wiki_base_url = format!("{}/", server.uri());
    config.edition_pages = vec!["Trouble_Brewing".to_string()];

    let catalog = RoleFetcher::new(&config).unwrap().fetch_all().await.unwrap();
    write_catalog(&catalog, &config.layout.roles_file).unwrap();

    let maker = CoinMaker::new(&config, RecordingRunner::default()).unwrap();
    let report = maker.make_from_file(&config.layout.roles_file).await.unwrap();

    assert_eq!(
        report.generated,
        vec![config.layout.scad_dir.join("Imp_coin.scad")]
    );
}
