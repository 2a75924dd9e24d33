//! 外部程序调用模块
//!
//! 位图矢量化依赖 ImageMagick `convert` 与 `potrace`，STL导出依赖 `openscad`。
//! 调用通过 [`CommandRunner`] 进行，测试中可替换为记录型实现。

use crate::core::error::{CoinError, Result};
use crate::core::models::ToolPaths;
use std::path::Path;
use std::process::Command;

/// 外部程序执行结果
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub success: bool,
    /// 退出状态描述
    pub status: String,
    pub stdout: String,
    pub stderr: String,
}

/// 外部程序执行器
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<ToolOutput>;
}

/// 直接启动子进程的执行器
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<ToolOutput> {
        tracing::debug!("执行: {} {}", program, args.join(" "));
        let output = Command::new(program).args(args).output()?;

        Ok(ToolOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// 执行并把非零退出转换为错误
fn run_checked(
    runner: &impl CommandRunner,
    program: &str,
    args: Vec<String>,
) -> Result<ToolOutput> {
    let output = runner.run(program, &args)?;
    if !output.stdout.trim().is_empty() {
        tracing::debug!("{} 输出: {}", program, output.stdout.trim());
    }
    if !output.success {
        return Err(CoinError::ToolFailed {
            program: program.to_string(),
            status: output.status,
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output)
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// 把PNG矢量化为SVG
///
/// 先用 `convert` 生成与SVG同名的 `.pbm` 位图，再交给 `potrace` 描边。
pub fn convert_to_svg_with_potrace(
    runner: &impl CommandRunner,
    tools: &ToolPaths,
    png: &Path,
    svg: &Path,
) -> Result<()> {
    if let Some(parent) = svg.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let bitmap = svg.with_extension("pbm");

    let convert_args = vec![path_arg(png), path_arg(&bitmap)];
    run_checked(runner, &tools.convert, convert_args)?;

    let potrace_args = vec![
        path_arg(&bitmap),
        "-s".to_string(),
        "-o".to_string(),
        path_arg(svg),
    ];
    run_checked(runner, &tools.potrace, potrace_args)?;

    tracing::info!("已矢量化 {} -> {}", png.display(), svg.display());
    Ok(())
}

/// 用 OpenSCAD 把SCAD文件导出为STL
pub fn export_coin_to_stl(
    runner: &impl CommandRunner,
    tools: &ToolPaths,
    name: &str,
    scad: &Path,
    stl: &Path,
) -> Result<()> {
    if let Some(parent) = stl.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let args = vec!["-o".to_string(), path_arg(stl), path_arg(scad)];
    run_checked(runner, &tools.openscad, args)?;

    tracing::info!("已导出 {} 的STL: {}", name, stl.display());
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingRunner;
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    #[test]
    fn test_convert_to_svg_with_potrace() {
        let dir = tempdir().unwrap();
        let png = dir.path().join("test_image.png");
        let svg = dir.path().join("svgs").join("test_output.svg");
        let runner = RecordingRunner::default();

        convert_to_svg_with_potrace(&runner, &ToolPaths::default(), &png, &svg).unwrap();

        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 2);

        let bitmap = path_arg(&svg.with_extension("pbm"));
        assert_eq!(calls[0].0, "convert");
        assert_eq!(calls[0].1, vec![path_arg(&png), bitmap.clone()]);
        assert_eq!(calls[1].0, "potrace");
        assert_eq!(
            calls[1].1,
            vec![bitmap, "-s".to_string(), "-o".to_string(), path_arg(&svg)]
        );
    }

    #[test]
    fn test_potrace_not_run_after_convert_failure() {
        let dir = tempdir().unwrap();
        let runner = RecordingRunner::failing("convert");

        let err = convert_to_svg_with_potrace(
            &runner,
            &ToolPaths::default(),
            &dir.path().join("a.png"),
            &dir.path().join("a.svg"),
        )
        .unwrap_err();

        assert_eq!(runner.calls.borrow().len(), 1);
        match err {
            CoinError::ToolFailed {
                program, stderr, ..
            } => {
                assert_eq!(program, "convert");
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_export_coin_to_stl() {
        let runner = RecordingRunner::default();
        export_coin_to_stl(
            &runner,
            &ToolPaths::default(),
            "test_model",
            &PathBuf::from("test.scad"),
            &PathBuf::from("test.stl"),
        )
        .unwrap();

        let calls = runner.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "openscad");
        assert_eq!(calls[0].1, vec!["-o", "test.stl", "test.scad"]);
    }

    #[test]
    fn test_custom_tool_paths() {
        let runner = RecordingRunner::default();
        let tools = ToolPaths {
            openscad: "/opt/openscad/bin/openscad".to_string(),
            ..Default::default()
        };
        export_coin_to_stl(
            &runner,
            &tools,
            "x",
            &PathBuf::from("x.scad"),
            &PathBuf::from("x.stl"),
        )
        .unwrap();
        assert_eq!(runner.calls.borrow()[0].0, "/opt/openscad/bin/openscad");
    }
}
