//! OpenSCAD 几何树与渲染
//!
//! 用类型化的节点描述模型，再渲染为 `.scad` 源码。
//! `a - b` 生成 `difference()`，`a + b` 生成 `union()`，连续运算会被展平。

use crate::core::error::Result;
use chrono::Utc;
use std::fmt::Write as _;
use std::ops::{Add, Sub};
use std::path::Path;

/// 作用于单个子节点的变换
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    Translate([f64; 3]),
    Scale([f64; 3]),
    Rotate([f64; 3]),
    /// 调整到目标尺寸，`auto` 时按比例填补为0的轴
    Resize { size: [f64; 3], auto: bool },
    LinearExtrude { height: f64 },
    Color(String),
}

/// 布尔运算
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    Union,
    Difference,
}

/// SCAD 几何节点
#[derive(Debug, Clone, PartialEq)]
pub enum ScadNode {
    Cylinder {
        d: f64,
        h: f64,
    },
    /// 由高度图（灰度PNG）生成的曲面
    Surface {
        file: String,
        center: bool,
    },
    /// 水平、垂直均居中的文字
    Text {
        text: String,
        size: f64,
    },
    /// 导入外部文件（SVG/STL）
    Import {
        file: String,
        center: bool,
    },
    Transform {
        op: Transform,
        child: Box<ScadNode>,
    },
    Boolean {
        op: BooleanOp,
        children: Vec<ScadNode>,
    },
}

pub fn cylinder(d: f64, h: f64) -> ScadNode {
    ScadNode::Cylinder { d, h }
}

pub fn surface(file: impl Into<String>, center: bool) -> ScadNode {
    ScadNode::Surface {
        file: file.into(),
        center,
    }
}

/// 居中对齐的文字
pub fn text(content: impl Into<String>, size: f64) -> ScadNode {
    ScadNode::Text {
        text: content.into(),
        size,
    }
}

pub fn import(file: impl Into<String>, center: bool) -> ScadNode {
    ScadNode::Import {
        file: file.into(),
        center,
    }
}

pub fn union(children: Vec<ScadNode>) -> ScadNode {
    ScadNode::Boolean {
        op: BooleanOp::Union,
        children,
    }
}

impl ScadNode {
    fn transformed(self, op: Transform) -> ScadNode {
        ScadNode::Transform {
            op,
            child: Box::new(self),
        }
    }

    pub fn translate(self, v: [f64; 3]) -> ScadNode {
        self.transformed(Transform::Translate(v))
    }

    pub fn scale(self, v: [f64; 3]) -> ScadNode {
        self.transformed(Transform::Scale(v))
    }

    pub fn rotate(self, v: [f64; 3]) -> ScadNode {
        self.transformed(Transform::Rotate(v))
    }

    pub fn resize(self, size: [f64; 3], auto: bool) -> ScadNode {
        self.transformed(Transform::Resize { size, auto })
    }

    pub fn linear_extrude(self, height: f64) -> ScadNode {
        self.transformed(Transform::LinearExtrude { height })
    }

    pub fn color(self, name: impl Into<String>) -> ScadNode {
        self.transformed(Transform::Color(name.into()))
    }

    /// 节点的 OpenSCAD 名称
    pub fn kind(&self) -> &'static str {
        match self {
            ScadNode::Cylinder { .. } => "cylinder",
            ScadNode::Surface { .. } => "surface",
            ScadNode::Text { .. } => "text",
            ScadNode::Import { .. } => "import",
            ScadNode::Transform { op, .. } => match op {
                Transform::Translate(_) => "translate",
                Transform::Scale(_) => "scale",
                Transform::Rotate(_) => "rotate",
                Transform::Resize { .. } => "resize",
                Transform::LinearExtrude { .. } => "linear_extrude",
                Transform::Color(_) => "color",
            },
            ScadNode::Boolean { op, .. } => match op {
                BooleanOp::Union => "union",
                BooleanOp::Difference => "difference",
            },
        }
    }

    /// 子节点（叶子节点返回空）
    #[cfg(test)]
    pub fn children(&self) -> &[ScadNode] {
        match self {
            ScadNode::Transform { child, .. } => std::slice::from_ref(child.as_ref()),
            ScadNode::Boolean { children, .. } => children,
            _ => &[],
        }
    }

    /// 渲染为 OpenSCAD 源码
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        let indent = "\t".repeat(depth);
        let args = self.arguments();

        match self {
            ScadNode::Transform { child, .. } => {
                let _ = writeln!(out, "{}{}({}) {{", indent, self.kind(), args);
                child.render_into(out, depth + 1);
                let _ = writeln!(out, "{}}}", indent);
            }
            ScadNode::Boolean { children, .. } => {
                let _ = writeln!(out, "{}{}() {{", indent, self.kind());
                for child in children {
                    child.render_into(out, depth + 1);
                }
                let _ = writeln!(out, "{}}}", indent);
            }
            _ => {
                let _ = writeln!(out, "{}{}({});", indent, self.kind(), args);
            }
        }
    }

    fn arguments(&self) -> String {
        let args: Vec<String> = match self {
            ScadNode::Cylinder { d, h } => vec![
                format!("d = {}", number(*d)),
                format!("h = {}", number(*h)),
            ],
            ScadNode::Surface { file, center } | ScadNode::Import { file, center } => vec![
                format!("center = {}", center),
                format!("file = {}", quoted(file)),
            ],
            ScadNode::Text { text, size } => vec![
                "halign = \"center\"".to_string(),
                format!("size = {}", number(*size)),
                format!("text = {}", quoted(text)),
                "valign = \"center\"".to_string(),
            ],
            ScadNode::Transform { op, .. } => match op {
                Transform::Translate(v) | Transform::Scale(v) | Transform::Rotate(v) => {
                    vec![format!("v = {}", vector(v))]
                }
                Transform::Resize { size, auto } => vec![
                    format!("auto = {}", auto),
                    format!("newsize = {}", vector(size)),
                ],
                Transform::LinearExtrude { height } => {
                    vec![format!("height = {}", number(*height))]
                }
                Transform::Color(name) => vec![format!("c = {}", quoted(name))],
            },
            ScadNode::Boolean { .. } => Vec::new(),
        };
        args.join(", ")
    }
}

/// 整数值不带小数点
fn number(value: f64) -> String {
    if value == 0.0 {
        // 避免输出 -0
        return "0".to_string();
    }
    format!("{}", value)
}

fn vector(v: &[f64; 3]) -> String {
    format!("[{}, {}, {}]", number(v[0]), number(v[1]), number(v[2]))
}

fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn combine(op: BooleanOp, lhs: ScadNode, rhs: ScadNode) -> ScadNode {
    match lhs {
        ScadNode::Boolean {
            op: lhs_op,
            mut children,
        } if lhs_op == op => {
            children.push(rhs);
            ScadNode::Boolean { op, children }
        }
        lhs => ScadNode::Boolean {
            op,
            children: vec![lhs, rhs],
        },
    }
}

impl Sub for ScadNode {
    type Output = ScadNode;

    fn sub(self, rhs: ScadNode) -> ScadNode {
        combine(BooleanOp::Difference, self, rhs)
    }
}

impl Add for ScadNode {
    type Output = ScadNode;

    fn add(self, rhs: ScadNode) -> ScadNode {
        combine(BooleanOp::Union, self, rhs)
    }
}

/// 渲染模型并写入文件
///
/// 文件结构：生成信息注释、`header`（通常为 `$fn=100;`）、空行、模型主体。
pub fn render_to_file(node: &ScadNode, path: &Path, header: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = format!(
        "// Generated by {} {} on {}\n{}\n\n{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        Utc::now().format("%Y-%m-%d %H:%M:%S"),
        header,
        node.render()
    );
    std::fs::write(path, content)?;
    Ok(())
}
