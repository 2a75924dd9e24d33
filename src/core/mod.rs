//! Core模块 - 角色抓取与硬币模型生成

pub mod error;
pub mod models;
pub mod roles;
pub mod imaging;
pub mod scad;
pub mod coin;
pub mod tools;
pub mod pipeline;

#[cfg(test)]
mod pipeline_tests;
