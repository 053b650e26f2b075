// 该文件是 Shanan （山南西风） 项目的一部分。
// src/error.rs - 检测流水线错误定义
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::collections::TryReserveError;
use std::time::Duration;

use thiserror::Error;

/// 一次检测运行中的致命错误。
///
/// 退化框（宽或高不为正）不在此列：它们被跳过并计入
/// [`DetectionSet::degenerate_skipped`](crate::model::DetectionSet)。
#[derive(Error, Debug)]
pub enum DetectError {
  #[error("模型输出格式错误: {0}")]
  MalformedOutput(String),
  #[error("内存分配失败: {0}")]
  Allocation(#[from] TryReserveError),
  #[error("图像无效: {0}")]
  InvalidImage(String),
  #[error("模型描述无效: {0}")]
  InvalidSpec(String),
  #[error("配置无效: {0}")]
  InvalidConfig(String),
  #[error("超出截止时间, 已耗时 {elapsed:.2?}")]
  DeadlineExceeded { elapsed: Duration },
  #[error("推理后端错误: {0}")]
  Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl DetectError {
  pub fn malformed(msg: impl Into<String>) -> Self {
    DetectError::MalformedOutput(msg.into())
  }

  pub fn backend<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    DetectError::Backend(Box::new(err))
  }

  /// 输出内容有问题（而非资源问题）
  pub fn is_malformed_output(&self) -> bool {
    matches!(self, DetectError::MalformedOutput(_))
  }

  pub fn is_allocation(&self) -> bool {
    matches!(self, DetectError::Allocation(_))
  }
}
