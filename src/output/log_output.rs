// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/log_output.rs - 日志输出
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

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  labels::display_label,
  model::{Detection, DetectionSet},
  output::Render,
};

#[derive(Error, Debug)]
pub enum LogOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
}

/// 把检测结果逐条写入 tracing 日志
pub struct LogOutput {
  label_with_name: bool,
}

impl FromUrlWithScheme for LogOutput {
  const SCHEME: &'static str = "log";
}

impl FromUrl for LogOutput {
  type Error = LogOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(LogOutputError::SchemeMismatch);
    }

    let label_with_name = url.query_pairs().any(|(k, _)| k == "labels");
    Ok(LogOutput { label_with_name })
  }
}

impl LogOutput {
  pub fn new(label_with_name: bool) -> Self {
    Self { label_with_name }
  }

  fn format_item(&self, item: &Detection) -> String {
    format!(
      "[{}, {:.4}, {:.2}, {:.2}, {:.2}, {:.2}]",
      display_label(item.category, self.label_with_name),
      item.score,
      item.bbox[0],
      item.bbox[1],
      item.bbox[2],
      item.bbox[3]
    )
  }
}

impl Render<RgbFrame, DetectionSet> for LogOutput {
  type Error = LogOutputError;

  fn render_result(&self, _frame: &RgbFrame, result: &DetectionSet) -> Result<(), Self::Error> {
    info!(
      "检测到 {} 个物体 ({}x{}, {:?})",
      result.len(),
      result.image_size.0,
      result.image_size.1,
      result.mode
    );
    for item in result {
      info!("{}", self.format_item(item));
    }
    for line in result.annotation_lines() {
      info!("{}", line);
    }
    Ok(())
  }
}
