// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/json_file.rs - JSON 文件输出
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

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  config::CoordinateMode,
  frame::RgbFrame,
  model::{Detection, DetectionSet},
  output::Render,
};

#[derive(Error, Debug)]
pub enum JsonFileOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct Report<'a> {
  image_width: u32,
  image_height: u32,
  mode: CoordinateMode,
  detections: &'a [Detection],
}

/// 每次渲染覆盖写入同一个 JSON 文件
pub struct JsonFileOutput {
  path: PathBuf,
}

impl FromUrlWithScheme for JsonFileOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonFileOutput {
  type Error = JsonFileOutputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(JsonFileOutputError::SchemeMismatch);
    }

    Ok(JsonFileOutput {
      path: PathBuf::from(url.path()),
    })
  }
}

impl Render<RgbFrame, DetectionSet> for JsonFileOutput {
  type Error = JsonFileOutputError;

  fn render_result(&self, _frame: &RgbFrame, result: &DetectionSet) -> Result<(), Self::Error> {
    let report = Report {
      image_width: result.image_size.0,
      image_height: result.image_size.1,
      mode: result.mode,
      detections: &result.items,
    };
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&self.path, json)?;
    debug!("写入 {} 条检测结果到 {}", result.len(), self.path.display());
    Ok(())
  }
}
