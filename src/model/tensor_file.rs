// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/tensor_file.rs - 回放已记录输出张量的推理后端
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

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  error::DetectError,
  frame::ImageView,
  model::{Model, ModelSpec, RawOutput, yolo},
};

const DEFAULT_PRESET: &str = "yolo26";

#[derive(Error, Debug)]
pub enum TensorFileError {
  #[error("张量文件读取错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("张量文件解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("未知的模型预设: {0}")]
  UnknownPreset(String),
  #[error("查询参数无效: {0}")]
  InvalidQuery(String),
  #[error("模型无效: {0}")]
  InvalidModel(#[from] DetectError),
}

/// 张量文件内容：可选的模型描述与按输出索引排列的张量
#[derive(Debug, Deserialize)]
struct TensorFile {
  #[serde(default)]
  spec: Option<ModelSpec>,
  tensors: Vec<Vec<f32>>,
}

/// 对任何输入都返回同一组已记录张量的后端，
/// 用于离线复现设备上的推理结果。
#[derive(Debug, Clone)]
pub struct TensorFileModel {
  spec: ModelSpec,
  output: RawOutput,
}

impl TensorFileModel {
  /// 直接由内存中的张量构建
  pub fn from_tensors(spec: ModelSpec, output: RawOutput) -> Result<Self, DetectError> {
    spec.validate()?;
    Ok(Self { spec, output })
  }
}

impl Model for TensorFileModel {
  type Error = std::convert::Infallible;

  fn spec(&self) -> &ModelSpec {
    &self.spec
  }

  fn infer(&self, input: &ImageView<'_>) -> Result<RawOutput, Self::Error> {
    debug!(
      "回放张量, 输入图像 {}x{}, 输出数量 {}",
      input.width(),
      input.height(),
      self.output.num_outputs()
    );
    Ok(self.output.clone())
  }
}

pub struct TensorFileModelBuilder {
  path: String,
  preset: Option<String>,
  num_classes: Option<usize>,
}

impl FromUrlWithScheme for TensorFileModelBuilder {
  const SCHEME: &'static str = "tensor";
}

impl FromUrl for TensorFileModelBuilder {
  type Error = TensorFileError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(TensorFileError::SchemeMismatch(format!(
        "模型路径必须使用 {} 方案, 实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let mut builder = TensorFileModelBuilder {
      path: url.path().to_string(),
      preset: None,
      num_classes: None,
    };

    for (k, v) in url.query_pairs() {
      match k.as_ref() {
        "preset" => builder.preset = Some(v.into_owned()),
        "classes" => {
          let classes = v
            .parse()
            .map_err(|_| TensorFileError::InvalidQuery(format!("classes={}", v)))?;
          builder.num_classes = Some(classes);
        }
        _ => debug!("忽略未知查询参数: {}={}", k, v),
      }
    }

    Ok(builder)
  }
}

impl TensorFileModelBuilder {
  pub fn new(path: impl Into<String>) -> Self {
    Self {
      path: path.into(),
      preset: None,
      num_classes: None,
    }
  }

  pub fn preset(mut self, preset: impl Into<String>) -> Self {
    self.preset = Some(preset.into());
    self
  }

  pub fn num_classes(mut self, num_classes: usize) -> Self {
    self.num_classes = Some(num_classes);
    self
  }

  pub fn build(self) -> Result<TensorFileModel, TensorFileError> {
    info!("加载张量文件: {}", self.path);
    let data = std::fs::read(&self.path)?;
    debug!(
      "张量文件大小: {:.2} MB",
      data.len() as f64 / (1024.0 * 1024.0)
    );

    let file: TensorFile = serde_json::from_slice(&data)?;

    // 文件内的描述优先，查询参数中的预设作为后备
    let spec = match (file.spec, self.preset) {
      (Some(spec), _) => spec,
      (None, preset) => {
        let name = preset.as_deref().unwrap_or(DEFAULT_PRESET);
        yolo::preset(name, self.num_classes).ok_or_else(|| {
          error!("未知的模型预设: {}", name);
          TensorFileError::UnknownPreset(name.to_string())
        })?
      }
    };

    debug!("模型输出数量: {}", file.tensors.len());
    let model = TensorFileModel::from_tensors(spec, RawOutput::new(file.tensors))?;
    info!("张量文件加载完成");
    Ok(model)
  }
}
