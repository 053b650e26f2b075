// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 模型
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

use serde::Serialize;

use crate::{
  config::CoordinateMode, error::DetectError, frame::ImageView,
  postprocess::mapper::to_normalized_center_size,
};

/// 推理后端：给定固定尺寸的输入，产出固定布局的输出张量。
///
/// 后端内部通常持有不可重入的缓冲区，并发调用需要各自独立的实例。
pub trait Model {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 构建时已知的输出布局
  fn spec(&self) -> &ModelSpec;

  fn infer(&self, input: &ImageView<'_>) -> Result<RawOutput, Self::Error>;
}

/// 推理后端的原始输出，按输出索引排列的 f32 张量
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawOutput {
  tensors: Vec<Box<[f32]>>,
}

impl RawOutput {
  pub fn new(tensors: Vec<Vec<f32>>) -> Self {
    Self {
      tensors: tensors.into_iter().map(Vec::into_boxed_slice).collect(),
    }
  }

  pub fn num_outputs(&self) -> usize {
    self.tensors.len()
  }

  pub fn get_f32(&self, index: usize) -> Result<&[f32], DetectError> {
    self.tensors.get(index).map(|t| &t[..]).ok_or_else(|| {
      DetectError::malformed(format!(
        "缺少第 {} 个输出, 实际输出数量 {}",
        index,
        self.tensors.len()
      ))
    })
  }

  pub fn iter(&self) -> impl Iterator<Item = &[f32]> {
    self.tensors.iter().map(|t| &t[..])
  }
}

/// 单个检测结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
  /// 外部标签表中的类别索引
  pub category: u32,
  pub score: f32,
  /// 坐标含义由 [`DetectionSet::mode`] 决定，角点模式下为 [x1, y1, x2, y2]
  #[serde(rename = "box")]
  pub bbox: [f32; 4],
}

/// 一次运行的最终结果，按分数降序排列
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionSet {
  pub items: Box<[Detection]>,
  /// 源图像尺寸 (宽, 高)
  pub image_size: (u32, u32),
  pub mode: CoordinateMode,
  /// 因宽高不为正而跳过的候选数量
  pub degenerate_skipped: usize,
}

impl DetectionSet {
  pub fn empty(image_size: (u32, u32), mode: CoordinateMode) -> Self {
    Self {
      items: Box::new([]),
      image_size,
      mode,
      degenerate_skipped: 0,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
    self.items.iter()
  }

  /// 常见标注工具使用的 `类别 中心x 中心y 宽 高` 行，四个值均归一化到 [0, 1]
  pub fn annotation_lines(&self) -> Vec<String> {
    self
      .items
      .iter()
      .map(|item| {
        let [cx, cy, w, h] = to_normalized_center_size(&item.bbox, self.mode, self.image_size);
        format!("{} {:.6} {:.6} {:.6} {:.6}", item.category, cx, cy, w, h)
      })
      .collect()
  }
}

impl<'a> IntoIterator for &'a DetectionSet {
  type Item = &'a Detection;
  type IntoIter = std::slice::Iter<'a, Detection>;

  fn into_iter(self) -> Self::IntoIter {
    self.items.iter()
  }
}

mod spec;
pub use self::spec::{
  Activation, BoxFormat, GridEncoding, GridHead, ModelSpec, OutputLayout, ScoreConvention,
  TensorOrder,
};

pub mod tensor_file;
pub mod yolo;

pub use self::tensor_file::{TensorFileError, TensorFileModel, TensorFileModelBuilder};
