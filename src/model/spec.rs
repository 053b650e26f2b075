// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/spec.rs - 模型输出布局描述
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

use serde::{Deserialize, Serialize};

use crate::error::DetectError;

/// 模型的输入分辨率、类别数量与输出张量布局
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
  /// 模型输入分辨率 (宽, 高)
  pub input_size: (u32, u32),
  pub num_classes: usize,
  pub layout: OutputLayout,
  #[serde(default)]
  pub score: ScoreConvention,
  #[serde(default)]
  pub activation: Activation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputLayout {
  /// 单个张量，每个锚点一行 [box(4), objectness?, classes...]；
  /// `transposed` 时为 [通道, 锚点]
  Flat {
    num_anchors: usize,
    box_format: BoxFormat,
    #[serde(default)]
    objectness: bool,
    #[serde(default)]
    transposed: bool,
  },
  /// 多个检测头，每个头对应一个步长的特征网格
  Grid {
    heads: Vec<GridHead>,
    encoding: GridEncoding,
    #[serde(default)]
    objectness: bool,
    #[serde(default)]
    order: TensorOrder,
  },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridHead {
  pub height: usize,
  pub width: usize,
  pub stride: f32,
}

impl GridHead {
  pub fn new(height: usize, width: usize, stride: f32) -> Self {
    Self {
      height,
      width,
      stride,
    }
  }

  pub fn spatial(&self) -> usize {
    self.height.saturating_mul(self.width)
  }

  /// 网格单元数，溢出时为 `None`
  pub fn checked_spatial(&self) -> Option<usize> {
    self.height.checked_mul(self.width)
  }
}

/// 直接输出的框格式（模型输入像素单位）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxFormat {
  /// (cx, cy, w, h)
  CenterSize,
  /// (x1, y1, x2, y2)
  Corners,
}

/// 网格头的框参数化方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridEncoding {
  /// 到网格中心的距离 (l, t, r, b)，以步长为单位
  Distance,
  /// 网格内偏移 (dx, dy) 与相对输入尺寸的 (w, h)
  Offset,
}

/// 网格头张量的排列方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorOrder {
  /// 每个头分开输出 reg [4, HW]、obj [HW]（可选）、cls [C, HW]
  #[default]
  Planar,
  /// 每个头一个张量 [HW, 4 + obj + C]
  Interleaved,
}

/// 候选分数的计算约定，过滤与 NMS 使用同一个分数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreConvention {
  /// 最优类别概率
  #[default]
  ClassMax,
  /// objectness × 最优类别概率
  ObjectnessTimesClass,
  /// 仅使用 objectness 通道作为合成分数，类别通道只决定类别
  Objectness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
  /// 输出已经是概率
  #[default]
  Identity,
  /// 输出为 logit
  Sigmoid,
}

impl Activation {
  #[inline]
  pub fn apply(&self, x: f32) -> f32 {
    match self {
      Activation::Identity => x,
      Activation::Sigmoid => sigmoid(x),
    }
  }
}

#[inline]
fn sigmoid(x: f32) -> f32 {
  1.0 / (1.0 + (-x).exp())
}

impl OutputLayout {
  pub fn has_objectness(&self) -> bool {
    match self {
      OutputLayout::Flat { objectness, .. } | OutputLayout::Grid { objectness, .. } => *objectness,
    }
  }
}

impl ModelSpec {
  /// 每个锚点的通道数 4 + objectness + 类别
  pub fn channels(&self) -> usize {
    self.checked_channels().unwrap_or(usize::MAX)
  }

  pub fn checked_channels(&self) -> Option<usize> {
    self
      .num_classes
      .checked_add(4 + usize::from(self.layout.has_objectness()))
  }

  /// 所有检测头的锚点总数
  pub fn num_anchors(&self) -> usize {
    match &self.layout {
      OutputLayout::Flat { num_anchors, .. } => *num_anchors,
      OutputLayout::Grid { heads, .. } => heads
        .iter()
        .fold(0usize, |acc, head| acc.saturating_add(head.spatial())),
    }
  }

  /// 一个张量的元素个数 `anchors * channels`，溢出时返回 `InvalidSpec`
  pub fn tensor_len(&self, anchors: usize) -> Result<usize, DetectError> {
    self
      .checked_channels()
      .and_then(|channels| anchors.checked_mul(channels))
      .ok_or_else(|| {
        DetectError::InvalidSpec(format!(
          "张量大小溢出: {} 个锚点, {} 个类别",
          anchors, self.num_classes
        ))
      })
  }

  /// 推理后端应当产出的张量数量
  pub fn num_outputs(&self) -> usize {
    match &self.layout {
      OutputLayout::Flat { .. } => 1,
      OutputLayout::Grid {
        heads,
        objectness,
        order,
        ..
      } => match order {
        TensorOrder::Planar => heads.len() * if *objectness { 3 } else { 2 },
        TensorOrder::Interleaved => heads.len(),
      },
    }
  }

  pub fn validate(&self) -> Result<(), DetectError> {
    let (w, h) = self.input_size;
    if w == 0 || h == 0 {
      return Err(DetectError::InvalidSpec(format!(
        "模型输入尺寸不能为零: {}x{}",
        w, h
      )));
    }

    if self.num_classes == 0 {
      return Err(DetectError::InvalidSpec("类别数量不能为零".to_string()));
    }

    let needs_objectness = matches!(
      self.score,
      ScoreConvention::ObjectnessTimesClass | ScoreConvention::Objectness
    );
    if needs_objectness && !self.layout.has_objectness() {
      return Err(DetectError::InvalidSpec(format!(
        "分数约定 {:?} 需要 objectness 通道",
        self.score
      )));
    }

    match &self.layout {
      OutputLayout::Flat { num_anchors, .. } => {
        self.tensor_len(*num_anchors)?;
      }
      OutputLayout::Grid { heads, .. } => {
        if heads.is_empty() {
          return Err(DetectError::InvalidSpec("至少需要一个检测头".to_string()));
        }
        let mut total = 0usize;
        for (idx, head) in heads.iter().enumerate() {
          let spatial = head.checked_spatial().unwrap_or(0);
          if spatial == 0 || !(head.stride > 0.0) {
            return Err(DetectError::InvalidSpec(format!(
              "检测头 {} 无效: {}x{}, 步长 {}",
              idx, head.height, head.width, head.stride
            )));
          }
          self.tensor_len(spatial)?;
          total = total.checked_add(spatial).ok_or_else(|| {
            DetectError::InvalidSpec(format!("检测头 {} 处锚点总数溢出", idx))
          })?;
        }
      }
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn grid_spec(objectness: bool, score: ScoreConvention) -> ModelSpec {
    ModelSpec {
      input_size: (640, 640),
      num_classes: 80,
      layout: OutputLayout::Grid {
        heads: vec![
          GridHead::new(80, 80, 8.0),
          GridHead::new(40, 40, 16.0),
          GridHead::new(20, 20, 32.0),
        ],
        encoding: GridEncoding::Distance,
        objectness,
        order: TensorOrder::Planar,
      },
      score,
      activation: Activation::Sigmoid,
    }
  }

  #[test]
  fn test_sigmoid_activation() {
    assert!((Activation::Sigmoid.apply(0.0) - 0.5).abs() < 1e-6);
    assert!(Activation::Sigmoid.apply(10.0) > 0.99);
    assert!(Activation::Sigmoid.apply(-10.0) < 0.01);
    assert_eq!(Activation::Identity.apply(0.3), 0.3);
  }

  #[test]
  fn test_grid_counts() {
    let spec = grid_spec(false, ScoreConvention::ClassMax);
    assert_eq!(spec.num_anchors(), 8400);
    assert_eq!(spec.num_outputs(), 6);
    assert_eq!(spec.channels(), 84);

    let spec = grid_spec(true, ScoreConvention::ObjectnessTimesClass);
    assert_eq!(spec.num_outputs(), 9);
    assert_eq!(spec.channels(), 85);
  }

  #[test]
  fn test_objectness_convention_requires_channel() {
    let spec = grid_spec(false, ScoreConvention::ObjectnessTimesClass);
    assert!(matches!(spec.validate(), Err(DetectError::InvalidSpec(_))));

    let spec = grid_spec(true, ScoreConvention::Objectness);
    assert!(spec.validate().is_ok());
  }

  #[test]
  fn test_spec_json_defaults() {
    let json = r#"{
      "input_size": [640, 640],
      "num_classes": 80,
      "layout": { "kind": "flat", "num_anchors": 8400, "box_format": "center_size", "transposed": true }
    }"#;
    let spec: ModelSpec = serde_json::from_str(json).unwrap();
    assert_eq!(spec.score, ScoreConvention::ClassMax);
    assert_eq!(spec.activation, Activation::Identity);
    assert!(!spec.layout.has_objectness());
    assert_eq!(spec.num_outputs(), 1);
  }

  #[test]
  fn test_oversized_flat_spec_rejected() {
    let spec = ModelSpec {
      input_size: (640, 640),
      num_classes: 1,
      layout: OutputLayout::Flat {
        num_anchors: usize::MAX / 5 + 1,
        box_format: BoxFormat::CenterSize,
        objectness: false,
        transposed: false,
      },
      score: ScoreConvention::ClassMax,
      activation: Activation::Identity,
    };
    assert!(matches!(spec.validate(), Err(DetectError::InvalidSpec(_))));

    let spec = ModelSpec {
      num_classes: usize::MAX,
      ..grid_spec(false, ScoreConvention::ClassMax)
    };
    assert!(matches!(spec.validate(), Err(DetectError::InvalidSpec(_))));
  }

  #[test]
  fn test_oversized_grid_spec_rejected() {
    let mut spec = grid_spec(false, ScoreConvention::ClassMax);

    // 单元数本身溢出
    spec.layout = OutputLayout::Grid {
      heads: vec![GridHead::new(usize::MAX, 2, 8.0)],
      encoding: GridEncoding::Distance,
      objectness: false,
      order: TensorOrder::Planar,
    };
    assert!(matches!(spec.validate(), Err(DetectError::InvalidSpec(_))));

    // 单元数 × 通道数溢出
    spec.layout = OutputLayout::Grid {
      heads: vec![GridHead::new(usize::MAX / 64, 1, 8.0)],
      encoding: GridEncoding::Distance,
      objectness: false,
      order: TensorOrder::Interleaved,
    };
    assert!(matches!(spec.validate(), Err(DetectError::InvalidSpec(_))));

    // 各检测头锚点总数溢出
    spec.num_classes = 1;
    let half = usize::MAX / 8;
    spec.layout = OutputLayout::Grid {
      heads: vec![GridHead::new(half, 1, 8.0); 9],
      encoding: GridEncoding::Distance,
      objectness: false,
      order: TensorOrder::Planar,
    };
    assert!(matches!(spec.validate(), Err(DetectError::InvalidSpec(_))));
    assert_eq!(spec.num_anchors(), usize::MAX);
  }
}
