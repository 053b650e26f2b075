// 该文件是 Shanan （山南西风） 项目的一部分。
// src/config.rs - 检测流水线配置
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

use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::DetectError;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.45;

/// 输出坐标空间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CoordinateMode {
  /// 源图像像素角点 [x1, y1, x2, y2]
  #[default]
  PixelCorners,
  /// 归一化角点，范围 [0, 1]
  NormalizedCorners,
  /// 归一化 [cx, cy, w, h]
  NormalizedCenterSize,
}

/// 推理后端把源图像放入模型输入时所用的变换
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMode {
  /// 不缩放，模型空间即图像空间
  Native,
  /// 拉伸到模型输入尺寸，宽高各自缩放
  #[default]
  Stretch,
  /// 保持宽高比缩放并居中填充
  Letterbox,
}

/// 单次检测运行的配置
#[derive(Debug, Clone, PartialEq)]
pub struct DetectConfig {
  pub confidence_threshold: f32,
  pub iou_threshold: f32,
  pub coordinate_mode: CoordinateMode,
  pub resize: ResizeMode,
  /// 最终结果最多保留的数量（按分数降序截取）
  pub max_detections: Option<usize>,
  /// 从推理开始计时，在过滤与 NMS 之间检查
  pub deadline: Option<Duration>,
}

impl Default for DetectConfig {
  fn default() -> Self {
    Self {
      confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
      iou_threshold: DEFAULT_IOU_THRESHOLD,
      coordinate_mode: CoordinateMode::default(),
      resize: ResizeMode::default(),
      max_detections: None,
      deadline: None,
    }
  }
}

impl DetectConfig {
  pub fn confidence_threshold(mut self, threshold: f32) -> Self {
    self.confidence_threshold = threshold;
    self
  }

  pub fn iou_threshold(mut self, threshold: f32) -> Self {
    self.iou_threshold = threshold;
    self
  }

  pub fn coordinate_mode(mut self, mode: CoordinateMode) -> Self {
    self.coordinate_mode = mode;
    self
  }

  pub fn resize(mut self, resize: ResizeMode) -> Self {
    self.resize = resize;
    self
  }

  pub fn max_detections(mut self, max: Option<usize>) -> Self {
    self.max_detections = max;
    self
  }

  pub fn deadline(mut self, deadline: Option<Duration>) -> Self {
    self.deadline = deadline;
    self
  }

  pub fn validate(&self) -> Result<(), DetectError> {
    if !self.confidence_threshold.is_finite() {
      return Err(DetectError::InvalidConfig(format!(
        "confidence_threshold 必须是有限值, 实际为 {}",
        self.confidence_threshold
      )));
    }

    if !(self.iou_threshold > 0.0 && self.iou_threshold <= 1.0) {
      return Err(DetectError::InvalidConfig(format!(
        "iou_threshold 必须在 (0, 1] 内, 实际为 {}",
        self.iou_threshold
      )));
    }

    Ok(())
  }
}
