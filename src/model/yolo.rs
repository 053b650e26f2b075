// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/yolo.rs - YOLO 系列模型输出布局预设
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

use crate::model::{
  Activation, BoxFormat, GridEncoding, GridHead, ModelSpec, OutputLayout, ScoreConvention,
  TensorOrder,
};

const YOLO_CLASS_NUM: usize = 80;
const YOLO_INPUT_W: u32 = 640;
const YOLO_INPUT_H: u32 = 640;
const YOLO_HEAD_SIZES: [(usize, usize); 3] = [(80, 80), (40, 40), (20, 20)];
const YOLO_STRIDES: [f32; 3] = [8.0, 16.0, 32.0];

fn yolo_heads() -> Vec<GridHead> {
  YOLO_HEAD_SIZES
    .iter()
    .zip(YOLO_STRIDES)
    .map(|(&(h, w), stride)| GridHead::new(h, w, stride))
    .collect()
}

/// YOLO26 / YOLO11 无锚框检测头：三个步长，每头一对 (回归, 分类 logit) 平面张量
pub fn yolo26() -> ModelSpec {
  ModelSpec {
    input_size: (YOLO_INPUT_W, YOLO_INPUT_H),
    num_classes: YOLO_CLASS_NUM,
    layout: OutputLayout::Grid {
      heads: yolo_heads(),
      encoding: GridEncoding::Distance,
      objectness: false,
      order: TensorOrder::Planar,
    },
    score: ScoreConvention::ClassMax,
    activation: Activation::Sigmoid,
  }
}

/// YOLOv5 风格：每头一个交错张量 [HW, 5 + C]，概率已激活
pub fn yolov5() -> ModelSpec {
  ModelSpec {
    input_size: (YOLO_INPUT_W, YOLO_INPUT_H),
    num_classes: YOLO_CLASS_NUM,
    layout: OutputLayout::Grid {
      heads: yolo_heads(),
      encoding: GridEncoding::Offset,
      objectness: true,
      order: TensorOrder::Interleaved,
    },
    score: ScoreConvention::ObjectnessTimesClass,
    activation: Activation::Identity,
  }
}

/// Ultralytics ONNX 导出：单个 [4 + C, 8400] 张量，框为像素 (cx, cy, w, h)
pub fn ultralytics(num_classes: usize) -> ModelSpec {
  let num_anchors = YOLO_HEAD_SIZES.iter().map(|(h, w)| h * w).sum();
  ModelSpec {
    input_size: (YOLO_INPUT_W, YOLO_INPUT_H),
    num_classes,
    layout: OutputLayout::Flat {
      num_anchors,
      box_format: BoxFormat::CenterSize,
      objectness: false,
      transposed: true,
    },
    score: ScoreConvention::ClassMax,
    activation: Activation::Identity,
  }
}

/// 按名称查找预设
pub fn preset(name: &str, num_classes: Option<usize>) -> Option<ModelSpec> {
  let mut spec = match name {
    "yolo26" | "yolo11" => yolo26(),
    "yolov5" => yolov5(),
    "ultralytics" => ultralytics(YOLO_CLASS_NUM),
    _ => return None,
  };

  if let Some(classes) = num_classes {
    spec.num_classes = classes;
  }
  Some(spec)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_presets_are_valid() {
    for name in ["yolo26", "yolo11", "yolov5", "ultralytics"] {
      let spec = preset(name, None).unwrap();
      assert!(spec.validate().is_ok(), "preset {} should validate", name);
      assert_eq!(spec.num_anchors(), 8400, "preset {} anchors", name);
    }
  }

  #[test]
  fn test_preset_class_override_and_unknown() {
    let spec = preset("ultralytics", Some(3)).unwrap();
    assert_eq!(spec.num_classes, 3);
    assert_eq!(spec.channels(), 7);
    assert!(preset("detr", None).is_none());
  }
}
