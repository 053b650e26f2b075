// 该文件是 Shanan （山南西风） 项目的一部分。
// src/args.rs - 命令行参数
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

use clap::Args;
use url::Url;

use crate::config::{
  CoordinateMode, DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_IOU_THRESHOLD, DetectConfig, ResizeMode,
};

/// 模型、输入与输出的 URI
#[derive(Args, Debug)]
pub struct IoArgs {
  /// 模型来源，例如 tensor:///path/output.json?preset=yolo26
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源，例如 image:///path/a.jpg 或 blank:?size=640x480
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，例如 log://?labels、json:///tmp/r.json、folder:///tmp/records?always
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
}

/// 检测参数
#[derive(Args, Debug, Clone)]
pub struct DetectArgs {
  /// 置信度阈值
  #[arg(long, default_value_t = DEFAULT_CONFIDENCE_THRESHOLD, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IOU 阈值 (0.0 - 1.0]
  #[arg(long, default_value_t = DEFAULT_IOU_THRESHOLD, value_name = "THRESHOLD")]
  pub iou: f32,

  /// 输出坐标空间
  #[arg(long, value_enum, default_value_t = CoordinateMode::PixelCorners)]
  pub mode: CoordinateMode,

  /// 图像到模型输入的缩放方式
  #[arg(long, value_enum, default_value_t = ResizeMode::Stretch)]
  pub resize: ResizeMode,

  /// 最多输出的检测数量
  #[arg(long, value_name = "COUNT")]
  pub max_detections: Option<usize>,

  /// 单次检测的时间上限（毫秒）
  #[arg(long, value_name = "MILLIS")]
  pub deadline_ms: Option<u64>,
}

impl DetectArgs {
  pub fn into_config(self) -> DetectConfig {
    DetectConfig::default()
      .confidence_threshold(self.confidence)
      .iou_threshold(self.iou)
      .coordinate_mode(self.mode)
      .resize(self.resize)
      .max_detections(self.max_detections)
      .deadline(self.deadline_ms.map(Duration::from_millis))
  }
}
