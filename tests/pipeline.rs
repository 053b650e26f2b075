// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/pipeline.rs - 检测流水线集成测试
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

use std::convert::Infallible;
use std::io::Write;

use shanan_post::{
  CoordinateMode, DetectConfig, DetectError, Detector, ImageView, Model, ModelSpec, RawOutput,
  ResizeMode, RgbFrame,
  model::{
    Activation, BoxFormat, GridEncoding, GridHead, OutputLayout, ScoreConvention,
    TensorFileModelBuilder, TensorOrder,
  },
  pipeline,
};

/// 总是返回固定张量的内存后端
struct SyntheticModel {
  spec: ModelSpec,
  output: RawOutput,
}

impl Model for SyntheticModel {
  type Error = Infallible;

  fn spec(&self) -> &ModelSpec {
    &self.spec
  }

  fn infer(&self, _image: &ImageView<'_>) -> Result<RawOutput, Self::Error> {
    Ok(self.output.clone())
  }
}

/// 扁平角点布局，每行 [x1, y1, x2, y2, class0, class1]
fn flat_model(rows: &[[f32; 6]]) -> SyntheticModel {
  SyntheticModel {
    spec: ModelSpec {
      input_size: (640, 640),
      num_classes: 2,
      layout: OutputLayout::Flat {
        num_anchors: rows.len(),
        box_format: BoxFormat::Corners,
        objectness: false,
        transposed: false,
      },
      score: ScoreConvention::ClassMax,
      activation: Activation::Identity,
    },
    output: RawOutput::new(vec![rows.iter().flatten().copied().collect()]),
  }
}

fn frame(width: u32, height: u32) -> RgbFrame {
  RgbFrame::blank(width, height).unwrap()
}

#[test]
fn test_ten_candidates_three_overlapping() {
  let model = flat_model(&[
    [100.0, 100.0, 200.0, 200.0, 0.90, 0.0],
    [102.0, 101.0, 201.0, 203.0, 0.85, 0.0],
    [0.0, 0.0, 30.0, 30.0, 0.10, 0.05],
    [98.0, 99.0, 199.0, 198.0, 0.80, 0.0],
    [400.0, 400.0, 450.0, 470.0, 0.0, 0.70],
    [10.0, 300.0, 60.0, 350.0, 0.20, 0.0],
    [500.0, 10.0, 600.0, 90.0, 0.60, 0.0],
    [300.0, 300.0, 310.0, 310.0, 0.0, 0.15],
    [50.0, 500.0, 90.0, 560.0, 0.12, 0.0],
    [200.0, 500.0, 260.0, 600.0, 0.0, 0.24],
  ]);
  let detector = Detector::new(model, DetectConfig::default().resize(ResizeMode::Native));
  let frame = frame(640, 640);

  let set = detector.detect(&frame.view()).unwrap();
  assert_eq!(set.len(), 3, "three overlapping boxes collapse into one: {:?}", set);

  let scores: Vec<f32> = set.iter().map(|d| d.score).collect();
  assert_eq!(scores, vec![0.90, 0.70, 0.60]);
  assert_eq!(set.items[0].bbox, [100.0, 100.0, 200.0, 200.0]);
  assert_eq!(set.items[1].category, 1);
}

#[test]
fn test_two_overlapping_boxes_one_survivor() {
  let model = flat_model(&[
    [0.0, 0.0, 100.0, 100.0, 0.9, 0.0],
    [0.0, 0.0, 100.0, 90.0, 0.8, 0.0],
  ]);
  let detector = Detector::new(model, DetectConfig::default().resize(ResizeMode::Native));
  let set = detector.detect(&frame(640, 640).view()).unwrap();
  assert_eq!(set.len(), 1);
  assert!((set.items[0].score - 0.9).abs() < 1e-6);
}

#[test]
fn test_all_scores_below_threshold() {
  let model = flat_model(&[
    [0.0, 0.0, 100.0, 100.0, 0.1, 0.2],
    [50.0, 50.0, 90.0, 90.0, 0.05, 0.0],
  ]);
  let detector = Detector::new(model, DetectConfig::default());
  let set = detector.detect(&frame(320, 240).view()).unwrap();
  assert!(set.is_empty());
  assert_eq!(set.image_size, (320, 240));
}

#[test]
fn test_same_input_same_output() {
  let model = flat_model(&[
    [10.0, 10.0, 50.0, 50.0, 0.5, 0.5],
    [12.0, 12.0, 52.0, 52.0, 0.5, 0.5],
    [300.0, 300.0, 400.0, 380.0, 0.3, 0.9],
  ]);
  let detector = Detector::new(model, DetectConfig::default().resize(ResizeMode::Letterbox));
  let frame = frame(800, 600);

  let first = detector.detect(&frame.view()).unwrap();
  for _ in 0..5 {
    assert_eq!(detector.detect(&frame.view()).unwrap(), first);
  }
}

#[test]
fn test_malformed_output_is_an_error() {
  let mut model = flat_model(&[[0.0, 0.0, 10.0, 10.0, 0.9, 0.0]]);
  model.output = RawOutput::new(vec![vec![0.0; 5]]);
  let detector = Detector::new(model, DetectConfig::default());
  let err = detector.detect(&frame(64, 64).view()).unwrap_err();
  assert!(err.is_malformed_output(), "{}", err);
}

#[test]
fn test_missing_output_tensor_is_an_error() {
  let mut model = flat_model(&[[0.0, 0.0, 10.0, 10.0, 0.9, 0.0]]);
  model.output = RawOutput::new(vec![]);
  let err = pipeline::run(&frame(64, 64).view(), &model, &DetectConfig::default()).unwrap_err();
  assert!(matches!(err, DetectError::MalformedOutput(_)), "{}", err);
}

#[test]
fn test_detect_with_overrides_threshold() {
  let model = flat_model(&[
    [0.0, 0.0, 10.0, 10.0, 0.3, 0.0],
    [100.0, 100.0, 110.0, 110.0, 0.6, 0.0],
  ]);
  let detector = Detector::new(model, DetectConfig::default().resize(ResizeMode::Native));
  let frame = frame(640, 640);

  assert_eq!(detector.detect(&frame.view()).unwrap().len(), 2);
  let strict = detector.config().clone().confidence_threshold(0.5);
  assert_eq!(detector.detect_with(&frame.view(), &strict).unwrap().len(), 1);
}

#[test]
fn test_planar_grid_head_stretched_to_image() {
  // 单检测头 2x2，步长 32，模型输入 64x64
  let spec = ModelSpec {
    input_size: (64, 64),
    num_classes: 1,
    layout: OutputLayout::Grid {
      heads: vec![GridHead::new(2, 2, 32.0)],
      encoding: GridEncoding::Distance,
      objectness: false,
      order: TensorOrder::Planar,
    },
    score: ScoreConvention::ClassMax,
    activation: Activation::Identity,
  };
  // reg [4, 2, 2]：每个单元格 l = t = r = b = 0.5
  let reg = vec![0.5; 16];
  // cls [1, 2, 2]：只有 (0, 0) 单元格高分
  let cls = vec![0.9, 0.1, 0.1, 0.1];
  let model = SyntheticModel {
    spec,
    output: RawOutput::new(vec![reg, cls]),
  };

  let detector = Detector::new(model, DetectConfig::default());
  let set = detector.detect(&frame(128, 128).view()).unwrap();
  assert_eq!(set.len(), 1);
  assert_eq!(set.items[0].bbox, [0.0, 0.0, 64.0, 64.0]);

  let normalized = DetectConfig::default().coordinate_mode(CoordinateMode::NormalizedCenterSize);
  let set = detector.detect_with(&frame(128, 128).view(), &normalized).unwrap();
  assert_eq!(set.annotation_lines(), vec!["0 0.250000 0.250000 0.500000 0.500000"]);
}

#[test]
fn test_tensor_file_replay() {
  let mut file = tempfile::NamedTempFile::new().unwrap();
  write!(
    file,
    r#"{{
      "spec": {{
        "input_size": [640, 640],
        "num_classes": 1,
        "layout": {{ "kind": "flat", "num_anchors": 2, "box_format": "corners" }}
      }},
      "tensors": [[225, 227, 273, 288, 0.9, 0, 0, 10, 10, 0.1]]
    }}"#
  )
  .unwrap();

  let model = TensorFileModelBuilder::new(file.path().to_string_lossy())
    .build()
    .unwrap();
  let config = DetectConfig::default().coordinate_mode(CoordinateMode::NormalizedCenterSize);
  let detector = Detector::new(model, config);
  let set = detector.detect(&frame(640, 640).view()).unwrap();

  assert_eq!(set.len(), 1);
  let b = set.items[0].bbox;
  for (got, want) in b.iter().zip([0.389, 0.402, 0.075, 0.095]) {
    assert!((got - want).abs() < 1e-3, "box {:?}", b);
  }
}
