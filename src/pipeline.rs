// 该文件是 Shanan （山南西风） 项目的一部分。
// src/pipeline.rs - 检测流水线编排
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

use std::time::Instant;

use tracing::debug;

use crate::{
  config::DetectConfig,
  error::DetectError,
  frame::ImageView,
  model::{Detection, DetectionSet, Model, ModelSpec, RawOutput},
  postprocess::{
    CoordinateMapper, filter_by_score, mapper::Letterbox, non_max_suppression, read_candidates,
  },
};

/// 对一张图像执行完整检测：推理 → 解码 → 过滤 → NMS → 坐标映射。
///
/// 不保留任何跨调用状态；没有候选通过过滤时返回空结果而不是错误。
pub fn run<M: Model>(
  image: &ImageView<'_>,
  model: &M,
  config: &DetectConfig,
) -> Result<DetectionSet, DetectError> {
  config.validate()?;
  let started = Instant::now();

  debug!("执行模型推理");
  let output = model.infer(image).map_err(DetectError::backend)?;
  debug!("推理耗时: {:.2?}", started.elapsed());

  postprocess_since(&output, model.spec(), config, image.size(), started)
}

/// 只做后处理：同一份原始输出总是得到相同的结果与顺序
pub fn postprocess(
  output: &RawOutput,
  spec: &ModelSpec,
  config: &DetectConfig,
  image_size: (u32, u32),
) -> Result<DetectionSet, DetectError> {
  config.validate()?;
  postprocess_since(output, spec, config, image_size, Instant::now())
}

fn postprocess_since(
  output: &RawOutput,
  spec: &ModelSpec,
  config: &DetectConfig,
  image_size: (u32, u32),
  started: Instant,
) -> Result<DetectionSet, DetectError> {
  if image_size.0 == 0 || image_size.1 == 0 {
    return Err(DetectError::InvalidImage(format!(
      "图像尺寸不能为零: {}x{}",
      image_size.0, image_size.1
    )));
  }

  debug!("后处理模型输出");
  let candidates = read_candidates(output, spec)?;
  debug!("解码候选 {} 个", candidates.len());

  let candidates = filter_by_score(candidates, config.confidence_threshold);
  debug!(
    "置信度 ≥ {} 的候选 {} 个",
    config.confidence_threshold,
    candidates.len()
  );

  if candidates.is_empty() {
    debug!("没有候选通过过滤");
    return Ok(DetectionSet::empty(image_size, config.coordinate_mode));
  }

  if let Some(deadline) = config.deadline {
    let elapsed = started.elapsed();
    if elapsed > deadline {
      return Err(DetectError::DeadlineExceeded { elapsed });
    }
  }

  let mut outcome = non_max_suppression(&candidates, config.iou_threshold)?;
  drop(candidates);
  debug!("NMS 后保留 {} 个", outcome.kept.len());

  if let Some(max) = config.max_detections {
    outcome.kept.truncate(max);
  }

  let letterbox = Letterbox::from_mode(config.resize, image_size, spec.input_size);
  let mapper = CoordinateMapper::new(letterbox, image_size, config.coordinate_mode);

  let mut items = Vec::new();
  items.try_reserve_exact(outcome.kept.len())?;
  items.extend(outcome.kept.iter().map(|c| Detection {
    category: c.category,
    score: c.score,
    bbox: mapper.map(&c.bbox),
  }));

  debug!("检测到 {} 个物体", items.len());
  debug!("检测结果: {:?}", items);

  Ok(DetectionSet {
    items: items.into_boxed_slice(),
    image_size,
    mode: config.coordinate_mode,
    degenerate_skipped: outcome.degenerate_skipped,
  })
}

/// 绑定一个推理后端与一份配置的检测器
pub struct Detector<M> {
  model: M,
  config: DetectConfig,
}

impl<M: Model> Detector<M> {
  pub fn new(model: M, config: DetectConfig) -> Self {
    Self { model, config }
  }

  pub fn config(&self) -> &DetectConfig {
    &self.config
  }

  pub fn model(&self) -> &M {
    &self.model
  }

  pub fn detect(&self, image: &ImageView<'_>) -> Result<DetectionSet, DetectError> {
    run(image, &self.model, &self.config)
  }

  /// 使用临时调整的配置运行，例如在调用时改变阈值
  pub fn detect_with(
    &self,
    image: &ImageView<'_>,
    config: &DetectConfig,
  ) -> Result<DetectionSet, DetectError> {
    run(image, &self.model, config)
  }
}
