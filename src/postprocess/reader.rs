// 该文件是 Shanan （山南西风） 项目的一部分。
// src/postprocess/reader.rs - 输出张量解码
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

use tracing::{debug, error};

use crate::{
  error::DetectError,
  model::{
    BoxFormat, GridEncoding, GridHead, ModelSpec, OutputLayout, RawOutput, ScoreConvention,
    TensorOrder,
  },
  postprocess::{RawCandidate, mapper::corners_to_center_size},
};

/// 张量中按 (通道, 锚点) 寻址的一段数据
#[derive(Debug, Clone, Copy)]
struct Plane<'a> {
  data: &'a [f32],
  offset: usize,
  channel_stride: usize,
  anchor_stride: usize,
}

impl<'a> Plane<'a> {
  /// 通道连续: [C, N]
  fn planar(data: &'a [f32], offset: usize, anchors: usize) -> Self {
    Self {
      data,
      offset,
      channel_stride: anchors,
      anchor_stride: 1,
    }
  }

  /// 锚点连续: [N, C]
  fn interleaved(data: &'a [f32], offset: usize, channels: usize) -> Self {
    Self {
      data,
      offset,
      channel_stride: 1,
      anchor_stride: channels,
    }
  }

  #[inline]
  fn at(&self, channel: usize, anchor: usize) -> f32 {
    self.data[self.offset + channel * self.channel_stride + anchor * self.anchor_stride]
  }
}

/// 框参数化
#[derive(Debug, Clone, Copy)]
enum Geometry {
  Direct(BoxFormat),
  Grid(GridHead, GridEncoding),
}

/// 一个检测头（或整个扁平输出）的已校验视图
#[derive(Debug)]
struct HeadView<'a> {
  reg: Plane<'a>,
  obj: Option<Plane<'a>>,
  cls: Plane<'a>,
  anchors: usize,
  geometry: Geometry,
}

/// 把推理后端的原始输出解码为候选序列。
///
/// 每个锚点产出一个候选（最优类别），顺序为检测头声明顺序下的网格顺序；
/// 框统一为模型输入像素空间的 [cx, cy, w, h]。尺寸或数量不符即返回
/// `MalformedOutput`，不会返回部分结果。
pub fn read_candidates(
  output: &RawOutput,
  spec: &ModelSpec,
) -> Result<Vec<RawCandidate>, DetectError> {
  spec.validate()?;

  let expected_outputs = spec.num_outputs();
  if output.num_outputs() != expected_outputs {
    error!(
      "预期模型输出数量为 {}, 实际为 {}",
      expected_outputs,
      output.num_outputs()
    );
    return Err(DetectError::malformed(format!(
      "预期模型输出数量为 {}, 实际为 {}",
      expected_outputs,
      output.num_outputs()
    )));
  }

  let heads = head_views(output, spec)?;

  let mut candidates = Vec::new();
  candidates.try_reserve_exact(spec.num_anchors())?;

  let mut anchor_base = 0usize;
  for (head_idx, head) in heads.iter().enumerate() {
    decode_head(head, spec, anchor_base, &mut candidates);
    debug!(
      "检测头 {}: 锚点 {}, 累计候选 {}",
      head_idx,
      head.anchors,
      candidates.len()
    );
    anchor_base += head.anchors;
  }

  Ok(candidates)
}

fn head_views<'a>(output: &'a RawOutput, spec: &ModelSpec) -> Result<Vec<HeadView<'a>>, DetectError> {
  let channels = spec.channels();
  let objectness = spec.layout.has_objectness();
  let cls_offset = 4 + usize::from(objectness);

  match &spec.layout {
    OutputLayout::Flat {
      num_anchors,
      box_format,
      transposed,
      ..
    } => {
      let data = output.get_f32(0)?;
      expect_len(data, spec.tensor_len(*num_anchors)?, "扁平输出")?;
      let n = *num_anchors;
      let view = if *transposed {
        HeadView {
          reg: Plane::planar(data, 0, n),
          obj: objectness.then(|| Plane::planar(data, 4 * n, n)),
          cls: Plane::planar(data, cls_offset * n, n),
          anchors: n,
          geometry: Geometry::Direct(*box_format),
        }
      } else {
        HeadView {
          reg: Plane::interleaved(data, 0, channels),
          obj: objectness.then(|| Plane::interleaved(data, 4, channels)),
          cls: Plane::interleaved(data, cls_offset, channels),
          anchors: n,
          geometry: Geometry::Direct(*box_format),
        }
      };
      Ok(vec![view])
    }
    OutputLayout::Grid {
      heads,
      encoding,
      order,
      ..
    } => {
      let mut views = Vec::with_capacity(heads.len());
      for (head_idx, head) in heads.iter().enumerate() {
        let spatial = head.spatial();
        let geometry = Geometry::Grid(*head, *encoding);
        let view = match order {
          TensorOrder::Interleaved => {
            let data = output.get_f32(head_idx)?;
            expect_len(data, spec.tensor_len(spatial)?, &format!("检测头 {}", head_idx))?;
            HeadView {
              reg: Plane::interleaved(data, 0, channels),
              obj: objectness.then(|| Plane::interleaved(data, 4, channels)),
              cls: Plane::interleaved(data, cls_offset, channels),
              anchors: spatial,
              geometry,
            }
          }
          TensorOrder::Planar => {
            let per_head = if objectness { 3 } else { 2 };
            let first = head_idx * per_head;
            let tensors = (first..first + per_head)
              .map(|idx| output.get_f32(idx))
              .collect::<Result<Vec<_>, _>>()?;
            let (reg, obj, cls) =
              match_head_tensors(&tensors, spatial, spec.num_classes, objectness, head_idx)?;
            HeadView {
              reg: Plane::planar(reg, 0, spatial),
              obj: obj.map(|obj| Plane::planar(obj, 0, spatial)),
              cls: Plane::planar(cls, 0, spatial),
              anchors: spatial,
              geometry,
            }
          }
        };
        views.push(view);
      }
      Ok(views)
    }
  }
}

fn expect_len(data: &[f32], expected: usize, what: &str) -> Result<(), DetectError> {
  if data.len() != expected {
    error!("{}: 张量大小 {}, 期望 {}", what, data.len(), expected);
    return Err(DetectError::malformed(format!(
      "{}: 张量大小 {}, 期望 {}",
      what,
      data.len(),
      expected
    )));
  }
  Ok(())
}

type HeadTensors<'a> = (&'a [f32], Option<&'a [f32]>, &'a [f32]);

/// 根据张量大小匹配回归、objectness 和分类输出。
///
/// 推理后端的输出顺序可能与声明不同；大小互不相同时按大小识别，
/// 否则要求按声明顺序 (回归, objectness, 分类) 排列。
fn match_head_tensors<'a>(
  tensors: &[&'a [f32]],
  spatial: usize,
  num_classes: usize,
  objectness: bool,
  head_idx: usize,
) -> Result<HeadTensors<'a>, DetectError> {
  let mut expected = vec![4 * spatial];
  if objectness {
    expected.push(spatial);
  }
  expected.push(num_classes * spatial);

  let declared_ok = tensors
    .iter()
    .zip(&expected)
    .all(|(t, &len)| t.len() == len);

  let distinct = expected
    .iter()
    .enumerate()
    .all(|(i, a)| expected[i + 1..].iter().all(|b| a != b));

  let ordered: Vec<&'a [f32]> = if declared_ok {
    tensors.to_vec()
  } else if distinct {
    let mut picked = Vec::with_capacity(expected.len());
    for &len in &expected {
      match tensors.iter().find(|t| t.len() == len) {
        Some(t) => picked.push(*t),
        None => {
          return Err(head_mismatch(tensors, &expected, head_idx));
        }
      }
    }
    debug!("检测头 {}: 输出顺序与声明不同, 已按大小匹配", head_idx);
    picked
  } else {
    return Err(head_mismatch(tensors, &expected, head_idx));
  };

  let reg = ordered[0];
  let cls = ordered[ordered.len() - 1];
  let obj = objectness.then(|| ordered[1]);
  Ok((reg, obj, cls))
}

fn head_mismatch(tensors: &[&[f32]], expected: &[usize], head_idx: usize) -> DetectError {
  let actual: Vec<usize> = tensors.iter().map(|t| t.len()).collect();
  error!(
    "检测头 {}: 输出大小不匹配 - 实际 {:?}, 期望 {:?}",
    head_idx, actual, expected
  );
  DetectError::malformed(format!(
    "检测头 {}: 输出大小不匹配 - 实际 {:?}, 期望 {:?}",
    head_idx, actual, expected
  ))
}

fn decode_head(
  head: &HeadView<'_>,
  spec: &ModelSpec,
  anchor_base: usize,
  candidates: &mut Vec<RawCandidate>,
) {
  let (input_w, input_h) = (spec.input_size.0 as f32, spec.input_size.1 as f32);

  for a in 0..head.anchors {
    let raw = [
      head.reg.at(0, a),
      head.reg.at(1, a),
      head.reg.at(2, a),
      head.reg.at(3, a),
    ];

    let bbox = match head.geometry {
      Geometry::Direct(BoxFormat::CenterSize) => raw,
      Geometry::Direct(BoxFormat::Corners) => corners_to_center_size(&raw),
      Geometry::Grid(grid, encoding) => {
        let row = (a / grid.width) as f32;
        let col = (a % grid.width) as f32;
        decode_grid_box(raw, row, col, grid.stride, encoding, input_w, input_h)
      }
    };

    let (category, class_prob) = {
      let mut max_logit = f32::NEG_INFINITY;
      let mut cls_idx = 0usize;
      for c in 0..spec.num_classes {
        let logit = head.cls.at(c, a);
        if logit > max_logit {
          max_logit = logit;
          cls_idx = c;
        }
      }
      (cls_idx as u32, spec.activation.apply(max_logit))
    };

    // validate() 保证需要 objectness 的约定一定有该通道
    let objectness = head
      .obj
      .map(|obj| spec.activation.apply(obj.at(0, a)))
      .unwrap_or(1.0);

    let score = match spec.score {
      ScoreConvention::ClassMax => class_prob,
      ScoreConvention::ObjectnessTimesClass => objectness * class_prob,
      ScoreConvention::Objectness => objectness,
    };

    candidates.push(RawCandidate {
      anchor: anchor_base + a,
      bbox,
      category,
      score,
    });
  }
}

#[inline]
fn decode_grid_box(
  raw: [f32; 4],
  row: f32,
  col: f32,
  stride: f32,
  encoding: GridEncoding,
  input_w: f32,
  input_h: f32,
) -> [f32; 4] {
  match encoding {
    GridEncoding::Distance => {
      let grid_x = col + 0.5;
      let grid_y = row + 0.5;
      let xmin = (grid_x - raw[0]) * stride;
      let ymin = (grid_y - raw[1]) * stride;
      let xmax = (grid_x + raw[2]) * stride;
      let ymax = (grid_y + raw[3]) * stride;
      corners_to_center_size(&[xmin, ymin, xmax, ymax])
    }
    GridEncoding::Offset => [
      (col + raw[0]) * stride,
      (row + raw[1]) * stride,
      raw[2] * input_w,
      raw[3] * input_h,
    ],
  }
}
