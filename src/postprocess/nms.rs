// 该文件是 Shanan （山南西风） 项目的一部分。
// src/postprocess/nms.rs - 非极大值抑制
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

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::{error::DetectError, postprocess::RawCandidate};

/// NMS 的结果：幸存者按分数降序（同分按锚点序号升序）
#[derive(Debug, Clone, PartialEq)]
pub struct NmsOutcome {
  pub kept: Vec<RawCandidate>,
  /// 宽或高不为正而被排除的候选数量
  pub degenerate_skipped: usize,
}

/// 两个 [cx, cy, w, h] 框的交并比，退化框与任何框的 IoU 都是 0
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
  if !(a[2] > 0.0 && a[3] > 0.0 && b[2] > 0.0 && b[3] > 0.0) {
    return 0.0;
  }
  if !(a[2] * a[3]).is_finite() || !(b[2] * b[3]).is_finite() {
    return 0.0;
  }

  let (ax1, ay1, ax2, ay2) = (
    a[0] - a[2] / 2.0,
    a[1] - a[3] / 2.0,
    a[0] + a[2] / 2.0,
    a[1] + a[3] / 2.0,
  );
  let (bx1, by1, bx2, by2) = (
    b[0] - b[2] / 2.0,
    b[1] - b[3] / 2.0,
    b[0] + b[2] / 2.0,
    b[1] + b[3] / 2.0,
  );

  let x1 = ax1.max(bx1);
  let y1 = ay1.max(by1);
  let x2 = ax2.min(bx2);
  let y2 = ay2.min(by2);

  let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
  let union = a[2] * a[3] + b[2] * b[3] - intersection;

  if union > 0.0 && union.is_finite() {
    intersection / union
  } else {
    0.0
  }
}

/// 分数降序，同分按锚点升序
#[inline]
fn by_score_desc(a: &RawCandidate, b: &RawCandidate) -> Ordering {
  b.score
    .total_cmp(&a.score)
    .then_with(|| a.anchor.cmp(&b.anchor))
}

/// 按类别独立执行贪心 NMS。
///
/// 与某个更高分（同分时锚点序号更小）的同类幸存者 IoU ≥ `iou_threshold`
/// 的候选被抑制。退化框直接排除。结果跨类别合并后整体按分数降序重排。
pub fn non_max_suppression(
  candidates: &[RawCandidate],
  iou_threshold: f32,
) -> Result<NmsOutcome, DetectError> {
  let mut degenerate_skipped = 0usize;

  // 类别 → 候选下标，避免逐对象的堆分配
  let mut by_class: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
  for (idx, candidate) in candidates.iter().enumerate() {
    if candidate.is_degenerate() {
      degenerate_skipped += 1;
      debug!(
        "DegenerateBoxSkipped: 锚点 {}, 框 {:?}",
        candidate.anchor, candidate.bbox
      );
      continue;
    }
    by_class.entry(candidate.category).or_default().push(idx);
  }

  if degenerate_skipped > 0 {
    warn!("跳过 {} 个退化框", degenerate_skipped);
  }

  let mut kept = Vec::new();
  kept.try_reserve(candidates.len() - degenerate_skipped)?;

  let mut suppressed = Vec::new();
  for (category, mut indices) in by_class {
    indices.sort_by(|&a, &b| by_score_desc(&candidates[a], &candidates[b]));

    suppressed.clear();
    suppressed.try_reserve(indices.len())?;
    suppressed.resize(indices.len(), false);

    let before = kept.len();
    for i in 0..indices.len() {
      if suppressed[i] {
        continue;
      }
      let best = &candidates[indices[i]];
      kept.push(*best);

      for j in i + 1..indices.len() {
        if !suppressed[j] && iou(&best.bbox, &candidates[indices[j]].bbox) >= iou_threshold {
          suppressed[j] = true;
        }
      }
    }

    debug!(
      "类别 {}: 候选 {}, 保留 {}",
      category,
      indices.len(),
      kept.len() - before
    );
  }

  kept.sort_by(by_score_desc);

  Ok(NmsOutcome {
    kept,
    degenerate_skipped,
  })
}
