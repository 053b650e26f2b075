// 该文件是 Shanan （山南西风） 项目的一部分。
// src/postprocess.rs - 检测后处理
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

//! 原始张量 → 候选 → 过滤 → NMS → 坐标映射。

pub mod filter;
pub mod mapper;
pub mod nms;
pub mod reader;

pub use self::filter::filter_by_score;
pub use self::mapper::CoordinateMapper;
pub use self::nms::{NmsOutcome, non_max_suppression};
pub use self::reader::read_candidates;

/// 模型对单个锚点的预测，框为模型输入像素空间的 [cx, cy, w, h]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawCandidate {
  /// 跨所有检测头的锚点序号，用于稳定排序
  pub anchor: usize,
  pub bbox: [f32; 4],
  pub category: u32,
  pub score: f32,
}

impl RawCandidate {
  /// 宽或高不为正，或坐标、面积不是有限值
  pub fn is_degenerate(&self) -> bool {
    let [cx, cy, w, h] = self.bbox;
    !(w > 0.0 && h > 0.0)
      || !(cx.is_finite() && cy.is_finite() && w.is_finite() && h.is_finite())
      || !(w * h).is_finite()
  }

  /// [x1, y1, x2, y2]
  pub fn corners(&self) -> [f32; 4] {
    mapper::center_size_to_corners(&self.bbox)
  }
}
