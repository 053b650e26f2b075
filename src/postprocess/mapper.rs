// 该文件是 Shanan （山南西风） 项目的一部分。
// src/postprocess/mapper.rs - 坐标空间映射
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

use crate::config::{CoordinateMode, ResizeMode};

/// (cx, cy, w, h) → (x1, y1, x2, y2)
#[inline]
pub fn center_size_to_corners(b: &[f32; 4]) -> [f32; 4] {
  let [cx, cy, w, h] = *b;
  [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0]
}

/// (x1, y1, x2, y2) → (cx, cy, w, h)
#[inline]
pub fn corners_to_center_size(c: &[f32; 4]) -> [f32; 4] {
  let [x1, y1, x2, y2] = *c;
  [(x1 + x2) / 2.0, (y1 + y2) / 2.0, x2 - x1, y2 - y1]
}

/// 像素角点除以图像宽高，截断到 [0, 1]
pub fn normalize_corners(c: &[f32; 4], image_size: (u32, u32)) -> [f32; 4] {
  let (w, h) = (image_size.0 as f32, image_size.1 as f32);
  [
    (c[0] / w).clamp(0.0, 1.0),
    (c[1] / h).clamp(0.0, 1.0),
    (c[2] / w).clamp(0.0, 1.0),
    (c[3] / h).clamp(0.0, 1.0),
  ]
}

pub fn denormalize_corners(n: &[f32; 4], image_size: (u32, u32)) -> [f32; 4] {
  let (w, h) = (image_size.0 as f32, image_size.1 as f32);
  [n[0] * w, n[1] * h, n[2] * w, n[3] * h]
}

/// 像素角点归一化；右、下边落在最后一个像素上时视为到达图像边界
fn normalize_pixel_corners(c: &[f32; 4], image_size: (u32, u32)) -> [f32; 4] {
  let max_x = image_size.0.saturating_sub(1) as f32;
  let max_y = image_size.1.saturating_sub(1) as f32;
  let x2 = if c[2] >= max_x { image_size.0 as f32 } else { c[2] };
  let y2 = if c[3] >= max_y { image_size.1 as f32 } else { c[3] };
  normalize_corners(&[c[0], c[1], x2, y2], image_size)
}

/// 把任意输出模式下的框转换为归一化 (cx, cy, w, h)
pub fn to_normalized_center_size(
  bbox: &[f32; 4],
  mode: CoordinateMode,
  image_size: (u32, u32),
) -> [f32; 4] {
  match mode {
    CoordinateMode::PixelCorners => {
      corners_to_center_size(&normalize_pixel_corners(bbox, image_size))
    }
    CoordinateMode::NormalizedCorners => corners_to_center_size(bbox),
    CoordinateMode::NormalizedCenterSize => *bbox,
  }
}

/// 源图像到模型输入的仿射变换 `model = image * scale + pad`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
  pub scale: (f32, f32),
  pub pad: (f32, f32),
}

impl Letterbox {
  pub fn identity() -> Self {
    Self {
      scale: (1.0, 1.0),
      pad: (0.0, 0.0),
    }
  }

  /// 宽高各自缩放到模型输入
  pub fn stretch(image_size: (u32, u32), model_size: (u32, u32)) -> Self {
    Self {
      scale: (
        model_size.0 as f32 / image_size.0 as f32,
        model_size.1 as f32 / image_size.1 as f32,
      ),
      pad: (0.0, 0.0),
    }
  }

  /// 保持宽高比缩放并居中填充
  pub fn fit(image_size: (u32, u32), model_size: (u32, u32)) -> Self {
    let (iw, ih) = (image_size.0 as f32, image_size.1 as f32);
    let (mw, mh) = (model_size.0 as f32, model_size.1 as f32);
    let scale = (mw / iw).min(mh / ih);
    Self {
      scale: (scale, scale),
      pad: ((mw - iw * scale) / 2.0, (mh - ih * scale) / 2.0),
    }
  }

  pub fn from_mode(mode: ResizeMode, image_size: (u32, u32), model_size: (u32, u32)) -> Self {
    match mode {
      ResizeMode::Native => Self::identity(),
      ResizeMode::Stretch => Self::stretch(image_size, model_size),
      ResizeMode::Letterbox => Self::fit(image_size, model_size),
    }
  }

  /// 模型空间角点 → 源图像像素角点: `(in - pad) / scale`
  pub fn invert(&self, c: &[f32; 4]) -> [f32; 4] {
    [
      (c[0] - self.pad.0) / self.scale.0,
      (c[1] - self.pad.1) / self.scale.1,
      (c[2] - self.pad.0) / self.scale.0,
      (c[3] - self.pad.1) / self.scale.1,
    ]
  }
}

/// 把模型空间的 (cx, cy, w, h) 映射到调用方要求的坐标空间，
/// 结果总是落在源图像内。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateMapper {
  letterbox: Letterbox,
  image_size: (u32, u32),
  mode: CoordinateMode,
}

impl CoordinateMapper {
  pub fn new(letterbox: Letterbox, image_size: (u32, u32), mode: CoordinateMode) -> Self {
    Self {
      letterbox,
      image_size,
      mode,
    }
  }

  pub fn mode(&self) -> CoordinateMode {
    self.mode
  }

  pub fn map(&self, bbox: &[f32; 4]) -> [f32; 4] {
    let corners = self.letterbox.invert(&center_size_to_corners(bbox));

    match self.mode {
      CoordinateMode::PixelCorners => {
        let max_x = self.image_size.0.saturating_sub(1) as f32;
        let max_y = self.image_size.1.saturating_sub(1) as f32;
        [
          corners[0].clamp(0.0, max_x),
          corners[1].clamp(0.0, max_y),
          corners[2].clamp(0.0, max_x),
          corners[3].clamp(0.0, max_y),
        ]
      }
      CoordinateMode::NormalizedCorners => normalize_corners(&corners, self.image_size),
      CoordinateMode::NormalizedCenterSize => {
        corners_to_center_size(&normalize_corners(&corners, self.image_size))
      }
    }
  }
}
