// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - 图像帧与只读视图定义
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

const RGB_CHANNELS: usize = 3;

/// 像素排列方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
  /// 交错 8 位 RGB (NHWC)
  Rgb888,
  /// 平面 8 位 RGB (NCHW)
  Rgb888Planar,
}

impl PixelFormat {
  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }
}

/// 像素缓冲区的字节数，溢出时返回 `InvalidImage`
fn buffer_len(format: PixelFormat, width: u32, height: u32) -> Result<usize, DetectError> {
  format
    .channels()
    .checked_mul(width as usize)
    .and_then(|len| len.checked_mul(height as usize))
    .ok_or_else(|| {
      DetectError::InvalidImage(format!("图像尺寸过大: {}x{}", width, height))
    })
}

/// 借用的只读图像视图，流水线只读取尺寸和像素
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a> {
  data: &'a [u8],
  width: u32,
  height: u32,
  format: PixelFormat,
}

impl<'a> ImageView<'a> {
  pub fn new(
    data: &'a [u8],
    width: u32,
    height: u32,
    format: PixelFormat,
  ) -> Result<Self, DetectError> {
    if width == 0 || height == 0 {
      return Err(DetectError::InvalidImage(format!(
        "图像尺寸不能为零: {}x{}",
        width, height
      )));
    }

    let expected = buffer_len(format, width, height)?;
    if data.len() != expected {
      return Err(DetectError::InvalidImage(format!(
        "数据长度不匹配: 期望长度 {}, 实际长度 {}",
        expected,
        data.len()
      )));
    }

    Ok(Self {
      data,
      width,
      height,
      format,
    })
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  /// (宽, 高)
  pub fn size(&self) -> (u32, u32) {
    (self.width, self.height)
  }

  pub fn format(&self) -> PixelFormat {
    self.format
  }

  pub fn pixels(&self) -> &'a [u8] {
    self.data
  }

  pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
    if x >= self.width || y >= self.height {
      return None;
    }
    let (w, h) = (self.width as usize, self.height as usize);
    let (x, y) = (x as usize, y as usize);
    match self.format {
      PixelFormat::Rgb888 => {
        let idx = (y * w + x) * RGB_CHANNELS;
        Some([self.data[idx], self.data[idx + 1], self.data[idx + 2]])
      }
      PixelFormat::Rgb888Planar => {
        let plane = w * h;
        let idx = y * w + x;
        Some([
          self.data[idx],
          self.data[plane + idx],
          self.data[2 * plane + idx],
        ])
      }
    }
  }
}

/// 解码器产出的自有像素缓冲区，调用方持有并在使用完后释放
#[derive(Debug, Clone)]
pub struct RgbFrame {
  data: Box<[u8]>,
  width: u32,
  height: u32,
  format: PixelFormat,
}

impl RgbFrame {
  pub fn new(
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
  ) -> Result<Self, DetectError> {
    ImageView::new(&data, width, height, format)?;
    Ok(Self {
      data: data.into_boxed_slice(),
      width,
      height,
      format,
    })
  }

  /// 全黑帧，常用于只关心张量的测试或回放后端
  pub fn blank(width: u32, height: u32) -> Result<Self, DetectError> {
    let size = buffer_len(PixelFormat::Rgb888, width, height)?;
    let mut data = Vec::new();
    data.try_reserve_exact(size)?;
    data.resize(size, 0u8);
    Self::new(data, width, height, PixelFormat::Rgb888)
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn format(&self) -> PixelFormat {
    self.format
  }

  pub fn view(&self) -> ImageView<'_> {
    ImageView {
      data: &self.data,
      width: self.width,
      height: self.height,
      format: self.format,
    }
  }
}

impl AsRef<[u8]> for RgbFrame {
  fn as_ref(&self) -> &[u8] {
    &self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_view_rejects_wrong_length() {
    let data = vec![0u8; 10];
    let err = ImageView::new(&data, 2, 2, PixelFormat::Rgb888).unwrap_err();
    assert!(matches!(err, DetectError::InvalidImage(_)));
  }

  #[test]
  fn test_view_rejects_zero_size() {
    let err = ImageView::new(&[], 0, 4, PixelFormat::Rgb888).unwrap_err();
    assert!(matches!(err, DetectError::InvalidImage(_)));
  }

  #[test]
  fn test_pixel_lookup_interleaved_and_planar() {
    // 2x1 图像: (1,2,3) (4,5,6)
    let nhwc = [1u8, 2, 3, 4, 5, 6];
    let view = ImageView::new(&nhwc, 2, 1, PixelFormat::Rgb888).unwrap();
    assert_eq!(view.pixel(1, 0), Some([4, 5, 6]));

    let nchw = [1u8, 4, 2, 5, 3, 6];
    let view = ImageView::new(&nchw, 2, 1, PixelFormat::Rgb888Planar).unwrap();
    assert_eq!(view.pixel(1, 0), Some([4, 5, 6]));
    assert_eq!(view.pixel(2, 0), None, "out of range pixel");
  }

  #[test]
  fn test_blank_frame_view() {
    let frame = RgbFrame::blank(640, 480).unwrap();
    let view = frame.view();
    assert_eq!(view.size(), (640, 480));
    assert_eq!(view.pixels().len(), 640 * 480 * 3);
  }

  #[test]
  fn test_oversized_dimensions_rejected() {
    let err = ImageView::new(&[], u32::MAX, u32::MAX, PixelFormat::Rgb888Planar).unwrap_err();
    assert!(matches!(err, DetectError::InvalidImage(_)), "{}", err);

    let err = RgbFrame::blank(u32::MAX, u32::MAX).unwrap_err();
    assert!(matches!(err, DetectError::InvalidImage(_)), "{}", err);
  }
}
