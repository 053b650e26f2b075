// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input.rs - 图像输入
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

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, error::DetectError, frame::RgbFrame};

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[derive(Error, Debug)]
pub enum InputError {
  #[cfg(feature = "read_image_file")]
  #[error("Image file input error: {0}")]
  ImageFileInputError(#[from] ImageFileInputError),
  #[error("Blank input error: {0}")]
  BlankInputError(#[from] BlankInputError),
  #[error("URI scheme mismatch")]
  SchemeMismatch,
}

#[derive(Error, Debug)]
pub enum BlankInputError {
  #[error("URI schema mismatch")]
  SchemaMismatch,
  #[error("Invalid size: {0}")]
  InvalidSize(String),
  #[error("Frame error: {0}")]
  Frame(#[from] DetectError),
}

const BLANK_DEFAULT_SIZE: (u32, u32) = (640, 640);

/// 产出一张全黑帧，配合张量回放后端使用（`blank:?size=640x480`）
pub struct BlankInput {
  frame: Option<RgbFrame>,
}

impl FromUrlWithScheme for BlankInput {
  const SCHEME: &'static str = "blank";
}

impl FromUrl for BlankInput {
  type Error = BlankInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(BlankInputError::SchemaMismatch);
    }

    let mut size = BLANK_DEFAULT_SIZE;
    for (k, v) in url.query_pairs() {
      if k == "size" {
        size = parse_size(&v).ok_or_else(|| BlankInputError::InvalidSize(v.to_string()))?;
      }
    }

    Ok(BlankInput {
      frame: Some(RgbFrame::blank(size.0, size.1)?),
    })
  }
}

fn parse_size(s: &str) -> Option<(u32, u32)> {
  let (w, h) = s.split_once('x')?;
  Some((w.parse().ok()?, h.parse().ok()?))
}

impl Iterator for BlankInput {
  type Item = RgbFrame;

  fn next(&mut self) -> Option<Self::Item> {
    self.frame.take()
  }
}

pub enum InputWrapper {
  #[cfg(feature = "read_image_file")]
  ReadImageFile(ImageFileInput),
  Blank(BlankInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    #[cfg(feature = "read_image_file")]
    {
      if url.scheme() == ImageFileInput::SCHEME {
        let input = ImageFileInput::from_url(url)?;
        return Ok(InputWrapper::ReadImageFile(input));
      }
    }
    if url.scheme() == BlankInput::SCHEME {
      let input = BlankInput::from_url(url)?;
      return Ok(InputWrapper::Blank(input));
    }
    Err(InputError::SchemeMismatch)
  }
}

impl Iterator for InputWrapper {
  type Item = RgbFrame;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      #[cfg(feature = "read_image_file")]
      InputWrapper::ReadImageFile(input) => input.next(),
      InputWrapper::Blank(input) => input.next(),
    }
  }
}
