// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Datelike, Utc};
use image::RgbImage;
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::RgbFrame,
  labels::display_label,
  model::DetectionSet,
  output::Render,
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("帧计数器不可用")]
  CounterPoisoned,
}

/// 文本记录的格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
  /// `类别 cx cy w h`，归一化中心点格式
  Annotation,
  /// `标签, 分数, b0, b1, b2, b3`，保留结果自身的坐标空间
  Record { label_with_name: bool },
}

impl RecordKind {
  fn with(kind: Option<&str>) -> Self {
    match kind {
      Some("id") => RecordKind::Record {
        label_with_name: false,
      },
      Some(_) => RecordKind::Record {
        label_with_name: true,
      },
      None => RecordKind::Annotation,
    }
  }

  fn lines(&self, result: &DetectionSet) -> Vec<String> {
    match *self {
      RecordKind::Annotation => result.annotation_lines(),
      RecordKind::Record { label_with_name } => result
        .iter()
        .map(|item| {
          format!(
            "{}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
            display_label(item.category, label_with_name),
            item.score,
            item.bbox[0],
            item.bbox[1],
            item.bbox[2],
            item.bbox[3]
          )
        })
        .collect(),
    }
  }
}

/// 按日期分目录保存每帧的检测记录
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  kind: RecordKind,
  frame_counters: Mutex<u16>,
  always: bool,
  save_image: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let record = uri
      .query_pairs()
      .find(|(k, _)| k == "record")
      .map(|(_, v)| v.into_owned());
    let always = uri.query_pairs().any(|(k, _)| k == "always");
    let save_image = uri.query_pairs().any(|(k, _)| k == "image");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      kind: RecordKind::with(record.as_deref()),
      frame_counters: Mutex::new(0),
      always,
      save_image,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> Result<u16, DirectoryRecordOutputError> {
    let mut counter = self
      .frame_counters
      .lock()
      .map_err(|_| DirectoryRecordOutputError::CounterPoisoned)?;
    let id = counter.wrapping_add(1);
    *counter = id;
    Ok(id)
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    Ok(directory.join(format!(
      "{}-{:04X}.txt",
      now.format("%H-%M-%S"),
      self.frame_id()?
    )))
  }

  fn save_frame(&self, frame: &RgbFrame, path: &Path) -> Result<(), DirectoryRecordOutputError> {
    let view = frame.view();
    let image = RgbImage::from_fn(frame.width(), frame.height(), |x, y| {
      image::Rgb(view.pixel(x, y).unwrap_or([0, 0, 0]))
    });
    image.save(path.with_extension("png"))?;
    Ok(())
  }
}

impl Render<RgbFrame, DetectionSet> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &RgbFrame, result: &DetectionSet) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      return Ok(());
    }

    let path = self.frame_path()?;
    std::fs::write(&path, self.kind.lines(result).join("\n"))?;
    if self.save_image {
      self.save_frame(frame, &path)?;
    }
    debug!("记录 {} 条检测结果到 {}", result.len(), path.display());
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{config::CoordinateMode, model::Detection};

  fn one_detection() -> DetectionSet {
    DetectionSet {
      items: vec![Detection {
        category: 0,
        score: 0.9,
        bbox: [225.0, 227.0, 273.0, 288.0],
      }]
      .into_boxed_slice(),
      image_size: (640, 640),
      mode: CoordinateMode::PixelCorners,
      degenerate_skipped: 0,
    }
  }

  fn files_with_extension(root: &Path, ext: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
      for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
          stack.push(path);
        } else if path.extension().is_some_and(|e| e == ext) {
          found.push(path);
        }
      }
    }
    found
  }

  fn output_for(dir: &Path, query: &str) -> DirectoryRecordOutput {
    let url = url::Url::parse(&format!("folder://{}?{}", dir.display(), query)).unwrap();
    DirectoryRecordOutput::from_url(&url).unwrap()
  }

  #[test]
  fn test_annotation_record_written() {
    let dir = tempfile::tempdir().unwrap();
    let output = output_for(dir.path(), "image");
    let frame = RgbFrame::blank(640, 640).unwrap();
    output.render_result(&frame, &one_detection()).unwrap();

    let records = files_with_extension(dir.path(), "txt");
    assert_eq!(records.len(), 1);
    let text = std::fs::read_to_string(&records[0]).unwrap();
    assert!(text.starts_with("0 0.3890"), "annotation: {}", text);
    assert_eq!(files_with_extension(dir.path(), "png").len(), 1);
  }

  #[test]
  fn test_named_record_format() {
    let dir = tempfile::tempdir().unwrap();
    let output = output_for(dir.path(), "record=name");
    let frame = RgbFrame::blank(640, 640).unwrap();
    output.render_result(&frame, &one_detection()).unwrap();

    let records = files_with_extension(dir.path(), "txt");
    let text = std::fs::read_to_string(&records[0]).unwrap();
    assert_eq!(text, "person, 0.9000, 225.0000, 227.0000, 273.0000, 288.0000");
    assert!(files_with_extension(dir.path(), "png").is_empty());
  }

  #[test]
  fn test_empty_result_skipped_unless_always() {
    let dir = tempfile::tempdir().unwrap();
    let frame = RgbFrame::blank(8, 8).unwrap();
    let empty = DetectionSet::empty((8, 8), CoordinateMode::PixelCorners);

    output_for(dir.path(), "").render_result(&frame, &empty).unwrap();
    assert!(files_with_extension(dir.path(), "txt").is_empty());

    output_for(dir.path(), "always").render_result(&frame, &empty).unwrap();
    assert_eq!(files_with_extension(dir.path(), "txt").len(), 1);
  }

  #[test]
  fn test_frame_ids_increase() {
    let dir = tempfile::tempdir().unwrap();
    let output = output_for(dir.path(), "");
    assert_eq!(output.frame_id().unwrap(), 1);
    assert_eq!(output.frame_id().unwrap(), 2);
  }
}
