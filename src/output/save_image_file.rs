// 该文件是 Jingjie （警戒） 项目的一部分。
// src/output/save_image_file.rs - 保存图像文件
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

use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame, output::Render};

/// 将标注帧保存为图像文件
///
/// 写入多帧时后一帧覆盖前一帧，文件中总是最新的画面。
pub struct SaveImageFileOutput {
  path: PathBuf,
  last_status: Option<String>,
}

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveImageFileOutput::new(uri.path()))
  }
}

impl SaveImageFileOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      last_status: None,
    }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// 最近一次收到的状态文本
  pub fn last_status(&self) -> Option<&str> {
    self.last_status.as_deref()
  }

  fn save_image(&self, frame: &Frame) -> Result<(), SaveImageFileError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    frame.to_rgb_image().save(&self.path)?;
    info!("保存图像到文件: {}", self.path.display());

    Ok(())
  }
}

impl Render for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render(&mut self, frame: Option<&Frame>, status: &str) -> Result<(), Self::Error> {
    info!("状态: {}", status);
    self.last_status = Some(status.to_string());
    match frame {
      Some(frame) => self.save_image(frame),
      None => {
        warn!("没有可保存的图像");
        Ok(())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::frame::ChannelOrder;

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("file:///tmp/out.png").unwrap();
    assert!(matches!(
      SaveImageFileOutput::from_url(&url),
      Err(SaveImageFileError::SchemeMismatch(_))
    ));
  }

  #[test]
  fn saves_frame_in_rgb_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("out.png");
    let mut output = SaveImageFileOutput::new(&path);

    let frame = Frame::filled(3, 2, ChannelOrder::Bgr, [200, 10, 20]);
    output.render(Some(&frame), "No weapons detected").unwrap();

    let saved = image::open(&path).unwrap().to_rgb8();
    assert_eq!(saved.dimensions(), (3, 2));
    assert_eq!(saved.get_pixel(1, 1).0, [200, 10, 20]);
    assert_eq!(output.last_status(), Some("No weapons detected"));
  }

  #[test]
  fn absent_frame_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.png");
    let mut output = SaveImageFileOutput::new(&path);
    output.render(None, "No frame provided").unwrap();
    assert!(!path.exists());
    assert_eq!(output.last_status(), Some("No frame provided"));
  }
}
