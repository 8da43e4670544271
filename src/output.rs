// 该文件是 Jingjie （警戒） 项目的一部分。
// src/output.rs - 输出定义
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use crate::{frame::Frame, input::VideoSpec};

/// 显示端：接收（标注帧，状态文本）对
pub trait Render {
  type Error;
  fn render(&mut self, frame: Option<&Frame>, status: &str) -> Result<(), Self::Error>;
}

impl<R: Render> Render for &mut R {
  type Error = R::Error;

  fn render(&mut self, frame: Option<&Frame>, status: &str) -> Result<(), Self::Error> {
    (**self).render(frame, status)
  }
}

/// 视频写入器
pub trait OutputWriter {
  type Error: std::error::Error + Send + Sync + 'static;

  /// 写入一帧
  fn write_frame(&mut self, frame: &Frame) -> Result<(), Self::Error>;

  /// 完成写入，返回写入的帧数
  fn finish(self) -> Result<u64, Self::Error>;
}

/// 按源视频的尺寸与帧率创建写入器
pub trait VideoSink {
  type Writer: OutputWriter;
  type Error: std::error::Error + Send + Sync + 'static;

  fn create(&self, path: &Path, spec: VideoSpec) -> Result<Self::Writer, Self::Error>;
}

pub mod draw;

#[cfg(feature = "save_image_file")]
mod save_image_file;
#[cfg(feature = "save_image_file")]
pub use self::save_image_file::{SaveImageFileError, SaveImageFileOutput};

#[cfg(feature = "gstreamer_output")]
mod gstreamer_video_output;
#[cfg(feature = "gstreamer_output")]
pub use self::gstreamer_video_output::{
  GStreamerVideoOutput, GStreamerVideoOutputError, GStreamerVideoSink,
};
