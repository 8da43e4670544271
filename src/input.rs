// 该文件是 Jingjie （警戒） 项目的一部分。
// src/input.rs - 视频/图像输入
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

use std::path::Path;

use crate::frame::Frame;

#[cfg(feature = "read_image_file")]
mod read_image_file;
#[cfg(feature = "read_image_file")]
pub use self::read_image_file::{ImageFileInput, ImageFileInputError};

#[cfg(feature = "gstreamer_input")]
mod gstreamer_input;
#[cfg(feature = "gstreamer_input")]
pub use self::gstreamer_input::{
  GStreamerCamera, GStreamerInput, GStreamerInputError, GStreamerInputPipelineBuilder,
  GStreamerVideoSource,
};

const DEFAULT_FPS: i32 = 30;

/// 视频流的尺寸与帧率
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoSpec {
  pub width: u32,
  pub height: u32,
  pub fps_num: i32,
  pub fps_den: i32,
}

impl VideoSpec {
  /// 帧率无效（分子或分母不为正）时使用 30 fps
  pub fn new(width: u32, height: u32, fps_num: i32, fps_den: i32) -> Self {
    let (fps_num, fps_den) = if fps_num > 0 && fps_den > 0 {
      (fps_num, fps_den)
    } else {
      (DEFAULT_FPS, 1)
    };
    Self {
      width,
      height,
      fps_num,
      fps_den,
    }
  }

  pub fn fps(&self) -> f64 {
    self.fps_num as f64 / self.fps_den as f64
  }

  /// 单帧时长（纳秒）
  pub fn frame_duration_ns(&self) -> u64 {
    1_000_000_000 * self.fps_den as u64 / self.fps_num as u64
  }
}

/// 按路径打开的视频源
pub trait VideoSource {
  type Reader: VideoReader;
  type Error: std::error::Error + Send + Sync + 'static;

  fn open(&self, path: &Path) -> Result<Self::Reader, Self::Error>;
}

/// 已打开的视频，逐帧产出采集顺序（BGR）的帧
pub trait VideoReader: Iterator<Item = Frame> {
  fn spec(&self) -> VideoSpec;
}

/// 摄像头设备；每次 `open` 得到一个新的采集句柄，句柄释放即关闭设备
pub trait CameraDevice {
  type Camera: Iterator<Item = Frame>;
  type Error: std::error::Error + Send + Sync + 'static;

  fn open(&self) -> Result<Self::Camera, Self::Error>;
}
