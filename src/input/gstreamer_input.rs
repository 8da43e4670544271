// 该文件是 Jingjie （警戒） 项目的一部分。
// src/input/gstreamer_input.rs - GStreamer 输入
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! # GStreamer 视频输入模块
//!
//! 基于 GStreamer 解码视频文件或采集 V4L2 摄像头，输出 BGR 顺序的帧。
//!
//! ## 系统依赖
//!
//! 使用前需要安装 GStreamer 开发库：
//!
//! **Ubuntu/Debian:**
//! ```bash
//! sudo apt-get install libgstreamer1.0-dev libgstreamer-plugins-base1.0-dev
//! ```
//!
//! ## URL 格式
//!
//! - 视频文件：`gst://file/path/to/video.mp4`
//! - 摄像头：`gst://camera/dev/video0?width=640&height=480&fps=15`
//!
//! ```no_run
//! use jingjie::{FromUrl, input::GStreamerInputPipelineBuilder};
//! use url::Url;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let url = Url::parse("gst://file/tmp/video.mp4")?;
//! let input = GStreamerInputPipelineBuilder::from_url(&url)?.build()?;
//!
//! for frame in input {
//!     println!("帧: {}x{}", frame.width(), frame.height());
//! }
//! # Ok(())
//! # }
//! ```

use std::{collections::HashMap, path::Path};

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{ChannelOrder, Frame},
  input::{CameraDevice, VideoReader, VideoSource, VideoSpec},
};

/// 打开管道时等待状态切换的最长时间
const OPEN_TIMEOUT_SECONDS: u64 = 5;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_CAMERA_FPS: u32 = 15;

/// GStreamer 输入错误类型
#[derive(Error, Debug)]
pub enum GStreamerInputError {
  /// URI scheme 不匹配（期望 "gst://file" 或 "gst://camera"）
  #[error("URI scheme mismatch")]
  SchemeMismatch,
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  #[error("Failed to get appsink element")]
  AppSinkNotFound,
  #[error("Failed to convert element to appsink")]
  AppSinkConversionFailed,
  #[error("Failed to get video info from caps")]
  VideoInfoError,
  #[error("Unsupported video format: {0:?}")]
  UnsupportedFormat(gst_video::VideoFormat),
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  #[error("Buffer size mismatch: expected {expected} bytes, got {actual} bytes")]
  BufferSizeMismatch { expected: usize, actual: usize },
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
}

#[derive(Debug, Clone)]
enum GStreamerInputBuilderItem {
  FileSource(String),
  CameraSource {
    camera: String,
    width: u32,
    height: u32,
    fps: u32,
  },
  TargetFormat {
    format: String,
  },
}

impl GStreamerInputBuilderItem {
  fn to_pipeline(&self) -> String {
    match self {
      GStreamerInputBuilderItem::FileSource(_) => {
        "filesrc name=source ! decodebin ! videoconvert".to_string()
      }
      GStreamerInputBuilderItem::CameraSource {
        width,
        height,
        fps,
        ..
      } => {
        format!(
          "v4l2src name=source ! videoconvert ! videoscale ! videorate ! video/x-raw,width={},height={},framerate={}/1",
          width, height, fps
        )
      }
      GStreamerInputBuilderItem::TargetFormat { format } => {
        format!("videoconvert ! video/x-raw,format={}", format)
      }
    }
  }

  fn is_live(&self) -> bool {
    matches!(self, GStreamerInputBuilderItem::CameraSource { .. })
  }
}

/// GStreamer 输入管道构建器
#[derive(Debug, Clone)]
pub struct GStreamerInputPipelineBuilder {
  source: GStreamerInputBuilderItem,
  target: GStreamerInputBuilderItem,
}

impl GStreamerInputPipelineBuilder {
  pub fn file(path: impl AsRef<Path>) -> Self {
    Self::with_source(GStreamerInputBuilderItem::FileSource(
      path.as_ref().to_string_lossy().into_owned(),
    ))
  }

  pub fn camera(device: impl Into<String>, width: u32, height: u32, fps: u32) -> Self {
    Self::with_source(GStreamerInputBuilderItem::CameraSource {
      camera: device.into(),
      width,
      height,
      fps,
    })
  }

  fn with_source(source: GStreamerInputBuilderItem) -> Self {
    Self {
      source,
      target: GStreamerInputBuilderItem::TargetFormat {
        format: "BGR".to_string(),
      },
    }
  }

  fn build_camera_pipeline(path: &str, query: &HashMap<String, String>) -> Self {
    let width = query
      .get("width")
      .and_then(|v| v.parse::<u32>().ok())
      .unwrap_or(DEFAULT_CAMERA_WIDTH);
    let height = query
      .get("height")
      .and_then(|v| v.parse::<u32>().ok())
      .unwrap_or(DEFAULT_CAMERA_HEIGHT);
    let fps = query
      .get("fps")
      .and_then(|v| v.parse::<u32>().ok())
      .unwrap_or(DEFAULT_CAMERA_FPS);

    Self::camera(path, width, height, fps)
  }

  pub fn description(&self) -> String {
    let sink = if self.source.is_live() {
      "appsink name=sink max-buffers=2 drop=true"
    } else {
      "appsink name=sink sync=false"
    };
    format!(
      "{} ! {} ! {}",
      self.source.to_pipeline(),
      self.target.to_pipeline(),
      sink
    )
  }

  /// 构建并启动管道；文件不存在或设备无法打开时返回错误
  pub fn build(self) -> Result<GStreamerInput, GStreamerInputError> {
    gst::init()?;

    let description = self.description();
    info!("GStreamer pipeline description: {}", description);

    let pipeline = gst::parse::launch(&description)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| GStreamerInputError::PipelineError("Failed to create pipeline".to_string()))?;

    // 路径通过属性设置，避免在管道描述中转义
    let source = pipeline
      .by_name("source")
      .ok_or_else(|| GStreamerInputError::PipelineError("Source element not found".to_string()))?;
    match &self.source {
      GStreamerInputBuilderItem::FileSource(path) => source.set_property("location", path.as_str()),
      GStreamerInputBuilderItem::CameraSource { camera, .. } => {
        source.set_property("device", camera.as_str())
      }
      GStreamerInputBuilderItem::TargetFormat { .. } => {}
    }

    let appsink = pipeline
      .by_name("sink")
      .ok_or(GStreamerInputError::AppSinkNotFound)?
      .downcast::<gst_app::AppSink>()
      .map_err(|_| GStreamerInputError::AppSinkConversionFailed)?;

    let input = GStreamerInput {
      pipeline,
      appsink,
      spec: None,
    };
    input.start(self.source.is_live())
  }
}

impl FromUrlWithScheme for GStreamerInputPipelineBuilder {
  const SCHEME: &'static str = "gst";
}

impl FromUrl for GStreamerInputPipelineBuilder {
  type Error = GStreamerInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(GStreamerInputError::SchemeMismatch);
    }

    let query: HashMap<String, String> = url
      .query_pairs()
      .map(|(k, v)| (String::from(k), String::from(v)))
      .collect();

    match url.host_str() {
      Some("camera") => Ok(Self::build_camera_pipeline(url.path(), &query)),
      Some("file") => Ok(Self::file(url.path())),
      _ => Err(GStreamerInputError::SchemeMismatch),
    }
  }
}

/// GStreamer 视频输入
///
/// 管理 GStreamer 管道和 appsink，按 BGR 顺序迭代视频帧；释放即停止管道。
pub struct GStreamerInput {
  pipeline: gst::Pipeline,
  appsink: gst_app::AppSink,
  spec: Option<VideoSpec>,
}

impl Drop for GStreamerInput {
  fn drop(&mut self) {
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer pipeline: {}", e);
    }
  }
}

impl GStreamerInput {
  fn start(mut self, live: bool) -> Result<Self, GStreamerInputError> {
    let timeout = gst::ClockTime::from_seconds(OPEN_TIMEOUT_SECONDS);

    if live {
      self.pipeline.set_state(gst::State::Playing)?;
      let (result, _, _) = self.pipeline.state(timeout);
      result?;
    } else {
      // 文件源先预滚，以便在播放前拿到尺寸与帧率
      self.pipeline.set_state(gst::State::Paused)?;
      let (result, _, _) = self.pipeline.state(timeout);
      result?;
      self.spec = self.negotiated_spec();
      self.pipeline.set_state(gst::State::Playing)?;
    }

    if let Some(spec) = &self.spec {
      info!(
        "视频输入: {}x{} @ {}/{} fps",
        spec.width, spec.height, spec.fps_num, spec.fps_den
      );
    }

    Ok(self)
  }

  fn negotiated_spec(&self) -> Option<VideoSpec> {
    let caps = self.appsink.static_pad("sink")?.current_caps()?;
    let info = gst_video::VideoInfo::from_caps(&caps).ok()?;
    let fps = info.fps();
    Some(VideoSpec::new(
      info.width(),
      info.height(),
      fps.numer(),
      fps.denom(),
    ))
  }

  fn pull_sample(&self) -> Option<gst::Sample> {
    self
      .appsink
      .pull_sample()
      .map_err(|e| {
        debug!("No more samples: {}", e);
        e
      })
      .ok()
  }
}

impl Iterator for GStreamerInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    let sample = self.pull_sample()?;
    convert_sample_to_frame(&sample)
      .map_err(|e| {
        error!("Failed to fetch sample: {}", e);
        e
      })
      .ok()
  }
}

impl VideoReader for GStreamerInput {
  fn spec(&self) -> VideoSpec {
    self
      .spec
      .or_else(|| self.negotiated_spec())
      .unwrap_or_else(|| VideoSpec::new(0, 0, 0, 1))
  }
}

fn convert_sample_to_frame(sample: &gst::Sample) -> Result<Frame, GStreamerInputError> {
  let buffer = sample
    .buffer()
    .ok_or_else(|| GStreamerInputError::PipelineError("No buffer in sample".to_string()))?;
  let caps = sample
    .caps()
    .ok_or_else(|| GStreamerInputError::PipelineError("No caps in sample".to_string()))?;

  let video_info =
    gst_video::VideoInfo::from_caps(caps).map_err(|_| GStreamerInputError::VideoInfoError)?;

  let order = match video_info.format() {
    gst_video::VideoFormat::Bgr => ChannelOrder::Bgr,
    gst_video::VideoFormat::Rgb => ChannelOrder::Rgb,
    other => return Err(GStreamerInputError::UnsupportedFormat(other)),
  };

  let width = video_info.width() as usize;
  let height = video_info.height() as usize;
  let stride = video_info.stride()[0] as usize;
  let row_bytes = width * 3;

  let map = buffer.map_readable().map_err(|e| {
    GStreamerInputError::PipelineError(format!("Failed to map buffer for reading: {}", e))
  })?;
  let data = map.as_slice();

  let expected = if height == 0 {
    0
  } else {
    stride * (height - 1) + row_bytes
  };
  if data.len() < expected {
    return Err(GStreamerInputError::BufferSizeMismatch {
      expected,
      actual: data.len(),
    });
  }

  // 去掉每行末尾的对齐填充
  let mut pixels = Vec::with_capacity(row_bytes * height);
  for row in 0..height {
    let start = row * stride;
    pixels.extend_from_slice(&data[start..start + row_bytes]);
  }

  Frame::new(width as u32, height as u32, order, pixels)
    .map_err(|e| GStreamerInputError::PipelineError(e.to_string()))
}

/// 按路径打开视频文件
#[derive(Debug, Clone, Copy, Default)]
pub struct GStreamerVideoSource;

impl VideoSource for GStreamerVideoSource {
  type Reader = GStreamerInput;
  type Error = GStreamerInputError;

  fn open(&self, path: &Path) -> Result<Self::Reader, Self::Error> {
    if !path.is_file() {
      return Err(GStreamerInputError::PipelineError(format!(
        "File not found: {}",
        path.display()
      )));
    }
    GStreamerInputPipelineBuilder::file(path).build()
  }
}

/// V4L2 摄像头
#[derive(Debug, Clone)]
pub struct GStreamerCamera {
  builder: GStreamerInputPipelineBuilder,
}

impl GStreamerCamera {
  pub fn new(device: impl Into<String>, width: u32, height: u32, fps: u32) -> Self {
    Self {
      builder: GStreamerInputPipelineBuilder::camera(device, width, height, fps),
    }
  }
}

impl FromUrl for GStreamerCamera {
  type Error = GStreamerInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.host_str() != Some("camera") {
      return Err(GStreamerInputError::SchemeMismatch);
    }
    Ok(Self {
      builder: GStreamerInputPipelineBuilder::from_url(url)?,
    })
  }
}

impl CameraDevice for GStreamerCamera {
  type Camera = GStreamerInput;
  type Error = GStreamerInputError;

  fn open(&self) -> Result<Self::Camera, Self::Error> {
    self.builder.clone().build()
  }
}
