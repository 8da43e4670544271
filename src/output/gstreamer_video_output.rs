// 该文件是 Jingjie （警戒） 项目的一部分。
// src/output/gstreamer_video_output.rs - GStreamer 视频文件输出
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

//! # GStreamer 视频文件输出
//!
//! 通过 appsrc 把 RGB 帧编码为视频文件，容器格式由扩展名决定：
//!
//! - **MP4** (H.264)，默认
//! - **MKV** (Matroska)
//! - **AVI**
//! - **WebM** (VP8)

use std::path::Path;

use gstreamer::{self as gst, prelude::*};
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
  frame::{ChannelOrder, Frame},
  input::VideoSpec,
  output::{OutputWriter, VideoSink},
};

/// GStreamer 视频输出错误类型
#[derive(Error, Debug)]
pub enum GStreamerVideoOutputError {
  #[error("GStreamer error: {0}")]
  GStreamerError(#[from] gst::glib::Error),
  #[error("GStreamer boolean error: {0}")]
  GStreamerBoolError(#[from] gst::glib::BoolError),
  #[error("Failed to get appsrc element")]
  AppSrcNotFound,
  #[error("Failed to convert element to appsrc")]
  AppSrcConversionFailed,
  #[error("Pipeline error: {0}")]
  PipelineError(String),
  #[error("State change error: {0}")]
  StateChangeError(#[from] gst::StateChangeError),
  #[error("Flow error: {0:?}")]
  FlowError(gst::FlowError),
  #[error("Buffer creation error")]
  BufferCreationError,
  #[error("Frame size mismatch: expected {expected:?}, got {actual:?}")]
  FrameSizeMismatch {
    expected: (u32, u32),
    actual: (u32, u32),
  },
}

fn encoder_for(path: &Path) -> &'static str {
  let extension = path
    .extension()
    .and_then(|e| e.to_str())
    .map(str::to_ascii_lowercase);
  match extension.as_deref() {
    Some("mkv") => "video/x-raw,format=I420 ! x264enc speed-preset=fast ! h264parse ! matroskamux",
    Some("avi") => "video/x-raw,format=I420 ! x264enc ! avimux",
    Some("webm") => "vp8enc ! webmmux",
    _ => "video/x-raw,format=I420 ! x264enc speed-preset=fast ! h264parse ! mp4mux",
  }
}

/// 按扩展名选择编码器的视频写入器工厂
#[derive(Debug, Clone, Copy, Default)]
pub struct GStreamerVideoSink;

impl VideoSink for GStreamerVideoSink {
  type Writer = GStreamerVideoOutput;
  type Error = GStreamerVideoOutputError;

  fn create(&self, path: &Path, spec: VideoSpec) -> Result<Self::Writer, Self::Error> {
    GStreamerVideoOutput::create(path, spec)
  }
}

/// GStreamer 视频文件输出
///
/// 未调用 [`OutputWriter::finish`] 就释放时，文件可能缺少尾部索引。
pub struct GStreamerVideoOutput {
  pipeline: gst::Pipeline,
  appsrc: gst_app::AppSrc,
  info: gst_video::VideoInfo,
  spec: VideoSpec,
  frame_count: u64,
  finished: bool,
}

impl GStreamerVideoOutput {
  pub fn create(path: &Path, spec: VideoSpec) -> Result<Self, GStreamerVideoOutputError> {
    gst::init()?;

    let pipeline_desc = format!(
      "appsrc name=src ! videoconvert ! {} ! filesink name=sink",
      encoder_for(path)
    );
    info!("Creating video output pipeline: {}", pipeline_desc);

    let pipeline = gst::parse::launch(&pipeline_desc)?
      .downcast::<gst::Pipeline>()
      .map_err(|_| {
        GStreamerVideoOutputError::PipelineError("Failed to create pipeline".to_string())
      })?;

    let filesink = pipeline
      .by_name("sink")
      .ok_or_else(|| GStreamerVideoOutputError::PipelineError("filesink not found".to_string()))?;
    filesink.set_property("location", &*path.to_string_lossy());

    let appsrc = pipeline
      .by_name("src")
      .ok_or(GStreamerVideoOutputError::AppSrcNotFound)?
      .downcast::<gst_app::AppSrc>()
      .map_err(|_| GStreamerVideoOutputError::AppSrcConversionFailed)?;

    let info = gst_video::VideoInfo::builder(gst_video::VideoFormat::Rgb, spec.width, spec.height)
      .fps(gst::Fraction::new(spec.fps_num, spec.fps_den))
      .build()?;
    let caps = info.to_caps()?;

    appsrc.set_caps(Some(&caps));
    appsrc.set_format(gst::Format::Time);

    pipeline.set_state(gst::State::Playing)?;

    info!(
      "Video output initialized: {}x{} @ {}/{} fps -> {}",
      spec.width,
      spec.height,
      spec.fps_num,
      spec.fps_den,
      path.display()
    );

    Ok(GStreamerVideoOutput {
      pipeline,
      appsrc,
      info,
      spec,
      frame_count: 0,
      finished: false,
    })
  }

  fn push_frame(&mut self, frame: &Frame) -> Result<(), GStreamerVideoOutputError> {
    let row_bytes = frame.width() as usize * frame.channels();
    let stride = self.info.stride()[0] as usize;

    let mut buffer = gst::Buffer::with_size(self.info.size())
      .map_err(|_| GStreamerVideoOutputError::BufferCreationError)?;

    {
      let buffer_ref = buffer
        .get_mut()
        .ok_or(GStreamerVideoOutputError::BufferCreationError)?;

      let duration = self.spec.frame_duration_ns();
      buffer_ref.set_pts(gst::ClockTime::from_nseconds(self.frame_count * duration));
      buffer_ref.set_duration(gst::ClockTime::from_nseconds(duration));

      let mut map = buffer_ref.map_writable().map_err(|_| {
        GStreamerVideoOutputError::PipelineError("Failed to map buffer".to_string())
      })?;
      for (row, pixels) in frame.as_bytes().chunks_exact(row_bytes).enumerate() {
        let start = row * stride;
        map[start..start + row_bytes].copy_from_slice(pixels);
      }
    }

    self
      .appsrc
      .push_buffer(buffer)
      .map_err(GStreamerVideoOutputError::FlowError)?;
    self.frame_count += 1;

    Ok(())
  }
}

impl OutputWriter for GStreamerVideoOutput {
  type Error = GStreamerVideoOutputError;

  fn write_frame(&mut self, frame: &Frame) -> Result<(), Self::Error> {
    if (frame.width(), frame.height()) != (self.spec.width, self.spec.height) {
      return Err(GStreamerVideoOutputError::FrameSizeMismatch {
        expected: (self.spec.width, self.spec.height),
        actual: (frame.width(), frame.height()),
      });
    }

    if frame.order() == ChannelOrder::Rgb {
      self.push_frame(frame)
    } else {
      self.push_frame(&frame.convert(ChannelOrder::Rgb))
    }
  }

  fn finish(mut self) -> Result<u64, Self::Error> {
    self.finished = true;
    self
      .appsrc
      .end_of_stream()
      .map_err(GStreamerVideoOutputError::FlowError)?;

    // 等待 EOS 传到 filesink，保证容器尾部写完
    let bus = self
      .pipeline
      .bus()
      .ok_or_else(|| GStreamerVideoOutputError::PipelineError("Pipeline has no bus".to_string()))?;
    let message = bus.timed_pop_filtered(
      gst::ClockTime::NONE,
      &[gst::MessageType::Eos, gst::MessageType::Error],
    );

    let result = match message.as_ref().map(|m| m.view()) {
      Some(gst::MessageView::Error(err)) => {
        error!("Video output error: {}", err.error());
        Err(GStreamerVideoOutputError::PipelineError(
          err.error().to_string(),
        ))
      }
      _ => Ok(self.frame_count),
    };

    self.pipeline.set_state(gst::State::Null)?;
    info!(
      "Video output closed. Total frames written: {}",
      self.frame_count
    );
    result
  }
}

impl Drop for GStreamerVideoOutput {
  fn drop(&mut self) {
    if !self.finished {
      warn!("视频输出未正常结束，直接停止管道");
    }
    if let Err(e) = self.pipeline.set_state(gst::State::Null) {
      warn!("Failed to stop GStreamer video output pipeline: {}", e);
    }
  }
}
