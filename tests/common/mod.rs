// 该文件是 Jingjie （警戒） 项目的一部分。
// tests/common/mod.rs - 测试用的假网络、假视频源与显示端
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

#![allow(dead_code)]

use std::{
  convert::Infallible,
  io::{self, Write},
  path::{Path, PathBuf},
  sync::atomic::{AtomicUsize, Ordering},
};

use jingjie::{
  detector::{INPUT_SIZE, NetworkParams, WeaponDetector},
  frame::{Blob, ChannelOrder, Frame},
  input::{CameraDevice, VideoReader, VideoSource, VideoSpec},
  model::{LayerOutput, Network},
  output::{OutputWriter, Render, VideoSink, draw::Draw},
};

pub type Size = Blob<INPUT_SIZE, INPUT_SIZE>;

/// 无论输入是什么都返回同样的检测层输出
pub struct ScriptedNetwork {
  layers: Vec<LayerOutput>,
  calls: AtomicUsize,
}

impl ScriptedNetwork {
  pub fn new(rows: &[&[f32]]) -> Self {
    let layers = if rows.is_empty() {
      vec![LayerOutput::new(6, Vec::new()).unwrap()]
    } else {
      vec![LayerOutput::from_rows(rows).unwrap()]
    };
    Self {
      layers,
      calls: AtomicUsize::new(0),
    }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl Network<INPUT_SIZE, INPUT_SIZE> for ScriptedNetwork {
  type Error = Infallible;

  fn forward(&self, _blob: &Size) -> Result<Vec<LayerOutput>, Self::Error> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    Ok(self.layers.clone())
  }
}

/// 画面左上角偏亮时在中心报告一个 0.9 置信度的武器
pub struct BrightnessNetwork;

impl Network<INPUT_SIZE, INPUT_SIZE> for BrightnessNetwork {
  type Error = Infallible;

  fn forward(&self, blob: &Size) -> Result<Vec<LayerOutput>, Self::Error> {
    let data = if blob.as_slice()[0] > 0.5 {
      vec![0.5, 0.5, 0.25, 0.25, 1.0, 0.9]
    } else {
      Vec::new()
    };
    Ok(vec![LayerOutput::new(6, data).unwrap()])
  }
}

/// 前向推理总是失败
pub struct BrokenNetwork;

impl Network<INPUT_SIZE, INPUT_SIZE> for BrokenNetwork {
  type Error = io::Error;

  fn forward(&self, _blob: &Size) -> Result<Vec<LayerOutput>, Self::Error> {
    Err(io::Error::other("推理后端不可用"))
  }
}

pub fn detector<N: Network<INPUT_SIZE, INPUT_SIZE>>(network: N) -> WeaponDetector<N> {
  WeaponDetector::new(network, NetworkParams::default(), Draw::default())
}

pub fn dark_frame(width: u32, height: u32) -> Frame {
  Frame::filled(width, height, ChannelOrder::Bgr, [10, 10, 10])
}

pub fn bright_frame(width: u32, height: u32) -> Frame {
  Frame::filled(width, height, ChannelOrder::Bgr, [250, 250, 250])
}

/// 记录收到的每一对（帧，状态）
#[derive(Default)]
pub struct Recorder {
  pub events: Vec<(Option<Frame>, String)>,
}

impl Recorder {
  pub fn statuses(&self) -> Vec<&str> {
    self.events.iter().map(|(_, s)| s.as_str()).collect()
  }
}

impl Render for Recorder {
  type Error = Infallible;

  fn render(&mut self, frame: Option<&Frame>, status: &str) -> Result<(), Self::Error> {
    self.events.push((frame.cloned(), status.to_string()));
    Ok(())
  }
}

/// 内存中的视频源；`frames` 为 `None` 时打开失败
pub struct FakeVideoSource {
  pub frames: Option<Vec<Frame>>,
  pub fps: i32,
}

pub struct FakeReader {
  frames: std::vec::IntoIter<Frame>,
  spec: VideoSpec,
}

impl Iterator for FakeReader {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    self.frames.next()
  }
}

impl VideoReader for FakeReader {
  fn spec(&self) -> VideoSpec {
    self.spec
  }
}

impl VideoSource for FakeVideoSource {
  type Reader = FakeReader;
  type Error = io::Error;

  fn open(&self, path: &Path) -> Result<Self::Reader, Self::Error> {
    let frames = self.frames.clone().ok_or_else(|| {
      io::Error::new(io::ErrorKind::NotFound, format!("{}", path.display()))
    })?;
    let (width, height) = frames
      .first()
      .map(|f| (f.width(), f.height()))
      .unwrap_or((0, 0));
    Ok(FakeReader {
      frames: frames.into_iter(),
      spec: VideoSpec::new(width, height, self.fps, 1),
    })
  }
}

/// 把帧的原始字节追加到文件里的写入器
#[derive(Default)]
pub struct FakeSink;

pub struct FakeWriter {
  file: std::fs::File,
  pub path: PathBuf,
  pub spec: VideoSpec,
  written: u64,
}

impl OutputWriter for FakeWriter {
  type Error = io::Error;

  fn write_frame(&mut self, frame: &Frame) -> Result<(), Self::Error> {
    if frame.order() != ChannelOrder::Rgb {
      return Err(io::Error::other("写入器只接受 RGB 帧"));
    }
    self.file.write_all(frame.as_bytes())?;
    self.written += 1;
    Ok(())
  }

  fn finish(mut self) -> Result<u64, Self::Error> {
    self.file.flush()?;
    Ok(self.written)
  }
}

impl VideoSink for FakeSink {
  type Writer = FakeWriter;
  type Error = io::Error;

  fn create(&self, path: &Path, spec: VideoSpec) -> Result<Self::Writer, Self::Error> {
    Ok(FakeWriter {
      file: std::fs::File::create(path)?,
      path: path.to_path_buf(),
      spec,
      written: 0,
    })
  }
}

/// 在指定序号（从 0 开始）的帧上写入失败，其余帧照常写入文件
pub struct FlakySink {
  pub fail_on: Vec<usize>,
}

pub struct FlakyWriter {
  inner: FakeWriter,
  fail_on: Vec<usize>,
  seen: usize,
}

impl OutputWriter for FlakyWriter {
  type Error = io::Error;

  fn write_frame(&mut self, frame: &Frame) -> Result<(), Self::Error> {
    let index = self.seen;
    self.seen += 1;
    if self.fail_on.contains(&index) {
      return Err(io::Error::other("磁盘已满"));
    }
    self.inner.write_frame(frame)
  }

  fn finish(self) -> Result<u64, Self::Error> {
    self.inner.finish()
  }
}

impl VideoSink for FlakySink {
  type Writer = FlakyWriter;
  type Error = io::Error;

  fn create(&self, path: &Path, spec: VideoSpec) -> Result<Self::Writer, Self::Error> {
    Ok(FlakyWriter {
      inner: FakeSink.create(path, spec)?,
      fail_on: self.fail_on.clone(),
      seen: 0,
    })
  }
}

/// 内存中的摄像头；`frames` 为 `None` 时打开失败
pub struct FakeCamera {
  pub frames: Option<Vec<Frame>>,
  pub opened: AtomicUsize,
}

impl FakeCamera {
  pub fn new(frames: Option<Vec<Frame>>) -> Self {
    Self {
      frames,
      opened: AtomicUsize::new(0),
    }
  }
}

impl CameraDevice for FakeCamera {
  type Camera = std::vec::IntoIter<Frame>;
  type Error = io::Error;

  fn open(&self) -> Result<Self::Camera, Self::Error> {
    self.opened.fetch_add(1, Ordering::SeqCst);
    self
      .frames
      .clone()
      .map(Vec::into_iter)
      .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "/dev/video0"))
  }
}
