// 该文件是 Jingjie （警戒） 项目的一部分。
// src/task/video.rs - 视频文件检测任务
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

use std::{
  convert::Infallible,
  path::{Path, PathBuf},
};

use tracing::{error, info, warn};

use crate::{
  detector::{DISPLAY_ORDER, INPUT_SIZE, WeaponDetector},
  input::{VideoReader, VideoSource},
  model::Network,
  output::{OutputWriter, VideoSink},
  task::Task,
};

const NO_VIDEO_SELECTED: &str = "No video selected";
const OPEN_FAILED: &str = "Could not open video file";
const GENERATE_FAILED: &str = "Failed to generate output video";

/// 待处理的视频：打开方式与路径
pub struct VideoInput<S> {
  pub source: S,
  pub path: Option<PathBuf>,
}

impl<S> VideoInput<S> {
  pub fn new(source: S, path: Option<PathBuf>) -> Self {
    Self { source, path }
  }
}

/// 视频处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoReport {
  /// 输出视频路径，生成失败时为 `None`
  pub output: Option<PathBuf>,
  /// 给用户看的一行总结
  pub summary: String,
  pub frames: u64,
  pub weapon_frames: u64,
}

impl VideoReport {
  fn failed(message: &str, frames: u64, weapon_frames: u64) -> Self {
    Self {
      output: None,
      summary: message.to_string(),
      frames,
      weapon_frames,
    }
  }
}

/// 逐帧检测视频文件并写出标注后的视频
#[derive(Debug, Default, Clone)]
pub struct VideoTask {
  output: Option<PathBuf>,
}

impl VideoTask {
  /// 不指定输出路径时写入新的临时 `.mp4` 文件
  pub fn with_output(mut self, output: Option<PathBuf>) -> Self {
    self.output = output;
    self
  }

  fn output_path(&self) -> std::io::Result<PathBuf> {
    if let Some(path) = &self.output {
      return Ok(path.clone());
    }
    let path = tempfile::Builder::new()
      .prefix("jingjie-")
      .suffix(".mp4")
      .tempfile()?
      .into_temp_path()
      .keep()
      .map_err(|e| e.error)?;
    Ok(path)
  }

  pub fn process<N, S, K>(
    &self,
    input: &VideoInput<S>,
    detector: &WeaponDetector<N>,
    sink: &K,
  ) -> VideoReport
  where
    N: Network<INPUT_SIZE, INPUT_SIZE>,
    S: VideoSource,
    K: VideoSink,
  {
    let Some(path) = input.path.as_deref() else {
      warn!("没有选择视频");
      return VideoReport::failed(NO_VIDEO_SELECTED, 0, 0);
    };

    let reader = match input.source.open(path) {
      Ok(reader) => reader,
      Err(e) => {
        error!("无法打开视频文件 {}: {}", path.display(), e);
        return VideoReport::failed(OPEN_FAILED, 0, 0);
      }
    };

    let output_path = match self.output_path() {
      Ok(path) => path,
      Err(e) => {
        error!("无法创建输出文件: {}", e);
        return VideoReport::failed(GENERATE_FAILED, 0, 0);
      }
    };

    let spec = reader.spec();
    info!(
      "处理视频 {} ({}x{} @ {:.2} fps) -> {}",
      path.display(),
      spec.width,
      spec.height,
      spec.fps(),
      output_path.display()
    );

    let writer = match sink.create(&output_path, spec) {
      Ok(writer) => writer,
      Err(e) => {
        error!("无法创建视频写入器: {}", e);
        remove_empty(&output_path);
        return VideoReport::failed(GENERATE_FAILED, 0, 0);
      }
    };

    let (frames, weapon_frames, written) = run_frames(reader, detector, writer);
    let summary = format!(
      "Processed {} frames. Weapons detected in {} frames.",
      frames, weapon_frames
    );
    info!("{}", summary);

    if written == 0 || !output_path.exists() {
      error!("输出视频未生成: {}", output_path.display());
      remove_empty(&output_path);
      return VideoReport::failed(GENERATE_FAILED, frames, weapon_frames);
    }

    VideoReport {
      output: Some(output_path),
      summary,
      frames,
      weapon_frames,
    }
  }
}

/// 返回（总帧数，含武器帧数，写入帧数）
fn run_frames<N, R, W>(reader: R, detector: &WeaponDetector<N>, mut writer: W) -> (u64, u64, u64)
where
  N: Network<INPUT_SIZE, INPUT_SIZE>,
  R: VideoReader,
  W: OutputWriter,
{
  let mut frames = 0u64;
  let mut weapon_frames = 0u64;
  let mut written = 0u64;

  for frame in reader {
    frames += 1;

    let annotated = match detector.detect(Some(&frame)) {
      Ok(outcome) => {
        if outcome.has_weapons() {
          weapon_frames += 1;
        }
        outcome.frame
      }
      Err(e) => {
        warn!("第 {} 帧检测失败: {}", frames, e);
        None
      }
    };

    // 检测失败时写入原始画面，保持视频长度不变
    let annotated = annotated.unwrap_or_else(|| frame.into_order(DISPLAY_ORDER));
    match writer.write_frame(&annotated) {
      Ok(()) => written += 1,
      Err(e) => warn!("第 {} 帧写入失败，跳过: {}", frames, e),
    }
  }

  match writer.finish() {
    Ok(count) => info!("视频写入完成，共 {} 帧", count),
    Err(e) => {
      error!("视频写入器关闭失败: {}", e);
      written = 0;
    }
  }

  (frames, weapon_frames, written)
}

fn remove_empty(path: &Path) {
  let is_empty = std::fs::metadata(path)
    .map(|m| m.len() == 0)
    .unwrap_or(false);
  if is_empty && let Err(e) = std::fs::remove_file(path) {
    warn!("无法删除空输出文件 {}: {}", path.display(), e);
  }
}

impl<'a, N, S, K> Task<VideoInput<S>, &'a WeaponDetector<N>, &'a K> for VideoTask
where
  N: Network<INPUT_SIZE, INPUT_SIZE>,
  S: VideoSource,
  K: VideoSink,
{
  type Output = VideoReport;
  type Error = Infallible;

  fn run_task(
    self,
    input: VideoInput<S>,
    detector: &'a WeaponDetector<N>,
    sink: &'a K,
  ) -> Result<Self::Output, Self::Error> {
    Ok(self.process(&input, detector, sink))
  }
}
