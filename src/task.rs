// 该文件是 Jingjie （警戒） 项目的一部分。
// src/task.rs - 任务定义
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

use tracing::{info, warn};

use crate::{
  detector::{DetectStatus, INPUT_SIZE, WeaponDetector},
  frame::Frame,
  model::Network,
  output::Render,
};

mod video;
mod webcam;

pub use self::video::{VideoInput, VideoReport, VideoTask};
pub use self::webcam::{WebcamState, WebcamSwitch, WebcamTask};

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Output, Self::Error>;
}

/// 单帧任务：取输入的第一帧检测一次并交给显示端
pub struct OneShotTask;

impl<
  'a,
  N: Network<INPUT_SIZE, INPUT_SIZE>,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = Frame>,
  O: Render<Error = RE>,
> Task<I, &'a WeaponDetector<N>, O> for OneShotTask
{
  type Output = DetectStatus;
  type Error = anyhow::Error;

  fn run_task(
    self,
    mut input: I,
    detector: &'a WeaponDetector<N>,
    mut output: O,
  ) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let frame = input.next();
    if frame.is_none() {
      warn!("没有输入帧");
    }

    let now = std::time::Instant::now();
    let outcome = detector.detect(frame.as_ref())?;
    info!("推理完成，耗时: {:.2?}", now.elapsed());

    let status = outcome.status();
    output.render(outcome.frame.as_ref(), &status.to_string())?;
    info!("渲染完成，耗时: {:.2?}", now.elapsed());

    Ok(status)
  }
}
