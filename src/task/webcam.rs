// 该文件是 Jingjie （警戒） 项目的一部分。
// src/task/webcam.rs - 摄像头实时检测任务
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

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

use tracing::{error, info, warn};

use crate::{
  detector::{DISPLAY_ORDER, INPUT_SIZE, WeaponDetector},
  input::CameraDevice,
  model::Network,
  output::Render,
};

const NOT_ACTIVE: &str = "Webcam not active";
const OPEN_FAILED: &str = "Failed to open webcam";
const STOPPED: &str = "Webcam stopped";
const DETECT_FAILED: &str = "Detection failed";

/// 摄像头开关，可跨线程克隆共享（例如在 Ctrl-C 处理函数中关闭）
#[derive(Debug, Clone, Default)]
pub struct WebcamSwitch(Arc<AtomicBool>);

impl WebcamSwitch {
  pub fn new(on: bool) -> Self {
    Self(Arc::new(AtomicBool::new(on)))
  }

  /// 切换开关，返回切换后的状态
  pub fn toggle(&self) -> bool {
    !self.0.fetch_xor(true, Ordering::SeqCst)
  }

  pub fn turn_on(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn turn_off(&self) {
    self.0.store(false, Ordering::SeqCst);
  }

  pub fn is_on(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }
}

#[derive(Debug)]
pub enum WebcamState<C> {
  Idle,
  Capturing(C),
}

impl<C> WebcamState<C> {
  pub fn is_capturing(&self) -> bool {
    matches!(self, WebcamState::Capturing(_))
  }
}

/// 摄像头循环
///
/// 采集句柄只在 [`WebcamTask::stream`] 期间存在，结束后回到 `Idle`，
/// 因此同一个任务可以反复启动。
pub struct WebcamTask<D: CameraDevice> {
  device: D,
  switch: WebcamSwitch,
  state: WebcamState<D::Camera>,
  frame_limit: Option<usize>,
}

impl<D: CameraDevice> WebcamTask<D> {
  pub fn new(device: D, switch: WebcamSwitch) -> Self {
    Self {
      device,
      switch,
      state: WebcamState::Idle,
      frame_limit: None,
    }
  }

  pub fn with_frame_limit(mut self, frame_limit: Option<usize>) -> Self {
    self.frame_limit = frame_limit;
    self
  }

  pub fn device(&self) -> &D {
    &self.device
  }

  pub fn switch(&self) -> &WebcamSwitch {
    &self.switch
  }

  pub fn state(&self) -> &WebcamState<D::Camera> {
    &self.state
  }

  /// 运行一次采集循环，把每帧的（标注帧，状态）交给显示端；返回处理的帧数
  pub fn stream<N, R>(&mut self, detector: &WeaponDetector<N>, render: &mut R) -> Result<usize, R::Error>
  where
    N: Network<INPUT_SIZE, INPUT_SIZE>,
    R: Render,
  {
    if !self.switch.is_on() {
      info!("摄像头未启动");
      render.render(None, NOT_ACTIVE)?;
      return Ok(0);
    }

    let camera = match self.device.open() {
      Ok(camera) => camera,
      Err(e) => {
        error!("无法打开摄像头: {}", e);
        self.switch.turn_off();
        render.render(None, OPEN_FAILED)?;
        return Ok(0);
      }
    };

    info!("摄像头已打开");
    self.state = WebcamState::Capturing(camera);
    let result = self.capture(detector, render);
    self.state = WebcamState::Idle;
    info!("摄像头已释放");

    let count = result?;
    render.render(None, STOPPED)?;
    Ok(count)
  }

  fn capture<N, R>(&mut self, detector: &WeaponDetector<N>, render: &mut R) -> Result<usize, R::Error>
  where
    N: Network<INPUT_SIZE, INPUT_SIZE>,
    R: Render,
  {
    let WebcamState::Capturing(camera) = &mut self.state else {
      return Ok(0);
    };

    let mut count = 0;
    while self.switch.is_on() {
      if self.frame_limit.is_some_and(|limit| count >= limit) {
        info!("达到指定帧数 {}, 退出循环", count);
        break;
      }

      let Some(frame) = camera.next() else {
        warn!("摄像头没有更多帧");
        break;
      };
      count += 1;

      let detected = detector.detect(Some(&frame));
      match detected {
        Ok(outcome) => render.render(outcome.frame.as_ref(), &outcome.status().to_string())?,
        Err(e) => {
          // 显示未标注的原始画面，避免停留在上一帧
          warn!("第 {} 帧检测失败: {}", count, e);
          render.render(Some(&frame.into_order(DISPLAY_ORDER)), DETECT_FAILED)?;
        }
      }
    }

    Ok(count)
  }
}
