// 该文件是 Jingjie （警戒） 项目的一部分。
// tests/webcam_task.rs - 摄像头循环
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

mod common;

use std::{convert::Infallible, sync::atomic::Ordering};

use common::{BrightnessNetwork, BrokenNetwork, FakeCamera, Recorder, bright_frame, dark_frame, detector};
use jingjie::{
  frame::{ChannelOrder, Frame},
  output::Render,
  task::{WebcamSwitch, WebcamTask},
};

#[test]
fn inactive_webcam_does_not_open_device() {
  let camera = FakeCamera::new(Some(vec![dark_frame(8, 8)]));
  let mut task = WebcamTask::new(camera, WebcamSwitch::default());
  let mut recorder = Recorder::default();

  let frames = task
    .stream(&detector(BrightnessNetwork), &mut recorder)
    .unwrap();

  assert_eq!(frames, 0);
  assert_eq!(task_device_opens(&task), 0);
  assert_eq!(recorder.statuses(), vec!["Webcam not active"]);
  assert!(recorder.events[0].0.is_none());
}

#[test]
fn open_failure_turns_switch_off() {
  let switch = WebcamSwitch::new(true);
  let mut task = WebcamTask::new(FakeCamera::new(None), switch.clone());
  let mut recorder = Recorder::default();

  task
    .stream(&detector(BrightnessNetwork), &mut recorder)
    .unwrap();

  assert_eq!(recorder.statuses(), vec!["Failed to open webcam"]);
  assert!(!switch.is_on());
  assert!(!task.state().is_capturing());
}

#[test]
fn streams_every_frame_then_stops() {
  let camera = FakeCamera::new(Some(vec![dark_frame(16, 16), bright_frame(16, 16)]));
  let mut task = WebcamTask::new(camera, WebcamSwitch::new(true));
  let mut recorder = Recorder::default();

  let frames = task
    .stream(&detector(BrightnessNetwork), &mut recorder)
    .unwrap();

  assert_eq!(frames, 2);
  assert_eq!(
    recorder.statuses(),
    vec![
      "No weapons detected",
      "1 weapon(s) detected!",
      "Webcam stopped"
    ]
  );
  let shown = recorder.events[1].0.as_ref().unwrap();
  assert_eq!(shown.order(), ChannelOrder::Rgb);
  assert!(recorder.events[2].0.is_none());
  assert!(!task.state().is_capturing());
}

#[test]
fn detection_failure_shows_the_raw_frame() {
  let camera = FakeCamera::new(Some(vec![dark_frame(8, 8), bright_frame(8, 8)]));
  let mut task = WebcamTask::new(camera, WebcamSwitch::new(true));
  let mut recorder = Recorder::default();

  let frames = task
    .stream(&detector(BrokenNetwork), &mut recorder)
    .unwrap();

  assert_eq!(frames, 2);
  assert_eq!(
    recorder.statuses(),
    vec!["Detection failed", "Detection failed", "Webcam stopped"]
  );
  let shown = recorder.events[1].0.as_ref().unwrap();
  assert_eq!(shown, &bright_frame(8, 8).convert(ChannelOrder::Rgb));
}

#[test]
fn frame_limit_ends_the_loop() {
  let camera = FakeCamera::new(Some(vec![dark_frame(8, 8); 5]));
  let mut task = WebcamTask::new(camera, WebcamSwitch::new(true)).with_frame_limit(Some(3));
  let mut recorder = Recorder::default();

  let frames = task
    .stream(&detector(BrightnessNetwork), &mut recorder)
    .unwrap();

  assert_eq!(frames, 3);
  assert_eq!(recorder.events.len(), 4);
  assert_eq!(recorder.statuses().last(), Some(&"Webcam stopped"));
}

/// 收到第一帧后关闭开关
struct StopAfterFirst {
  switch: WebcamSwitch,
  inner: Recorder,
}

impl Render for StopAfterFirst {
  type Error = Infallible;

  fn render(&mut self, frame: Option<&Frame>, status: &str) -> Result<(), Self::Error> {
    self.switch.turn_off();
    self.inner.render(frame, status)
  }
}

#[test]
fn switching_off_stops_and_task_can_restart() {
  let switch = WebcamSwitch::new(true);
  let camera = FakeCamera::new(Some(vec![dark_frame(8, 8); 4]));
  let mut task = WebcamTask::new(camera, switch.clone());
  let detector = detector(BrightnessNetwork);

  let mut render = StopAfterFirst {
    switch: switch.clone(),
    inner: Recorder::default(),
  };
  assert_eq!(task.stream(&detector, &mut render).unwrap(), 1);
  assert_eq!(
    render.inner.statuses(),
    vec!["No weapons detected", "Webcam stopped"]
  );

  assert!(switch.toggle());
  let mut recorder = Recorder::default();
  assert_eq!(task.stream(&detector, &mut recorder).unwrap(), 4);
  assert_eq!(recorder.events.len(), 5);
}

#[test]
fn each_stream_reopens_the_device() {
  let mut task = WebcamTask::new(
    FakeCamera::new(Some(vec![dark_frame(8, 8)])),
    WebcamSwitch::new(true),
  );
  let detector = detector(BrightnessNetwork);

  task.stream(&detector, &mut Recorder::default()).unwrap();
  task.stream(&detector, &mut Recorder::default()).unwrap();
  assert_eq!(task_device_opens(&task), 2);
}

fn task_device_opens(task: &WebcamTask<FakeCamera>) -> usize {
  task.device().opened.load(Ordering::SeqCst)
}
