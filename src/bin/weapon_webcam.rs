// 该文件是 Jingjie （警戒） 项目的一部分。
// src/bin/weapon_webcam.rs - 摄像头实时武器检测
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::{thread, time::Duration};

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use url::Url;

use jingjie::{
  FromUrl,
  config::DetectorArgs,
  input::GStreamerCamera,
  output::SaveImageFileOutput,
  task::{WebcamSwitch, WebcamTask},
};

/// 采集摄像头画面并实时检测武器，最新的标注画面写入输出图像
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub detector: DetectorArgs,
  /// 摄像头，例如 gst://camera/dev/video0?width=640&height=480&fps=15
  #[arg(long, value_name = "CAMERA", default_value = "gst://camera/dev/video0")]
  pub camera: Url,
  /// 输出图像，例如 image:///tmp/webcam.png
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 最多处理的帧数，0 表示直到中断
  #[arg(long, value_name = "FRAME_NUMBER", default_value_t = 0)]
  pub frame_number: usize,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("摄像头: {}", args.camera);
  info!("输出路径: {}", args.output);

  let detector = args.detector.build_detector()?;
  let camera = GStreamerCamera::from_url(&args.camera)?;
  let mut output = SaveImageFileOutput::from_url(&args.output)?;

  let switch = WebcamSwitch::new(true);
  let handler_switch = switch.clone();
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    handler_switch.turn_off();
    thread::spawn(|| {
      thread::sleep(Duration::from_secs(30));
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })?;

  let frame_limit = (args.frame_number > 0).then_some(args.frame_number);
  let mut task = WebcamTask::new(camera, switch).with_frame_limit(frame_limit);
  let frames = task.stream(&detector, &mut output)?;

  info!("共处理 {} 帧", frames);
  if let Some(status) = output.last_status() {
    println!("{}", status);
  }

  Ok(())
}
