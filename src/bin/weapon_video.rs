// 该文件是 Jingjie （警戒） 项目的一部分。
// src/bin/weapon_video.rs - 视频文件武器检测
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use jingjie::{
  config::DetectorArgs,
  input::GStreamerVideoSource,
  output::GStreamerVideoSink,
  task::{Task, VideoInput, VideoTask},
};

/// 逐帧检测视频中的武器并输出标注后的视频
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub detector: DetectorArgs,
  /// 输入视频文件
  #[arg(value_name = "VIDEO")]
  pub video: Option<PathBuf>,
  /// 输出视频文件，不指定时写入临时目录
  #[arg(long, value_name = "OUTPUT")]
  pub output: Option<PathBuf>,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  let detector = args.detector.build_detector()?;
  let input = VideoInput::new(GStreamerVideoSource, args.video);
  let report = VideoTask::default()
    .with_output(args.output)
    .run_task(input, &detector, &GStreamerVideoSink)?;

  if let Some(output) = &report.output {
    info!("输出视频: {}", output.display());
    println!("{}", output.display());
  }
  println!("{}", report.summary);

  Ok(())
}
