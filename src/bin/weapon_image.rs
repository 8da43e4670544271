// 该文件是 Jingjie （警戒） 项目的一部分。
// src/bin/weapon_image.rs - 单张图像武器检测
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use anyhow::Result;
use clap::Parser;
use tracing::info;
use url::Url;

use jingjie::{
  FromUrl,
  config::DetectorArgs,
  input::ImageFileInput,
  output::SaveImageFileOutput,
  task::{OneShotTask, Task},
};

/// 检测单张图像中的武器并保存标注结果
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  #[command(flatten)]
  pub detector: DetectorArgs,
  /// 输入图像，例如 image:///tmp/in.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出图像，例如 image:///tmp/out.png
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);

  let detector = args.detector.build_detector()?;
  let input = ImageFileInput::from_url(&args.input)?;
  let output = SaveImageFileOutput::from_url(&args.output)?;

  let status = OneShotTask.run_task(input, &detector, output)?;
  println!("{}", status);

  Ok(())
}
