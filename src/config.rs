// 该文件是 Jingjie （警戒） 项目的一部分。
// src/config.rs - 检测器参数配置
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::PathBuf;

use clap::Args;
use thiserror::Error;
use url::Url;

use crate::{
  detector::NetworkParams,
  model::{ClassTable, Thresholds},
  output::draw::{Draw, DrawError},
};

pub const DEFAULT_MODEL_URL: &str = "yolov3:config/yolov3_weapon.onnx";

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("{name} 阈值必须在 [0, 1] 之间, 实际为 {value}")]
  InvalidThreshold { name: &'static str, value: f32 },
  #[error("字体加载失败: {0}")]
  Font(#[from] DrawError),
}

/// 各个可执行程序共用的检测器参数
#[derive(Args, Debug, Clone)]
pub struct DetectorArgs {
  /// 模型路径，例如 yolov3:config/yolov3_weapon.onnx?threads=4
  #[arg(long, value_name = "MODEL", default_value = DEFAULT_MODEL_URL)]
  pub model: Url,

  /// 置信度阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = 0.5, value_name = "THRESHOLD")]
  pub confidence: f32,

  /// NMS IoU 阈值 (0.0 - 1.0)
  #[arg(long, default_value_t = 0.4, value_name = "THRESHOLD")]
  pub nms_threshold: f32,

  /// 标签字体文件（TTF/OTF），不指定时尝试系统字体
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
}

fn check_threshold(name: &'static str, value: f32) -> Result<f32, ConfigError> {
  if (0.0..=1.0).contains(&value) {
    Ok(value)
  } else {
    Err(ConfigError::InvalidThreshold { name, value })
  }
}

impl DetectorArgs {
  pub fn params(&self) -> Result<NetworkParams, ConfigError> {
    Ok(NetworkParams {
      classes: ClassTable::weapon(),
      thresholds: Thresholds {
        confidence: check_threshold("confidence", self.confidence)?,
        nms: check_threshold("nms", self.nms_threshold)?,
      },
      ..NetworkParams::default()
    })
  }

  pub fn draw(&self) -> Result<Draw, ConfigError> {
    match &self.font {
      Some(path) => Ok(Draw::default().with_font_file(path)?),
      None => Ok(Draw::load_default()),
    }
  }

  #[cfg(feature = "onnx_model")]
  pub fn build_detector(
    &self,
  ) -> anyhow::Result<crate::detector::WeaponDetector<crate::model::OnnxNetwork>> {
    use tracing::info;

    use crate::{FromUrl, model::OnnxNetworkBuilder};

    let params = self.params()?;
    let draw = self.draw()?;
    info!("模型路径: {}", self.model);
    info!(
      "置信度阈值: {}, NMS 阈值: {}",
      params.thresholds.confidence, params.thresholds.nms
    );

    let network = OnnxNetworkBuilder::from_url(&self.model)?.build()?;
    Ok(crate::detector::WeaponDetector::new(network, params, draw))
  }
}
