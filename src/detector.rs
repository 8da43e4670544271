// 该文件是 Jingjie （警戒） 项目的一部分。
// src/detector.rs - 武器检测
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

//! # 武器检测
//!
//! [`WeaponDetector`] 把一帧图像变成带标注的图像和一条状态文本：
//!
//! 1. 缩放到 416×416、乘以缩放系数并重排为网络的通道顺序；
//! 2. 前向推理，解码每个检测层的输出，按置信度阈值过滤；
//! 3. 非极大值抑制去除重复框；
//! 4. 在帧的副本上绘制检测框和标签，转换为显示通道顺序后返回。
//!
//! 网络参数在启动时加载一次，之后只读；检测调用之间不保留任何状态。

use std::fmt;

use thiserror::Error;
use tracing::{debug, info};

use crate::{
  frame::{Blob, ChannelOrder, Frame},
  model::{
    ClassTable, Detection, LayerOutput, ModelError, Network, Thresholds, decode, nms_indices,
  },
  output::draw::Draw,
};

/// 网络输入边长
pub const INPUT_SIZE: u32 = 416;
/// 像素值缩放系数（约 1/255）
pub const SCALE_FACTOR: f32 = 0.00392;
/// 网络训练时使用的通道顺序
pub const NETWORK_INPUT_ORDER: ChannelOrder = ChannelOrder::Rgb;
/// 返回给调用方的显示通道顺序
pub const DISPLAY_ORDER: ChannelOrder = ChannelOrder::Rgb;

#[derive(Error, Debug)]
pub enum DetectError {
  #[error("推理失败: {0}")]
  Network(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("输出解析失败: {0}")]
  Model(#[from] ModelError),
}

/// 启动时确定、之后只读的网络参数
#[derive(Debug, Clone)]
pub struct NetworkParams {
  pub classes: ClassTable,
  pub thresholds: Thresholds,
  pub scale: f32,
}

impl Default for NetworkParams {
  fn default() -> Self {
    Self {
      classes: ClassTable::weapon(),
      thresholds: Thresholds::default(),
      scale: SCALE_FACTOR,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectStatus {
  NoFrame,
  Clear,
  Detected(usize),
}

impl fmt::Display for DetectStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DetectStatus::NoFrame => write!(f, "No frame provided"),
      DetectStatus::Clear => write!(f, "No weapons detected"),
      DetectStatus::Detected(n) => write!(f, "{} weapon(s) detected!", n),
    }
  }
}

/// 一次检测调用的结果
#[derive(Debug, Clone)]
pub struct DetectOutcome {
  /// 标注后的帧（显示通道顺序），无输入时为 `None`
  pub frame: Option<Frame>,
  /// 保留下来的检测，按候选顺序排列
  pub detections: Vec<Detection>,
  status: DetectStatus,
}

impl DetectOutcome {
  fn no_frame() -> Self {
    Self {
      frame: None,
      detections: Vec::new(),
      status: DetectStatus::NoFrame,
    }
  }

  pub fn status(&self) -> DetectStatus {
    self.status
  }

  pub fn weapon_count(&self) -> usize {
    self.detections.len()
  }

  pub fn has_weapons(&self) -> bool {
    !self.detections.is_empty()
  }
}

pub struct WeaponDetector<N> {
  network: N,
  params: NetworkParams,
  draw: Draw,
}

impl<N: Network<INPUT_SIZE, INPUT_SIZE>> WeaponDetector<N> {
  pub fn new(network: N, params: NetworkParams, draw: Draw) -> Self {
    Self {
      network,
      params,
      draw,
    }
  }

  pub fn params(&self) -> &NetworkParams {
    &self.params
  }

  pub fn network(&self) -> &N {
    &self.network
  }

  /// 检测一帧；空帧（宽或高为 0）与缺失帧同样处理，不调用网络
  pub fn detect(&self, frame: Option<&Frame>) -> Result<DetectOutcome, DetectError> {
    let Some(frame) = frame.filter(|f| !f.is_empty()) else {
      debug!("没有输入帧");
      return Ok(DetectOutcome::no_frame());
    };

    let blob = Blob::<INPUT_SIZE, INPUT_SIZE>::from_frame(frame, self.params.scale, NETWORK_INPUT_ORDER);
    let layers = self
      .network
      .forward(&blob)
      .map_err(|e| DetectError::Network(Box::new(e)))?;

    let detections = self.postprocess(&layers, frame.width(), frame.height())?;

    let mut annotated = frame.clone();
    self
      .draw
      .draw_detections(&mut annotated, &detections, &self.params.classes);

    for detection in &detections {
      let label = self
        .params
        .classes
        .label(detection.class_id)
        .unwrap_or("unknown");
      info!(
        "检测到: {} 置信度 {:.2} 位置 ({}, {}) 大小 {}x{}",
        label,
        detection.confidence,
        detection.bbox.x,
        detection.bbox.y,
        detection.bbox.width,
        detection.bbox.height
      );
    }

    let status = if detections.is_empty() {
      DetectStatus::Clear
    } else {
      DetectStatus::Detected(detections.len())
    };

    Ok(DetectOutcome {
      frame: Some(annotated.into_order(DISPLAY_ORDER)),
      detections,
      status,
    })
  }

  /// 解码 + NMS，返回的检测按原候选下标升序
  pub fn postprocess(
    &self,
    layers: &[LayerOutput],
    frame_width: u32,
    frame_height: u32,
  ) -> Result<Vec<Detection>, ModelError> {
    let thresholds = &self.params.thresholds;
    let candidates = decode(
      layers,
      frame_width,
      frame_height,
      self.params.classes.len(),
      thresholds.confidence,
    )?;

    let mut kept = nms_indices(&candidates, thresholds.confidence, thresholds.nms);
    kept.sort_unstable();
    debug!("NMS 后保留 {} / {} 个候选", kept.len(), candidates.len());

    Ok(kept.into_iter().map(|i| candidates[i].clone()).collect())
  }
}
