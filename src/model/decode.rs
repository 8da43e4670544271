// 该文件是 Jingjie （警戒） 项目的一部分。
// src/model/decode.rs - 检测层输出解码
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use tracing::debug;

use crate::model::{BoxRect, Detection, LayerOutput, ModelError};

/// 每行开头的字段数: cx, cy, w, h, objectness
pub const BOX_FIELDS: usize = 5;

/// 将所有检测层的原始输出解码为像素坐标下的候选框
///
/// 行格式为 `[cx, cy, w, h, objectness, score_0, ..]`，几何量是相对帧宽高的比例。
/// 置信度取最大类别分数（objectness 不参与），只保留严格大于
/// `confidence_threshold` 的候选。
pub fn decode(
  layers: &[LayerOutput],
  frame_width: u32,
  frame_height: u32,
  num_classes: usize,
  confidence_threshold: f32,
) -> Result<Vec<Detection>, ModelError> {
  let expected = BOX_FIELDS + num_classes;
  let (fw, fh) = (frame_width as f32, frame_height as f32);
  let mut candidates = Vec::new();

  for (layer_idx, layer) in layers.iter().enumerate() {
    if layer.row_len() != expected {
      return Err(ModelError::RowWidthMismatch {
        expected,
        actual: layer.row_len(),
      });
    }

    for row in layer.rows() {
      let Some((class_id, confidence)) = arg_max(&row[BOX_FIELDS..]) else {
        continue;
      };

      if confidence <= confidence_threshold {
        continue;
      }

      let center_x = (row[0] * fw) as i32;
      let center_y = (row[1] * fh) as i32;
      let width = (row[2] * fw) as i32;
      let height = (row[3] * fh) as i32;

      let x = (center_x as f32 - width as f32 / 2.0) as i32;
      let y = (center_y as f32 - height as f32 / 2.0) as i32;

      candidates.push(Detection {
        class_id,
        confidence,
        bbox: BoxRect {
          x,
          y,
          width,
          height,
        },
      });
    }

    debug!("检测层 {}: {} 行", layer_idx, layer.num_rows());
  }

  debug!("阈值过滤后剩余 {} 个候选", candidates.len());
  Ok(candidates)
}

// 并列时取下标最小者
fn arg_max(scores: &[f32]) -> Option<(usize, f32)> {
  let mut best: Option<(usize, f32)> = None;
  for (idx, &score) in scores.iter().enumerate() {
    if score.is_nan() {
      continue;
    }
    if best.is_none_or(|(_, max)| score > max) {
      best = Some((idx, score));
    }
  }
  best
}
