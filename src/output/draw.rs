// 该文件是 Jingjie （警戒） 项目的一部分。
// src/output/draw.rs - 检测结果标注
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use imageproc::{
  drawing::{draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
  frame::Frame,
  model::{ClassTable, Detection},
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 18.0;
const LABEL_GAP: i32 = 10; // 标签基线到框顶的距离
const BOX_THICKNESS: i32 = 2;

/// 未指定字体时依次尝试的路径
const FALLBACK_FONT_PATHS: &[&str] = &[
  "assets/font.ttf",
  "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/dejavu/DejaVuSans.ttf",
  "/usr/share/fonts/TTF/DejaVuSans.ttf",
  "/System/Library/Fonts/Supplemental/Arial.ttf",
];

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 检测框与标签的绘制参数
///
/// 没有字体时只绘制检测框。
#[derive(Clone)]
pub struct Draw {
  font: Option<FontArc>,
  font_size: f32,
  label_gap: i32,
  thickness: i32,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      font: None,
      font_size: LABEL_FONT_SIZE,
      label_gap: LABEL_GAP,
      thickness: BOX_THICKNESS,
    }
  }
}

impl Draw {
  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = Some(font);
    self
  }

  pub fn with_font_file(self, path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let data = std::fs::read(path.as_ref())?;
    let font = FontArc::try_from_vec(data)?;
    debug!("加载字体: {}", path.as_ref().display());
    Ok(self.with_font(font))
  }

  pub fn with_font_size(mut self, font_size: f32) -> Self {
    self.font_size = font_size;
    self
  }

  /// 按候选路径加载第一个可用字体；都不可用时不绘制标签
  pub fn load_default() -> Self {
    for path in FALLBACK_FONT_PATHS {
      if !Path::new(path).is_file() {
        continue;
      }
      match Draw::default().with_font_file(path) {
        Ok(draw) => return draw,
        Err(e) => warn!("无法加载字体 {}: {}", path, e),
      }
    }
    warn!("未找到可用字体，仅绘制检测框");
    Draw::default()
  }

  pub fn has_font(&self) -> bool {
    self.font.is_some()
  }

  /// 在帧上原地绘制检测框和 `"<类别> (<置信度>)"` 标签
  ///
  /// 颜色按 RGB 语义给出，按帧自身的通道顺序写入。
  pub fn draw_detections(&self, frame: &mut Frame, detections: &[Detection], classes: &ClassTable) {
    let order = frame.order();
    let (frame_width, frame_height) = (frame.width() as i64, frame.height() as i64);
    let Some(mut canvas) = frame.canvas_mut() else {
      return;
    };

    for detection in detections {
      let (Some(label), Some(color)) = (
        classes.label(detection.class_id),
        classes.color(detection.class_id),
      ) else {
        warn!("未知类别 {}, 跳过绘制", detection.class_id);
        continue;
      };
      let color = order.encode(color);
      let bbox = &detection.bbox;
      // 坐标可能已饱和到 i32 边界，统一在 i64 中计算
      let (x, y) = (bbox.x as i64, bbox.y as i64);
      let (width, height) = (bbox.width as i64, bbox.height as i64);

      // cv 风格的矩形包含右下角 (x + w, y + h)
      for t in 0..self.thickness as i64 {
        let (left, top) = (x + t, y + t);
        let (right, bottom) = (x + width - t, y + height - t);
        if right < left || bottom < top {
          break;
        }
        if let Some(rect) = clip_outline(left, top, right, bottom, frame_width, frame_height) {
          draw_hollow_rect_mut(&mut canvas, rect, color);
        }
      }

      if let Some(font) = &self.font {
        let text = label_text(label, detection.confidence);
        let scale = PxScale::from(self.font_size);
        let (text_width, text_height) = text_size(scale, font, &text);
        let text_y = y - self.label_gap as i64 - text_height as i64;
        if x >= frame_width
          || text_y >= frame_height
          || x + (text_width as i64) <= 0
          || text_y + (text_height as i64) <= 0
        {
          debug!("标签 {} 不在画面内", text);
          continue;
        }
        draw_text_mut(&mut canvas, color, x as i32, text_y as i32, scale, font, &text);
      }
    }
  }
}

/// 标签文本：类别名加两位小数的置信度
pub fn label_text(label: &str, confidence: f32) -> String {
  format!("{} ({:.2})", label, confidence)
}

/// 把闭区间 [left, right] × [top, bottom] 的轮廓收缩到画面外一像素以内
///
/// 画面外的边仍在画面外，不会被绘制；整个轮廓都在画面外时返回 `None`。
fn clip_outline(
  left: i64,
  top: i64,
  right: i64,
  bottom: i64,
  frame_width: i64,
  frame_height: i64,
) -> Option<Rect> {
  if right < 0 || bottom < 0 || left >= frame_width || top >= frame_height {
    return None;
  }
  let (left, top) = (left.max(-1), top.max(-1));
  let (right, bottom) = (right.min(frame_width), bottom.min(frame_height));
  Some(
    Rect::at(left as i32, top as i32).of_size((right - left + 1) as u32, (bottom - top + 1) as u32),
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{frame::ChannelOrder, model::BoxRect};

  fn detection(x: i32, y: i32, width: i32, height: i32) -> Detection {
    Detection {
      class_id: 0,
      confidence: 0.9,
      bbox: BoxRect {
        x,
        y,
        width,
        height,
      },
    }
  }

  #[test]
  fn draws_two_pixel_outline_in_class_color() {
    let mut frame = Frame::filled(20, 20, ChannelOrder::Bgr, [0, 0, 0]);
    Draw::default().draw_detections(&mut frame, &[detection(4, 4, 10, 8)], &ClassTable::weapon());

    let red = Some([255, 0, 0]);
    assert_eq!(frame.rgb_at(4, 4), red);
    assert_eq!(frame.rgb_at(5, 5), red);
    assert_eq!(frame.rgb_at(14, 12), red);
    assert_eq!(frame.rgb_at(13, 11), red);
    assert_eq!(frame.rgb_at(6, 6), Some([0, 0, 0]));
    assert_eq!(frame.rgb_at(3, 3), Some([0, 0, 0]));
    // BGR 帧中红色存储为 [0, 0, 255]
    let idx = (4 * 20 + 4) * 3;
    assert_eq!(&frame.as_bytes()[idx..idx + 3], &[0, 0, 255]);
  }

  #[test]
  fn boxes_outside_the_frame_are_clipped() {
    let mut frame = Frame::filled(8, 8, ChannelOrder::Rgb, [0, 0, 0]);
    Draw::default().draw_detections(&mut frame, &[detection(-5, -5, 30, 30)], &ClassTable::weapon());
    assert!(frame.as_bytes().iter().all(|&v| v == 0));
  }

  #[test]
  fn degenerate_boxes_do_not_panic() {
    let mut frame = Frame::filled(8, 8, ChannelOrder::Rgb, [0, 0, 0]);
    let detections = [detection(2, 2, 0, 0), detection(3, 3, -4, 2)];
    Draw::default().draw_detections(&mut frame, &detections, &ClassTable::weapon());
    assert_eq!(frame.rgb_at(2, 2), Some([255, 0, 0]));
  }

  #[test]
  fn unknown_class_is_skipped() {
    let mut frame = Frame::filled(8, 8, ChannelOrder::Rgb, [0, 0, 0]);
    let mut unknown = detection(1, 1, 4, 4);
    unknown.class_id = 3;
    Draw::default().draw_detections(&mut frame, &[unknown], &ClassTable::weapon());
    assert!(frame.as_bytes().iter().all(|&v| v == 0));
  }

  #[test]
  fn saturated_coordinates_are_clipped() {
    let mut frame = Frame::filled(16, 16, ChannelOrder::Rgb, [0, 0, 0]);
    let detections = [
      detection(-1_000_000, 4, i32::MAX, 6),
      detection(i32::MAX, 2, 0, 2),
      detection(2, 2, i32::MAX, i32::MAX),
    ];
    Draw::default().draw_detections(&mut frame, &detections, &ClassTable::weapon());

    let red = Some([255, 0, 0]);
    // 第一个框只剩上下两条边横穿画面
    assert_eq!(frame.rgb_at(0, 4), red);
    assert_eq!(frame.rgb_at(15, 10), red);
    assert_eq!(frame.rgb_at(0, 7), Some([0, 0, 0]));
    // 第三个框只剩左上两条边
    assert_eq!(frame.rgb_at(2, 15), red);
    assert_eq!(frame.rgb_at(15, 2), red);
  }

  #[test]
  fn label_shows_confidence_with_two_decimals() {
    assert_eq!(label_text("Weapon", 0.9), "Weapon (0.90)");
    assert_eq!(label_text("Weapon", 0.899), "Weapon (0.90)");
    assert_eq!(label_text("Weapon", 0.5), "Weapon (0.50)");
    assert_eq!(label_text("Weapon", 1.0), "Weapon (1.00)");
  }

  #[test]
  fn label_is_drawn_above_the_box() {
    let Some(path) = FALLBACK_FONT_PATHS
      .iter()
      .map(|path| Path::new(*path))
      .find(|path| path.is_file())
    else {
      eprintln!("没有可用字体，跳过");
      return;
    };
    let draw = Draw::default().with_font_file(path).unwrap();
    assert!(draw.has_font());

    let mut frame = Frame::filled(128, 96, ChannelOrder::Rgb, [0, 0, 0]);
    draw.draw_detections(&mut frame, &[detection(8, 60, 40, 20)], &ClassTable::weapon());

    // 标签底边在框顶上方 10 像素处
    let label_rows = (0..50u32).flat_map(|y| (0..128u32).map(move |x| (x, y)));
    let inked = label_rows
      .filter(|&(x, y)| frame.rgb_at(x, y) != Some([0, 0, 0]))
      .count();
    assert!(inked > 0);
    assert_eq!(frame.rgb_at(8, 60), Some([255, 0, 0]));
  }

  #[test]
  fn missing_font_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
      Draw::default().with_font_file(dir.path().join("none.ttf")),
      Err(DrawError::IoError(_))
    ));
  }
}
