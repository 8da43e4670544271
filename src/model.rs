// 该文件是 Jingjie （警戒） 项目的一部分。
// src/model.rs - 模型
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use thiserror::Error;

use crate::frame::Blob;

mod decode;
mod nms;
#[cfg(feature = "onnx_model")]
mod onnx;

pub use self::decode::{BOX_FIELDS, decode};
pub use self::nms::nms_indices;
#[cfg(feature = "onnx_model")]
pub use self::onnx::{OnnxNetwork, OnnxNetworkBuilder, OnnxNetworkError};

/// 推理后端：输入固定尺寸的 NCHW 张量，输出每个检测层的原始结果
pub trait Network<const W: u32, const H: u32> {
  type Error: std::error::Error + Send + Sync + 'static;

  fn forward(&self, blob: &Blob<W, H>) -> Result<Vec<LayerOutput>, Self::Error>;
}

impl<const W: u32, const H: u32, N: Network<W, H>> Network<W, H> for &N {
  type Error = N::Error;

  fn forward(&self, blob: &Blob<W, H>) -> Result<Vec<LayerOutput>, Self::Error> {
    (**self).forward(blob)
  }
}

#[derive(Error, Debug)]
pub enum ModelError {
  #[error("输出行宽度不匹配: 期望 {expected}, 实际 {actual}")]
  RowWidthMismatch { expected: usize, actual: usize },
  #[error("输出数据长度 {len} 不是行宽度 {row_len} 的整数倍")]
  RaggedOutput { len: usize, row_len: usize },
  #[error("类别表不一致: {labels} 个标签, {colors} 种颜色")]
  ClassTableMismatch { labels: usize, colors: usize },
  #[error("类别表为空")]
  EmptyClassTable,
}

/// 单个检测层的输出，按行展开，每行是一个候选
#[derive(Debug, Clone, PartialEq)]
pub struct LayerOutput {
  row_len: usize,
  data: Vec<f32>,
}

impl LayerOutput {
  pub fn new(row_len: usize, data: Vec<f32>) -> Result<Self, ModelError> {
    if row_len == 0 || data.len() % row_len != 0 {
      return Err(ModelError::RaggedOutput {
        len: data.len(),
        row_len,
      });
    }
    Ok(Self { row_len, data })
  }

  pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<Self, ModelError> {
    let row_len = rows.first().map(|r| r.as_ref().len()).unwrap_or(BOX_FIELDS + 1);
    let mut data = Vec::with_capacity(row_len * rows.len());
    for row in rows {
      let row = row.as_ref();
      if row.len() != row_len {
        return Err(ModelError::RowWidthMismatch {
          expected: row_len,
          actual: row.len(),
        });
      }
      data.extend_from_slice(row);
    }
    Self::new(row_len, data)
  }

  pub fn row_len(&self) -> usize {
    self.row_len
  }

  pub fn num_rows(&self) -> usize {
    self.data.len() / self.row_len
  }

  pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
    self.data.chunks_exact(self.row_len)
  }
}

/// 像素坐标下的矩形，(x, y) 为左上角
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoxRect {
  pub x: i32,
  pub y: i32,
  pub width: i32,
  pub height: i32,
}

impl BoxRect {
  pub fn area(&self) -> i64 {
    self.width.max(0) as i64 * self.height.max(0) as i64
  }

  pub fn intersection(&self, other: &BoxRect) -> i64 {
    let x1 = self.x.max(other.x) as i64;
    let y1 = self.y.max(other.y) as i64;
    let x2 = (self.x as i64 + self.width as i64).min(other.x as i64 + other.width as i64);
    let y2 = (self.y as i64 + self.height as i64).min(other.y as i64 + other.height as i64);

    (x2 - x1).max(0) * (y2 - y1).max(0)
  }

  /// 交并比
  pub fn iou(&self, other: &BoxRect) -> f32 {
    let inter = self.intersection(other);
    let union = self.area() + other.area() - inter;
    if union <= 0 {
      return 0.0;
    }
    inter as f32 / union as f32
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
  pub class_id: usize,
  pub confidence: f32,
  pub bbox: BoxRect,
}

/// 类别标签与显示颜色，两者长度必须与模型的类别数一致
#[derive(Debug, Clone)]
pub struct ClassTable {
  labels: Vec<String>,
  colors: Vec<[u8; 3]>,
}

impl ClassTable {
  pub fn new(labels: Vec<String>, colors: Vec<[u8; 3]>) -> Result<Self, ModelError> {
    if labels.is_empty() {
      return Err(ModelError::EmptyClassTable);
    }
    if labels.len() != colors.len() {
      return Err(ModelError::ClassTableMismatch {
        labels: labels.len(),
        colors: colors.len(),
      });
    }
    Ok(Self { labels, colors })
  }

  /// 单类别武器表：红色
  pub fn weapon() -> Self {
    Self {
      labels: vec!["Weapon".to_string()],
      colors: vec![[255, 0, 0]],
    }
  }

  pub fn len(&self) -> usize {
    self.labels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.labels.is_empty()
  }

  pub fn label(&self, class_id: usize) -> Option<&str> {
    self.labels.get(class_id).map(String::as_str)
  }

  pub fn color(&self, class_id: usize) -> Option<[u8; 3]> {
    self.colors.get(class_id).copied()
  }
}

impl Default for ClassTable {
  fn default() -> Self {
    Self::weapon()
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
  /// 置信度阈值（严格大于才保留）
  pub confidence: f32,
  /// NMS IoU 阈值
  pub nms: f32,
}

impl Default for Thresholds {
  fn default() -> Self {
    Self {
      confidence: 0.5,
      nms: 0.4,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn rect(x: i32, y: i32, width: i32, height: i32) -> BoxRect {
    BoxRect {
      x,
      y,
      width,
      height,
    }
  }

  #[test]
  fn iou_of_identical_boxes_is_one() {
    let a = rect(3, 4, 10, 20);
    assert_eq!(a.iou(&a), 1.0);
  }

  #[test]
  fn iou_of_disjoint_boxes_is_zero() {
    assert_eq!(rect(0, 0, 10, 10).iou(&rect(10, 0, 10, 10)), 0.0);
  }

  #[test]
  fn iou_of_half_shifted_boxes() {
    // 交集 32x32, 并集 64x32
    let a = rect(0, 0, 48, 32);
    let b = rect(16, 0, 48, 32);
    assert_eq!(a.iou(&b), 0.5);
  }

  #[test]
  fn iou_of_degenerate_boxes_is_zero() {
    assert_eq!(rect(0, 0, 0, 0).iou(&rect(0, 0, 0, 0)), 0.0);
  }

  #[test]
  fn layer_output_rejects_ragged_data() {
    assert!(matches!(
      LayerOutput::new(6, vec![0.0; 7]),
      Err(ModelError::RaggedOutput { len: 7, row_len: 6 })
    ));
    assert!(LayerOutput::new(0, Vec::new()).is_err());
  }

  #[test]
  fn layer_output_rows() {
    let layer = LayerOutput::from_rows(&[[1.0, 2.0], [3.0, 4.0]]).unwrap();
    assert_eq!(layer.num_rows(), 2);
    assert_eq!(layer.rows().nth(1), Some(&[3.0, 4.0][..]));
  }

  #[test]
  fn class_table_requires_matching_lengths() {
    assert!(matches!(
      ClassTable::new(vec!["a".into(), "b".into()], vec![[0, 0, 0]]),
      Err(ModelError::ClassTableMismatch {
        labels: 2,
        colors: 1
      })
    ));
    assert!(matches!(
      ClassTable::new(Vec::new(), Vec::new()),
      Err(ModelError::EmptyClassTable)
    ));
  }

  #[test]
  fn weapon_table_has_single_red_class() {
    let table = ClassTable::weapon();
    assert_eq!(table.len(), 1);
    assert_eq!(table.label(0), Some("Weapon"));
    assert_eq!(table.color(0), Some([255, 0, 0]));
    assert_eq!(table.label(1), None);
  }
}
