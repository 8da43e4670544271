// 该文件是 Jingjie （警戒） 项目的一部分。
// src/model/nms.rs - 非极大值抑制
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use crate::model::Detection;

/// 贪心 NMS，返回保留下来的候选下标（按置信度降序）
///
/// 置信度不大于 `score_threshold` 的候选直接丢弃；其余按置信度稳定降序排序，
/// 依次保留与所有已保留框的 IoU 都不超过 `iou_threshold` 的候选。
pub fn nms_indices(candidates: &[Detection], score_threshold: f32, iou_threshold: f32) -> Vec<usize> {
  let mut order: Vec<usize> = (0..candidates.len())
    .filter(|&i| candidates[i].confidence > score_threshold)
    .collect();

  // 稳定排序，置信度相同时保持输入顺序
  order.sort_by(|&a, &b| {
    candidates[b]
      .confidence
      .partial_cmp(&candidates[a].confidence)
      .unwrap_or(std::cmp::Ordering::Equal)
  });

  let mut kept: Vec<usize> = Vec::new();
  for idx in order {
    let bbox = &candidates[idx].bbox;
    if kept
      .iter()
      .all(|&k| candidates[k].bbox.iou(bbox) <= iou_threshold)
    {
      kept.push(idx);
    }
  }

  kept
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::BoxRect;

  fn det(confidence: f32, x: i32, y: i32, width: i32, height: i32) -> Detection {
    Detection {
      class_id: 0,
      confidence,
      bbox: BoxRect {
        x,
        y,
        width,
        height,
      },
    }
  }

  #[test]
  fn empty_input_keeps_nothing() {
    assert!(nms_indices(&[], 0.5, 0.4).is_empty());
  }

  #[test]
  fn keeps_higher_confidence_of_overlapping_pair() {
    let candidates = [det(0.6, 16, 16, 48, 32), det(0.9, 0, 16, 48, 32)];
    assert_eq!(nms_indices(&candidates, 0.5, 0.4), vec![1]);
  }

  #[test]
  fn overlap_at_threshold_is_kept() {
    // IoU = 0.5, 阈值 0.5 时不抑制
    let candidates = [det(0.9, 0, 0, 48, 32), det(0.6, 16, 0, 48, 32)];
    assert_eq!(nms_indices(&candidates, 0.5, 0.5), vec![0, 1]);
  }

  #[test]
  fn separate_clusters_each_keep_one() {
    let candidates = [
      det(0.7, 0, 0, 10, 10),
      det(0.8, 100, 100, 10, 10),
      det(0.95, 1, 1, 10, 10),
      det(0.55, 101, 100, 10, 10),
    ];
    assert_eq!(nms_indices(&candidates, 0.5, 0.4), vec![2, 1]);
  }

  #[test]
  fn equal_scores_prefer_earlier_candidate() {
    let candidates = [det(0.8, 0, 0, 10, 10), det(0.8, 0, 0, 10, 10)];
    assert_eq!(nms_indices(&candidates, 0.5, 0.4), vec![0]);
  }

  #[test]
  fn score_threshold_filters_before_suppression() {
    let candidates = [det(0.5, 0, 0, 10, 10), det(0.45, 50, 50, 10, 10)];
    assert!(nms_indices(&candidates, 0.5, 0.4).is_empty());
  }

  #[test]
  fn suppressed_box_does_not_suppress_others() {
    // b 被 a 抑制, c 与 b 重叠但与 a 不重叠, c 应保留
    let candidates = [
      det(0.9, 0, 0, 10, 10),
      det(0.8, 4, 0, 10, 10),
      det(0.7, 9, 0, 10, 10),
    ];
    assert_eq!(nms_indices(&candidates, 0.5, 0.4), vec![0, 2]);
  }
}
