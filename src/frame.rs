// 该文件是 Jingjie （警戒） 项目的一部分。
// src/frame.rs - 帧与 NCHW 张量定义
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

use image::{ImageBuffer, Rgb, RgbImage, imageops::FilterType};
use thiserror::Error;

const CHANNELS: usize = 3;

/// 像素的通道排列顺序
///
/// 采集端（摄像头、解码器）给出 BGR，网络输入与显示端使用 RGB。
/// 两者之间的转换只能通过 [`Frame::convert`] / [`Frame::into_order`] 显式完成。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOrder {
  Rgb,
  Bgr,
}

impl ChannelOrder {
  /// 将 RGB 语义的颜色编码为该通道顺序下的像素值
  pub fn encode(self, color: [u8; 3]) -> Rgb<u8> {
    match self {
      ChannelOrder::Rgb => Rgb(color),
      ChannelOrder::Bgr => Rgb([color[2], color[1], color[0]]),
    }
  }
}

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 三通道 HWC 像素缓冲
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
  width: u32,
  height: u32,
  order: ChannelOrder,
  data: Box<[u8]>,
}

impl Frame {
  pub fn new(
    width: u32,
    height: u32,
    order: ChannelOrder,
    data: Vec<u8>,
  ) -> Result<Self, FrameError> {
    let expected = CHANNELS * width as usize * height as usize;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    Ok(Self {
      width,
      height,
      order,
      data: data.into_boxed_slice(),
    })
  }

  /// 以单一颜色（RGB 语义）填充的帧
  pub fn filled(width: u32, height: u32, order: ChannelOrder, color: [u8; 3]) -> Self {
    let pixel = order.encode(color).0;
    let data = pixel
      .iter()
      .copied()
      .cycle()
      .take(CHANNELS * width as usize * height as usize)
      .collect::<Vec<u8>>();

    Self {
      width,
      height,
      order,
      data: data.into_boxed_slice(),
    }
  }

  pub fn from_rgb_image(image: RgbImage) -> Self {
    let (width, height) = image.dimensions();
    Self {
      width,
      height,
      order: ChannelOrder::Rgb,
      data: image.into_raw().into_boxed_slice(),
    }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn order(&self) -> ChannelOrder {
    self.order
  }

  pub fn channels(&self) -> usize {
    CHANNELS
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.data
  }

  pub fn is_empty(&self) -> bool {
    self.width == 0 || self.height == 0
  }

  /// 读取 (x, y) 处的像素，按 RGB 语义返回
  pub fn rgb_at(&self, x: u32, y: u32) -> Option<[u8; 3]> {
    if x >= self.width || y >= self.height {
      return None;
    }
    let idx = (y as usize * self.width as usize + x as usize) * CHANNELS;
    let raw = [self.data[idx], self.data[idx + 1], self.data[idx + 2]];
    Some(self.order.encode(raw).0)
  }

  /// 通道重排：返回指定通道顺序的新帧
  pub fn convert(&self, to: ChannelOrder) -> Frame {
    self.clone().into_order(to)
  }

  /// 通道重排（消耗 self）
  pub fn into_order(mut self, to: ChannelOrder) -> Frame {
    if self.order != to {
      self
        .data
        .chunks_exact_mut(CHANNELS)
        .for_each(|pixel| pixel.swap(0, 2));
      self.order = to;
    }
    self
  }

  /// 转换为 RGB 顺序的图像
  pub fn to_rgb_image(&self) -> RgbImage {
    let converted = self.convert(ChannelOrder::Rgb);
    ImageBuffer::from_fn(self.width, self.height, |x, y| {
      let idx = (y as usize * self.width as usize + x as usize) * CHANNELS;
      Rgb([
        converted.data[idx],
        converted.data[idx + 1],
        converted.data[idx + 2],
      ])
    })
  }

  /// 以原始通道顺序借出可绘制的画布
  pub fn canvas_mut(&mut self) -> Option<ImageBuffer<Rgb<u8>, &mut [u8]>> {
    ImageBuffer::from_raw(self.width, self.height, &mut self.data[..])
  }
}

/// NCHW 浮点网络输入张量，空间尺寸固定为 W×H
#[derive(Debug, Clone)]
pub struct Blob<const W: u32, const H: u32> {
  data: Box<[f32]>,
}

impl<const W: u32, const H: u32> Blob<W, H> {
  /// 缩放到 W×H（不裁剪）、重排通道到 `order`、乘以 `scale`
  pub fn from_frame(frame: &Frame, scale: f32, order: ChannelOrder) -> Self {
    let plane = W as usize * H as usize;
    let mut data = vec![0f32; CHANNELS * plane];

    let source: ImageBuffer<Rgb<u8>, &[u8]> =
      match ImageBuffer::from_raw(frame.width, frame.height, frame.as_bytes()) {
        Some(source) if !frame.is_empty() => source,
        _ => {
          return Self {
            data: data.into_boxed_slice(),
          };
        }
      };

    let resized = image::imageops::resize(&source, W, H, FilterType::Triangle);
    let swap = frame.order != order;

    for (idx, pixel) in resized.pixels().enumerate() {
      let [c0, c1, c2] = pixel.0;
      let (first, last) = if swap { (c2, c0) } else { (c0, c2) };
      data[idx] = first as f32 * scale;
      data[plane + idx] = c1 as f32 * scale;
      data[2 * plane + idx] = last as f32 * scale;
    }

    Self {
      data: data.into_boxed_slice(),
    }
  }

  pub fn shape(&self) -> [usize; 4] {
    [1, CHANNELS, H as usize, W as usize]
  }

  pub fn width(&self) -> usize {
    W as usize
  }

  pub fn height(&self) -> usize {
    H as usize
  }

  pub fn as_slice(&self) -> &[f32] {
    &self.data
  }
}
