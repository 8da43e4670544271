// 该文件是 Jingjie （警戒） 项目的一部分。
// src/model/onnx.rs - ONNX Runtime 推理后端
//
// 本程序遵循 GNU Affero 通用公共许可证（AGPL）许可协议。
// 本程序的发布旨在提供实用价值，但不作任何形式的担保，
// 包括但不限于对适销性或特定用途适用性的默示担保。
// 更多详情请参阅 GNU 通用公共许可证。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, ETVP

use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Blob,
  model::{LayerOutput, ModelError, Network},
};

const ONNX_NUM_INPUTS: usize = 1;
const DEFAULT_INTRA_THREADS: usize = 4;

#[derive(Error, Debug)]
pub enum OnnxNetworkError {
  #[error("模型文件不存在: {0}")]
  ModelNotFound(String),
  #[error("模型无效: {0}")]
  ModelInvalid(String),
  #[error("ONNX Runtime 错误: {0}")]
  OrtError(#[from] ort::Error),
  #[error("输出解析错误: {0}")]
  OutputError(#[from] ModelError),
  #[error("推理会话锁已损坏")]
  SessionPoisoned,
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub struct OnnxNetworkBuilder {
  model_path: String,
  intra_threads: usize,
}

impl FromUrlWithScheme for OnnxNetworkBuilder {
  const SCHEME: &'static str = "yolov3";
}

impl FromUrl for OnnxNetworkBuilder {
  type Error = OnnxNetworkError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(OnnxNetworkError::SchemeMismatch(format!(
        "模型路径必须使用 {} 方案, 实际为 {}",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let intra_threads = url
      .query_pairs()
      .find(|(k, _)| k == "threads")
      .and_then(|(_, v)| v.parse::<usize>().ok())
      .unwrap_or(DEFAULT_INTRA_THREADS);

    Ok(OnnxNetworkBuilder {
      model_path: url.path().to_string(),
      intra_threads,
    })
  }
}

impl OnnxNetworkBuilder {
  pub fn new(model_path: impl Into<String>) -> Self {
    Self {
      model_path: model_path.into(),
      intra_threads: DEFAULT_INTRA_THREADS,
    }
  }

  pub fn intra_threads(mut self, threads: usize) -> Self {
    self.intra_threads = threads.max(1);
    self
  }

  pub fn model_path(&self) -> &str {
    &self.model_path
  }

  pub fn build(self) -> Result<OnnxNetwork, OnnxNetworkError> {
    info!("加载模型文件: {}", self.model_path);
    if !std::path::Path::new(&self.model_path).is_file() {
      error!("模型文件不存在: {}", self.model_path);
      return Err(OnnxNetworkError::ModelNotFound(self.model_path));
    }

    let session = Session::builder()?
      .with_intra_threads(self.intra_threads)?
      .commit_from_file(&self.model_path)?;

    if session.inputs.len() != ONNX_NUM_INPUTS {
      error!(
        "预期模型输入数量为 {}, 实际为 {}",
        ONNX_NUM_INPUTS,
        session.inputs.len()
      );
      return Err(OnnxNetworkError::ModelInvalid(format!(
        "预期模型输入数量为 {}, 实际为 {}",
        ONNX_NUM_INPUTS,
        session.inputs.len()
      )));
    }

    let input_name = session.inputs[0].name.clone();
    let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
    if output_names.is_empty() {
      return Err(OnnxNetworkError::ModelInvalid("模型没有输出层".to_string()));
    }

    debug!("模型输入: {}", input_name);
    debug!("模型输出层: {:?}", output_names);
    info!("模型加载完成");

    Ok(OnnxNetwork {
      session: Mutex::new(session),
      input_name,
      output_names,
    })
  }
}

/// ONNX 格式的 YOLOv3 网络
///
/// 前向推理需要独占会话，因此会话放在 `Mutex` 中；网络本身可在线程间共享。
pub struct OnnxNetwork {
  session: Mutex<Session>,
  input_name: String,
  output_names: Vec<String>,
}

impl OnnxNetwork {
  /// 产生检测结果的输出层名称
  pub fn output_names(&self) -> &[String] {
    &self.output_names
  }
}

impl<const W: u32, const H: u32> Network<W, H> for OnnxNetwork {
  type Error = OnnxNetworkError;

  fn forward(&self, blob: &Blob<W, H>) -> Result<Vec<LayerOutput>, Self::Error> {
    let tensor = Tensor::from_array((blob.shape(), blob.as_slice().to_vec().into_boxed_slice()))?;

    let mut session = self
      .session
      .lock()
      .map_err(|_| OnnxNetworkError::SessionPoisoned)?;

    debug!("执行模型推理");
    let outputs = session.run(ort::inputs![self.input_name.as_str() => tensor])?;

    let mut layers = Vec::with_capacity(self.output_names.len());
    for name in &self.output_names {
      let (shape, data) = outputs[name.as_str()].try_extract_tensor::<f32>()?;
      let row_len = shape
        .last()
        .copied()
        .filter(|&d| d > 0)
        .ok_or_else(|| OnnxNetworkError::ModelInvalid(format!("输出层 {} 形状无效: {:?}", name, shape)))?;
      debug!("输出层 {}: 形状 {:?}", name, shape);
      layers.push(LayerOutput::new(row_len as usize, data.to_vec())?);
    }

    Ok(layers)
  }
}
