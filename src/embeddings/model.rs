// docrag/src/embeddings/model.rs
//
// ONNX model inference via tract

use crate::embeddings::config::{EmbedConfig, OnnxModel, PoolingStrategy};
use crate::embeddings::tokenize::{EmbedTokenizer, TokenizedInput};
use crate::embeddings::{Embedder, EmbeddingError};
use std::path::Path;
use std::sync::Arc;
use tract_onnx::prelude::tract_ndarray::{Array2, Array3, Axis, Ix3};
use tract_onnx::prelude::*;

/// Type alias for the tract typed model
type TractModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Loaded embedding model ready for inference
pub struct EmbedModel {
    model: Arc<TractModel>,
    tokenizer: EmbedTokenizer,
    config: EmbedConfig,
    kind: OnnxModel,
    dimensions: usize,
}

impl EmbedModel {
    /// Load model from ONNX bytes and tokenizer JSON
    pub fn from_bytes(
        model_bytes: &[u8],
        tokenizer_json: &str,
        kind: OnnxModel,
        config: EmbedConfig,
    ) -> Result<Self, EmbeddingError> {
        // Load ONNX model via tract
        let model = tract_onnx::onnx()
            .model_for_read(&mut std::io::Cursor::new(model_bytes))
            .map_err(|e| EmbeddingError::LoadFailed(e.to_string()))?
            .into_optimized()
            .map_err(|e| EmbeddingError::LoadFailed(e.to_string()))?
            .into_runnable()
            .map_err(|e| EmbeddingError::LoadFailed(e.to_string()))?;

        // Load tokenizer
        let tokenizer =
            EmbedTokenizer::from_json(tokenizer_json, kind.max_length(), config.truncate_inputs)?;

        let dimensions = config.effective_dim(kind);

        Ok(Self {
            model: Arc::new(model),
            tokenizer,
            config,
            kind,
            dimensions,
        })
    }

    /// Load `model.onnx` + `tokenizer.json` from a model directory
    pub fn from_dir(dir: &Path, kind: OnnxModel, config: EmbedConfig) -> Result<Self, EmbeddingError> {
        let model_path = dir.join(MODEL_FILE);
        let tokenizer_path = dir.join(TOKENIZER_FILE);

        let model_bytes = std::fs::read(&model_path).map_err(|e| {
            EmbeddingError::LoadFailed(format!("{}: {}", model_path.display(), e))
        })?;
        let tokenizer_json = std::fs::read_to_string(&tokenizer_path).map_err(|e| {
            EmbeddingError::LoadFailed(format!("{}: {}", tokenizer_path.display(), e))
        })?;

        let model = Self::from_bytes(&model_bytes, &tokenizer_json, kind, config)?;
        tracing::info!(model = %kind, dir = %dir.display(), dimensions = model.dimensions, "embedding model loaded");
        Ok(model)
    }

    /// Embed one inference batch
    fn run_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        // Tokenize all texts
        let encoded = self.tokenizer.encode_batch(texts)?;
        let (padded, seq_len) = self.tokenizer.pad_batch(encoded);

        // Build input tensors
        let input_ids = self.build_input_tensor(&padded, seq_len, |t| &t.input_ids)?;
        let attention_mask_tensor = self.build_input_tensor(&padded, seq_len, |t| &t.attention_mask)?;
        let token_type_ids = self.build_input_tensor(&padded, seq_len, |t| &t.token_type_ids)?;

        // Also build attention mask as ndarray for pooling
        let attention_mask_arr = self.build_attention_mask_array(&padded, seq_len)?;

        // Run inference
        let inputs: TVec<TValue> = tvec![
            input_ids.into(),
            attention_mask_tensor.into(),
            token_type_ids.into(),
        ];

        let outputs = self.model.run(inputs)
            .map_err(|e| EmbeddingError::InferenceFailed(e.to_string()))?;

        // BERT models output: (batch_size, seq_len, hidden_size)
        let output_tensor = outputs[0]
            .to_array_view::<f32>()
            .map_err(|e| EmbeddingError::Shape(e.to_string()))?;

        let output_3d = output_tensor.to_owned()
            .into_dimensionality::<Ix3>()
            .map_err(|e| EmbeddingError::Shape(format!("Failed to convert to 3D: {}", e)))?;

        let embeddings = self.pool_embeddings(&output_3d, &attention_mask_arr);
        let embeddings = self.truncate_embeddings(embeddings)?;

        // Normalize if configured
        let embeddings = if self.config.normalize {
            normalize_embeddings(embeddings)
        } else {
            embeddings
        };

        Ok(embeddings)
    }

    /// Build input tensor from tokenized inputs
    fn build_input_tensor<F>(
        &self,
        inputs: &[TokenizedInput],
        seq_len: usize,
        extractor: F,
    ) -> Result<Tensor, EmbeddingError>
    where
        F: Fn(&TokenizedInput) -> &[i64],
    {
        let batch_size = inputs.len();
        let mut data = Vec::with_capacity(batch_size * seq_len);

        for input in inputs {
            data.extend_from_slice(extractor(input));
        }

        Tensor::from_shape(&[batch_size, seq_len], &data)
            .map_err(|e| EmbeddingError::Shape(e.to_string()))
    }

    /// Build attention mask as ndarray for pooling calculations
    fn build_attention_mask_array(
        &self,
        inputs: &[TokenizedInput],
        seq_len: usize,
    ) -> Result<Array2<i64>, EmbeddingError> {
        let batch_size = inputs.len();
        let mut data = Vec::with_capacity(batch_size * seq_len);

        for input in inputs {
            data.extend_from_slice(&input.attention_mask);
        }

        Array2::from_shape_vec((batch_size, seq_len), data)
            .map_err(|e| EmbeddingError::Shape(e.to_string()))
    }

    /// Apply pooling strategy to token embeddings
    fn pool_embeddings(&self, output: &Array3<f32>, attention_mask: &Array2<i64>) -> Vec<Vec<f32>> {
        let batch_size = output.shape()[0];
        let hidden_size = output.shape()[2];
        let mut embeddings = Vec::with_capacity(batch_size);

        for i in 0..batch_size {
            let token_embeddings = output.index_axis(Axis(0), i);
            let mask = attention_mask.index_axis(Axis(0), i);

            let embedding = match self.config.pooling {
                PoolingStrategy::Mean => {
                    // Mean pooling: sum(embeddings * mask) / sum(mask)
                    let mut sum = vec![0.0f32; hidden_size];
                    let mut count = 0.0f32;

                    for (j, &m) in mask.iter().enumerate() {
                        if m > 0 {
                            for (k, val) in token_embeddings.row(j).iter().enumerate() {
                                sum[k] += val;
                            }
                            count += 1.0;
                        }
                    }

                    if count > 0.0 {
                        sum.iter_mut().for_each(|v| *v /= count);
                    }

                    sum
                }
                // [CLS] token is at position 0
                PoolingStrategy::Cls => token_embeddings.row(0).to_vec(),
                PoolingStrategy::Max => {
                    let mut max_vals = vec![f32::NEG_INFINITY; hidden_size];

                    for (j, &m) in mask.iter().enumerate() {
                        if m > 0 {
                            for (k, val) in token_embeddings.row(j).iter().enumerate() {
                                if *val > max_vals[k] {
                                    max_vals[k] = *val;
                                }
                            }
                        }
                    }

                    max_vals
                }
            };

            embeddings.push(embedding);
        }

        embeddings
    }

    /// Matryoshka truncation to the configured width; any other width mismatch
    /// means the ONNX file is not the model we think it is.
    fn truncate_embeddings(&self, embeddings: Vec<Vec<f32>>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        embeddings
            .into_iter()
            .map(|mut emb| {
                if emb.len() < self.dimensions {
                    return Err(EmbeddingError::Shape(format!(
                        "{} produced {} dimensions, expected {}",
                        self.kind,
                        emb.len(),
                        self.dimensions
                    )));
                }
                emb.truncate(self.dimensions);
                Ok(emb)
            })
            .collect()
    }
}

impl Embedder for EmbedModel {
    fn model_identifier(&self) -> &str {
        self.kind.identifier()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let batch_size = self.config.batch_size.max(1);
        let mut out = Vec::with_capacity(texts.len());

        // Batches run in input order so ordinals line up with the caller's texts
        for batch in texts.chunks(batch_size) {
            out.extend(self.run_batch(batch)?);
        }

        Ok(out)
    }
}

/// L2 normalize embeddings
pub fn normalize_embeddings(embeddings: Vec<Vec<f32>>) -> Vec<Vec<f32>> {
    embeddings.into_iter()
        .map(|mut emb| {
            let norm: f32 = emb.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                emb.iter_mut().for_each(|x| *x /= norm);
            }
            emb
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        let normalized = normalize_embeddings(vec![vec![3.0, 4.0]]); // norm = 5.0

        assert!((normalized[0][0] - 0.6).abs() < 0.001);
        assert!((normalized[0][1] - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_normalize_zero_vector_untouched() {
        let normalized = normalize_embeddings(vec![vec![0.0, 0.0, 0.0]]);
        assert_eq!(normalized[0], vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_missing_model_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = EmbedModel::from_dir(dir.path(), OnnxModel::AllMiniLML6V2, EmbedConfig::default());
        assert!(matches!(result, Err(EmbeddingError::LoadFailed(_))));
    }
}
