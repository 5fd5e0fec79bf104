use chrono::{DateTime, Utc};
use intellitrain_core::Modality;

/// Raw upload bytes, referenced by audio samples.
#[derive(Debug, Clone)]
pub struct BlobRecord {
    pub id: String,
    pub data: Vec<u8>,
    pub filename: Option<String>,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

/// A row in the `samples` table. Exactly one of `blob_id` / `inline_b64`
/// carries the payload.
#[derive(Debug, Clone)]
pub struct SampleRecord {
    pub id: String,
    pub modality: Modality,
    pub class_name: String,
    pub blob_id: Option<String>,
    pub inline_b64: Option<String>,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    /// Audio only: the embedding computed at upload time.
    pub embedding: Option<Vec<f32>>,
    /// Name of the extractor that produced `embedding`.
    pub extractor: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// What training reads back: the raw payload plus the precomputed embedding
/// and the extractor it came from, when there is one.
#[derive(Debug, Clone)]
pub struct StoredSample {
    pub id: String,
    pub class_name: String,
    pub embedding: Option<Vec<f32>>,
    pub extractor: Option<String>,
    pub payload: Option<Vec<u8>>,
}

impl StoredSample {
    /// The stored embedding, if it was produced by `extractor` with `dim` values.
    pub fn embedding_for(&self, extractor: &str, dim: usize) -> Option<&[f32]> {
        match (&self.embedding, &self.extractor) {
            (Some(embedding), Some(name)) if name == extractor && embedding.len() == dim => Some(embedding),
            _ => None,
        }
    }
}

/// Little-endian `f32` values, four bytes each.
pub fn encode_embedding(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn embedding_bytes_round_trip() {
        let v = vec![0.25f32, -1.5, 3.0];
        assert_eq!(decode_embedding(&encode_embedding(&v)), Some(v));
        assert_eq!(decode_embedding(&[1, 2, 3]), None);
    }

    #[test]
    fn embedding_bytes_are_little_endian() {
        assert_eq!(encode_embedding(&[1.0, -2.0]), [0, 0, 128, 63, 0, 0, 0, 192]);
        assert_eq!(decode_embedding(&[0, 0, 192, 63]), Some(vec![1.5]));
    }

    #[test]
    fn stored_embedding_is_reused_only_for_its_extractor() {
        let sample = StoredSample {
            id: "s".into(),
            class_name: "dog".into(),
            embedding: Some(vec![0.5, 0.5]),
            extractor: Some("spectral-v1".into()),
            payload: Some(b"RIFF".to_vec()),
        };
        assert_eq!(sample.embedding_for("spectral-v1", 2), Some(&[0.5, 0.5][..]));
        assert_eq!(sample.embedding_for("spectral-v1", 3), None);
        assert_eq!(sample.embedding_for("onnx", 2), None);

        let unlabelled = StoredSample { extractor: None, ..sample };
        assert_eq!(unlabelled.embedding_for("spectral-v1", 2), None);
    }
}
