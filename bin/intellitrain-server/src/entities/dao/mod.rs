pub mod class;
pub mod model;
pub mod sample;
pub mod task;

pub use class::ClassRecord;
pub use model::ModelArtifactRecord;
pub use sample::{BlobRecord, SampleRecord, StoredSample, decode_embedding, encode_embedding};
pub use task::{TaskRecord, TaskStatus};
