//! Request and response bodies (serde + OpenAPI schemas).

pub mod class;
pub mod model;
pub mod prediction;
pub mod sample;
pub mod task;
pub mod training;
