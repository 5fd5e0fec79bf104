use utoipa::OpenApi;

use super::{classes, health, predict, samples, tasks, training};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "intellitrain-server",
        description = "Train audio and image classifiers from labeled samples",
        version = "0.1.0",
    ),
    tags(
        (name = "classes", description = "Per-modality class labels"),
        (name = "samples", description = "Labeled training samples"),
        (name = "training", description = "Background training jobs"),
        (name = "prediction", description = "Inference with the latest model"),
        (name = "tasks", description = "Job records"),
    )
)]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(classes::ClassesApi::openapi());
    root.merge(samples::SamplesApi::openapi());
    root.merge(training::TrainingApi::openapi());
    root.merge(predict::PredictApi::openapi());
    root.merge(tasks::TasksApi::openapi());
    root
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn docs_cover_both_modalities_and_tasks() {
        let docs = get_docs();
        for path in ["/health", "/api/{modality}/samples", "/api/{modality}/train", "/api/tasks/{id}/cancel"] {
            assert!(docs.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
