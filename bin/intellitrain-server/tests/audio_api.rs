//! Audio classifier HTTP flow: classes, sample upload, training, prediction.

mod common;

use axum::http::StatusCode;
use common::*;
use chrono::Utc;
use intellitrain_core::{CancelToken, Modality};
use intellitrain_server::entities::{BlobRecord, ClassStore, SampleRecord, SampleStore};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn short_or_quiet_clips_are_rejected_without_side_effects() {
    let (app, _) = setup_app(test_config()).await;

    let (status, body) = upload_audio(&app, "Dog", &tone_wav(440.0, 0.2, 0.5)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Audio too short"));

    let (status, body) = upload_audio(&app, "Dog", &tone_wav(440.0, 1.0, 0.001)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Audio too quiet"));

    let (_, samples) = get(&app, "/api/audio/samples").await;
    assert_eq!(samples.as_array().unwrap().len(), 0);
    let (_, classes) = get(&app, "/api/audio/classes").await;
    assert_eq!(classes.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn upload_requires_file_and_class() {
    let (app, _) = setup_app(test_config()).await;

    let (status, body) = post_multipart(&app, "/api/audio/samples", &[("class", "Dog")], None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file uploaded");

    let wav = tone_wav(440.0, 1.0, 0.5);
    let file = FilePart { field: "file", filename: "a.wav", content_type: "audio/wav", bytes: &wav };
    let (status, body) = post_multipart(&app, "/api/audio/samples", &[], Some(file)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Class is required");
}

#[tokio::test]
async fn uploads_create_their_class_once() {
    let (app, _) = setup_app(test_config()).await;
    let wav = tone_wav(440.0, 1.0, 0.5);

    let (status, first) = upload_audio(&app, "Dog", &wav).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["class"], "Dog");
    assert!(first["_id"].is_string());
    let (status, _) = upload_audio(&app, "Dog", &wav).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, classes) = get(&app, "/api/audio/classes").await;
    let names: Vec<_> = classes.as_array().unwrap().iter().map(|c| c["name"].clone()).collect();
    assert_eq!(names, vec![json!("Dog")]);

    let (_, samples) = get(&app, "/api/audio/samples?class=Dog").await;
    assert_eq!(samples.as_array().unwrap().len(), 2);
    let (_, none) = get(&app, "/api/audio/samples?class=Cat").await;
    assert!(none.as_array().unwrap().is_empty());

    // Image classes are a separate namespace.
    let (_, image_classes) = get(&app, "/api/image/classes").await;
    assert!(image_classes.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn explicit_class_management() {
    let (app, _) = setup_app(test_config()).await;

    let (status, created) = post_json(&app, "/api/audio/classes", json!({ "name": "Bird" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "Bird");
    assert_eq!(created["is_default"], false);

    let (status, body) = post_json(&app, "/api/audio/classes", json!({ "name": "Bird" })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Class already exists");

    let (status, _) = post_json(&app, "/api/audio/classes", json!({ "name": "   " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, seeded) = post_empty(&app, "/api/audio/classes/initialize-defaults").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(seeded.as_array().unwrap().len(), 3);
    let (_, again) = post_empty(&app, "/api/audio/classes/initialize-defaults").await;
    assert_eq!(again.as_array().unwrap().len(), 3);

    let (status, _) = delete(&app, "/api/audio/classes/Bird").await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = delete(&app, "/api/audio/classes/Bird").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sample_playback_and_deletion() {
    let (app, _) = setup_app(test_config()).await;
    let wav = tone_wav(440.0, 1.0, 0.5);
    let (_, sample) = upload_audio(&app, "Dog", &wav).await;
    let id = sample["_id"].as_str().unwrap();

    let response = tower::util::ServiceExt::oneshot(
        app.clone(),
        axum::http::Request::builder()
            .uri(format!("/api/audio/samples/{id}/play"))
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "audio/wav");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.as_ref(), wav.as_slice());

    let (status, body) = delete(&app, &format!("/api/audio/samples/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "deleted");

    let (status, _) = delete(&app, &format!("/api/audio/samples/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = get(&app, &format!("/api/audio/samples/{id}/play")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_modality_is_not_found() {
    let (app, _) = setup_app(test_config()).await;
    let (status, body) = get(&app, "/api/video/classes").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("video"));
}

#[tokio::test]
async fn predict_without_model_is_a_precondition_failure() {
    let (app, _) = setup_app(test_config()).await;
    let (status, body) = predict_audio(&app, &tone_wav(440.0, 1.0, 0.5)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No trained model available");
}

#[tokio::test]
async fn training_with_one_class_fails_with_reason() {
    let (app, _) = setup_app(test_config()).await;
    let (_, idle) = get(&app, "/api/audio/training-status").await;
    assert_eq!(idle["status"], "idle");

    for i in 0..5 {
        upload_audio(&app, "Dog", &tone_wav(400.0 + i as f32 * 10.0, 1.0, 0.5)).await;
    }
    let (status, accepted) = post_empty(&app, "/api/audio/train").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(accepted["status"], "pending");

    let finished = wait_for_training(&app, "audio").await;
    assert_eq!(finished["status"], "failed");
    assert_eq!(finished["error"], "Need at least 2 classes to train");
    assert_eq!(finished["task_id"], accepted["task_id"]);

    let (_, models) = get(&app, "/api/audio/models").await;
    assert!(models.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn training_with_four_samples_fails_without_artifact() {
    let (app, _) = setup_app(test_config()).await;
    for i in 0..2 {
        upload_audio(&app, "Low", &tone_wav(300.0 + i as f32 * 20.0, 1.0, 0.5)).await;
        upload_audio(&app, "High", &tone_wav(3000.0 + i as f32 * 20.0, 1.0, 0.5)).await;
    }
    let (status, _) = post_empty(&app, "/api/audio/train").await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let finished = wait_for_training(&app, "audio").await;
    assert_eq!(finished["status"], "failed");
    assert_eq!(finished["error"], "Need at least 5 total samples to train");
    let (_, models) = get(&app, "/api/audio/models").await;
    assert!(models.as_array().unwrap().is_empty());
    let (status, _) = predict_audio(&app, &tone_wav(300.0, 1.0, 0.5)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn overlapping_training_is_rejected() {
    let (app, state) = setup_app(test_config()).await;
    let _held: CancelToken = state.task_manager.try_begin("already-running", "audio.train").unwrap();

    let (status, body) = post_empty(&app, "/api/audio/train").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("already-running"));

    // The other modality is unaffected; it fails its own preconditions.
    let (status, _) = post_empty(&app, "/api/image/train").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    wait_for_training(&app, "image").await;
}

#[tokio::test]
async fn train_then_predict_separable_tones() {
    let (app, _) = setup_app(test_config()).await;
    for i in 0..6 {
        let jitter = i as f32 * 15.0;
        let (status, _) = upload_audio(&app, "Low", &tone_wav(300.0 + jitter, 1.2, 0.5)).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = upload_audio(&app, "High", &tone_wav(3000.0 + jitter, 1.2, 0.5)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, accepted) = post_empty(&app, "/api/audio/train").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let finished = wait_for_training(&app, "audio").await;
    assert_eq!(finished["status"], "completed", "{finished}");

    let task_uri = format!("/api/tasks/{}", accepted["task_id"].as_str().unwrap());
    let (_, task) = get(&app, &task_uri).await;
    assert_eq!(task["status"], "succeeded");
    assert_eq!(task["result"]["classes"], json!(["High", "Low"]));

    let query = tone_wav(320.0, 1.0, 0.5);
    let (status, first) = predict_audio(&app, &query).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["ranked"][0]["class"], "Low");
    let total: f64 = first["predictions"].as_object().unwrap().values().map(|v| v.as_f64().unwrap()).sum();
    assert!((total - 1.0).abs() < 1e-3);

    let (_, second) = predict_audio(&app, &query).await;
    assert_eq!(first["predictions"], second["predictions"]);

    let (_, high) = predict_audio(&app, &tone_wav(3050.0, 1.0, 0.5)).await;
    assert_eq!(high["ranked"][0]["class"], "High");

    let (_, models) = get(&app, "/api/audio/models").await;
    let models = models.as_array().unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0]["id"], first["model_id"]);
    assert_eq!(models[0]["extractor"], "spectral-v1");
}

/// Insert an audio sample whose stored embedding came from another extractor.
async fn insert_stale_sample(state: &intellitrain_server::AppState, class_name: &str, wav: Vec<u8>) {
    state.store.get_or_create_class(Modality::Audio, class_name, false).await.unwrap();
    let blob = BlobRecord {
        id: Uuid::new_v4().to_string(),
        data: wav,
        filename: Some("old.wav".into()),
        content_type: "audio/wav".into(),
        created_at: Utc::now(),
    };
    let sample = SampleRecord {
        id: Uuid::new_v4().to_string(),
        modality: Modality::Audio,
        class_name: class_name.into(),
        blob_id: Some(blob.id.clone()),
        inline_b64: None,
        filename: blob.filename.clone(),
        content_type: Some(blob.content_type.clone()),
        embedding: Some(vec![0.5, 0.5]),
        extractor: Some("old-extractor".into()),
        created_at: Utc::now(),
    };
    state.store.create_sample(sample, Some(blob)).await.unwrap();
}

#[tokio::test]
async fn training_re_embeds_samples_from_a_previous_extractor() {
    let (app, state) = setup_app(test_config()).await;
    for i in 0..4 {
        let jitter = i as f32 * 20.0;
        insert_stale_sample(&state, "Low", tone_wav(300.0 + jitter, 1.2, 0.5)).await;
        insert_stale_sample(&state, "High", tone_wav(3000.0 + jitter, 1.2, 0.5)).await;
    }

    let (status, _) = post_empty(&app, "/api/audio/train").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let finished = wait_for_training(&app, "audio").await;
    assert_eq!(finished["status"], "completed", "{finished}");

    let (status, low) = predict_audio(&app, &tone_wav(330.0, 1.0, 0.5)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(low["ranked"][0]["class"], "Low");

    let (_, models) = get(&app, "/api/audio/models").await;
    assert_eq!(models[0]["extractor"], "spectral-v1");
}
