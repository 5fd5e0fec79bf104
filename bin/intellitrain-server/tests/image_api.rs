//! Image classifier HTTP flow, including the unprefixed legacy routes.

mod common;

use axum::http::StatusCode;
use common::*;

async fn upload_image(app: &axum::Router, uri: &str, class: &str, png: &[u8], augment: bool) -> (StatusCode, serde_json::Value) {
    let file = FilePart { field: "image", filename: "pic.png", content_type: "image/png", bytes: png };
    let augment = if augment { "true" } else { "false" };
    post_multipart(app, uri, &[("label", class), ("augment", augment)], Some(file)).await
}

#[tokio::test]
async fn invalid_images_are_rejected() {
    let (app, _) = setup_app(test_config()).await;
    let (status, body) = upload_image(&app, "/api/image/samples", "Cat", b"not an image", false).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid image"));

    let (_, samples) = get(&app, "/api/image/samples").await;
    assert!(samples.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn augmented_upload_stores_copies() {
    let (app, _) = setup_app(test_config()).await;
    let png = solid_png([200, 30, 30], 20);
    let (status, body) = upload_image(&app, "/api/upload", "Red", &png, true).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["augmented"].as_array().unwrap().len(), 2);

    let (_, samples) = get(&app, "/api/image/samples?class=Red").await;
    assert_eq!(samples.as_array().unwrap().len(), 3);

    let id = body["_id"].as_str().unwrap();
    let response = tower::util::ServiceExt::oneshot(
        app.clone(),
        axum::http::Request::builder()
            .uri(format!("/api/image/samples/{id}/image"))
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.as_ref(), png.as_slice());
}

#[tokio::test]
async fn legacy_routes_train_and_predict_images() {
    let (app, _) = setup_app(test_config()).await;
    let (_, idle) = get(&app, "/api/training-status").await;
    assert_eq!(idle["status"], "idle");

    for i in 0..5 {
        upload_image(&app, "/api/upload", "Red", &solid_png([220, 20, 20], i * 8), false).await;
        upload_image(&app, "/api/image/samples", "Blue", &solid_png([20, 20, 220], i * 8), false).await;
    }

    let (status, accepted) = post_empty(&app, "/api/train").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(accepted["task_id"].is_string());

    let finished = wait_for_training(&app, "image").await;
    assert_eq!(finished["status"], "completed", "{finished}");
    let (_, legacy_status) = get(&app, "/api/training-status").await;
    assert_eq!(legacy_status["status"], "completed");

    let query = solid_png([210, 25, 25], 4);
    let file = FilePart { field: "image", filename: "q.png", content_type: "image/png", bytes: &query };
    let (status, prediction) = post_multipart(&app, "/api/predict", &[], Some(file)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(prediction["class"], "Red");
    assert_eq!(prediction["predictions"].as_array().unwrap().len(), 2);
    let confidence = prediction["confidence"].as_f64().unwrap();
    assert!(confidence > 0.5 && confidence <= 1.0);

    let blue = solid_png([25, 25, 210], 4);
    let file = FilePart { field: "file", filename: "q.png", content_type: "image/png", bytes: &blue };
    let (_, prediction) = post_multipart(&app, "/api/image/predict", &[], Some(file)).await;
    assert_eq!(prediction["class"], "Blue");
}

#[tokio::test]
async fn image_training_needs_two_classes() {
    let (app, _) = setup_app(test_config()).await;
    for i in 0..3 {
        upload_image(&app, "/api/image/samples", "Red", &solid_png([220, 20, 20], i * 8), false).await;
    }
    post_empty(&app, "/api/image/train").await;
    let finished = wait_for_training(&app, "image").await;
    assert_eq!(finished["status"], "failed");
    assert_eq!(finished["error"], "Need at least 2 classes to train");
}
