use std::fs;
use std::path::Path;

use actix_files::NamedFile;
use actix_multipart::Multipart;
use actix_web::{HttpRequest, HttpResponse, web};
use futures::{StreamExt, TryStreamExt};
use image::GrayImage;
use log::info;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::annotate::Annotator;
use crate::dicom;
use crate::error::PipelineError;
use crate::inference::InferenceClient;
use crate::report;
use crate::storage::ArtifactStore;

#[derive(Serialize)]
struct UploadResponse {
    original_image_url: String,
    annotated_image_url: String,
    predictions: serde_json::Value,
    report: String,
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::get().to(read_root)))
        .service(web::resource("/upload/").route(web::post().to(handle_upload)))
        .service(
            web::resource("/converted/{image_name}").route(web::get().to(get_converted_image)),
        );
}

async fn read_root() -> HttpResponse {
    HttpResponse::Ok().json(json!({"message": "Dental X-ray API running"}))
}

/// The whole pipeline: store the upload, decode and normalize, run remote
/// inference, draw the detections, derive the report.
async fn handle_upload(
    payload: Multipart,
    store: web::Data<ArtifactStore>,
    client: web::Data<InferenceClient>,
    annotator: web::Data<Annotator>,
) -> Result<HttpResponse, PipelineError> {
    let (filename, bytes) = read_upload(payload).await?;
    info!("received file: {filename}");

    let extension = Path::new(&filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    if !matches!(extension.as_deref(), Some("dcm") | Some("rvg")) {
        return Err(PipelineError::UnsupportedExtension(
            extension.unwrap_or_else(|| filename.clone()),
        ));
    }

    let file_id = Uuid::new_v4();
    let dicom_path = store.save_upload(file_id, &bytes)?;

    // Decode, normalize and persist the grayscale PNG off the async workers.
    let converted_name = ArtifactStore::converted_name(file_id);
    let block_store = store.get_ref().clone();
    let block_name = converted_name.clone();
    let (converted, png_path) =
        web::block(move || -> Result<_, PipelineError> {
            let image: GrayImage = dicom::decode_to_grayscale(&dicom_path)?;
            let path = block_store.save_converted(&block_name, &image)?;
            Ok((image, path))
        })
        .await??;

    let png_bytes = fs::read(&png_path)?;
    let outcome = client.detect(&converted_name, png_bytes).await?;

    let annotated_name = ArtifactStore::annotated_name(file_id);
    let block_store = store.get_ref().clone();
    let block_name = annotated_name.clone();
    let block_annotator = annotator.clone();
    let detections = outcome.detections.clone();
    web::block(move || -> Result<(), PipelineError> {
        let annotated = block_annotator.annotate(&converted, &detections);
        block_store.save_annotated(&block_name, &annotated)?;
        Ok(())
    })
    .await??;

    let report = report::generate(&outcome.detections);
    info!(
        "pipeline complete for {file_id}: {} detection(s)",
        outcome.detections.len()
    );

    Ok(HttpResponse::Ok().json(UploadResponse {
        original_image_url: format!("/converted/{converted_name}"),
        annotated_image_url: format!("/converted/{annotated_name}"),
        predictions: outcome.raw,
        report,
    }))
}

/// First multipart field carrying a filename wins; everything else is
/// ignored.
async fn read_upload(mut payload: Multipart) -> Result<(String, Vec<u8>), PipelineError> {
    while let Ok(Some(mut field)) = payload.try_next().await {
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);
        let Some(filename) = filename else { continue };

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|e| PipelineError::Io(std::io::Error::other(e.to_string())))?;
            data.extend_from_slice(&chunk);
        }
        return Ok((filename, data));
    }
    Err(PipelineError::MissingFile)
}

async fn get_converted_image(
    req: HttpRequest,
    store: web::Data<ArtifactStore>,
    path: web::Path<String>,
) -> HttpResponse {
    let name = path.into_inner();
    let not_found = || {
        HttpResponse::NotFound().json(json!({
            "error": {"kind": "not-found", "message": "Image not found"}
        }))
    };
    let Some(file_path) = store.resolve_converted(&name) else {
        return not_found();
    };
    match NamedFile::open(&file_path) {
        Ok(file) => file.into_response(&req),
        Err(_) => not_found(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use actix_web::{App, test};
    use std::path::Path as StdPath;
    use std::time::Duration;

    fn test_config(root: &StdPath) -> AppConfig {
        AppConfig {
            roboflow_api_key: "test-key".into(),
            roboflow_model_id: "adr/6".into(),
            inference_base_url: "http://127.0.0.1:1".into(),
            confidence_threshold: 0.3,
            overlap_threshold: 0.5,
            inference_timeout: Duration::from_secs(1),
            upload_dir: root.join("uploads"),
            converted_dir: root.join("converted"),
            allowed_origins: vec!["http://localhost:3000".into()],
            artifact_ttl: Duration::ZERO,
            sweep_interval: Duration::from_secs(3600),
            label_font_path: None,
            port: 0,
        }
    }

    macro_rules! init_app {
        ($config:expr) => {{
            let store = ArtifactStore::new($config);
            store.ensure_dirs().unwrap();
            let client = InferenceClient::new($config).unwrap();
            let annotator = Annotator::from_config($config);
            test::init_service(
                App::new()
                    .app_data(web::Data::new(store))
                    .app_data(web::Data::new(client))
                    .app_data(web::Data::new(annotator))
                    .configure(configure_routes),
            )
            .await
        }};
    }

    fn multipart_body(filename: &str, content: &[u8]) -> (String, Vec<u8>) {
        let boundary = "XBOUNDARYX";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
                 filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        (format!("multipart/form-data; boundary={boundary}"), body)
    }

    #[actix_web::test]
    async fn liveness_route_responds() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let app = init_app!(&config);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert!(resp.status().is_success());
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Dental X-ray API running");
    }

    #[actix_web::test]
    async fn bad_extension_is_rejected_and_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let app = init_app!(&config);

        let (content_type, body) = multipart_body("scan.jpg", b"not dicom");
        let req = test::TestRequest::post()
            .uri("/upload/")
            .insert_header(("content-type", content_type))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["kind"], "unsupported-extension");

        assert_eq!(fs::read_dir(dir.path().join("uploads")).unwrap().count(), 0);
        assert_eq!(
            fs::read_dir(dir.path().join("converted")).unwrap().count(),
            0
        );
    }

    #[actix_web::test]
    async fn upload_without_file_field_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let app = init_app!(&config);

        let boundary = "XBOUNDARYX";
        let body = format!("--{boundary}--\r\n");
        let req = test::TestRequest::post()
            .uri("/upload/")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            ))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["kind"], "missing-file");
    }

    #[actix_web::test]
    async fn undecodable_upload_fails_as_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let app = init_app!(&config);

        let (content_type, body) = multipart_body("scan.dcm", b"garbage bytes");
        let req = test::TestRequest::post()
            .uri("/upload/")
            .insert_header(("content-type", content_type))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 500);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["kind"], "decode-error");

        // The raw upload is written before decoding and stays for the sweep.
        assert_eq!(fs::read_dir(dir.path().join("uploads")).unwrap().count(), 1);
    }

    #[actix_web::test]
    async fn converted_retrieval_returns_exact_bytes_or_404() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let app = init_app!(&config);

        let stored = b"\x89PNG\r\n\x1a\nfake image bytes".to_vec();
        fs::write(dir.path().join("converted").join("known.png"), &stored).unwrap();

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/converted/known.png")
                .to_request(),
        )
        .await;
        assert!(resp.status().is_success());
        let body = test::read_body(resp).await;
        assert_eq!(body.as_ref(), stored.as_slice());

        let resp = test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/converted/never-generated.png")
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), 404);
    }
}
