//! `ImageDownloader` against a local `wiremock` server.

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use grocer_core::ProductRecord;
use grocer_crawler::{CrawlError, ImageDownloader};

fn downloader(dir: &tempfile::TempDir) -> ImageDownloader {
    ImageDownloader::new(dir.path().join("images"), 5, "grocer-test/0.1")
        .expect("failed to build test downloader")
}

fn product(image: &str, name: Option<&str>) -> ProductRecord {
    let mut value = json!({"name": "Milk 2L", "imgSrc": image});
    if let Some(name) = name {
        value["imgName"] = json!(name);
    }
    ProductRecord::from_value(value).unwrap()
}

#[tokio::test]
async fn saves_image_under_suggested_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/milk.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\x89PNG fake".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let images = downloader(&dir);

    let saved = images
        .download(&product(&format!("{}/img/milk.png", server.uri()), Some("milk-2l")))
        .await
        .unwrap()
        .expect("image written");

    assert_eq!(saved, dir.path().join("images").join("milk-2l.png"));
    assert_eq!(std::fs::read(&saved).unwrap(), b"\x89PNG fake");
}

#[tokio::test]
async fn existing_image_is_not_fetched_again() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/milk.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let images = downloader(&dir);
    let record = product(&format!("{}/img/milk.png", server.uri()), None);

    assert!(images.download(&record).await.unwrap().is_some());
    assert!(images.download(&record).await.unwrap().is_none());
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/gone.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let result = downloader(&dir)
        .download(&product(&format!("{}/img/gone.jpg", server.uri()), None))
        .await;

    assert!(
        matches!(result, Err(CrawlError::HttpStatus { status: 404, .. })),
        "expected HttpStatus 404, got: {result:?}"
    );
    assert!(!dir.path().join("images").exists());
}

#[tokio::test]
async fn record_without_image_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let record = ProductRecord::from_value(json!({"name": "Loose Carrots"})).unwrap();

    assert!(downloader(&dir).download(&record).await.unwrap().is_none());
}
