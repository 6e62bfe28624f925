//! Integration tests for direct (byte range) streaming.

mod common;

use common::{payload, stream_request, TestHarness};
use reqwest::header;

#[tokio::test]
async fn health_check() {
    let (_h, addr) = TestHarness::with_server().await;
    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn first_hundred_bytes() {
    let h = TestHarness::new();
    let data = payload(1000);
    let path = h.write_media("movie.mp4", &data);
    let addr = h.spawn_server().await;

    let resp = stream_request(&reqwest::Client::new(), addr, "direct", &path)
        .header(header::RANGE, "bytes=0-99")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 206);
    assert_eq!(resp.headers()[header::CONTENT_RANGE], "bytes 0-99/1000");
    assert_eq!(resp.headers()[header::CONTENT_LENGTH], "100");
    assert_eq!(resp.headers()[header::ACCEPT_RANGES], "bytes");
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(&resp.bytes().await.unwrap()[..], &data[..100]);
}

#[tokio::test]
async fn open_ended_and_clamped_ranges() {
    let h = TestHarness::new();
    let data = payload(1000);
    let path = h.write_media("movie.mkv", &data);
    let addr = h.spawn_server().await;
    let client = reqwest::Client::new();

    let resp = stream_request(&client, addr, "direct", &path)
        .header(header::RANGE, "bytes=500-")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 206);
    assert_eq!(resp.headers()[header::CONTENT_RANGE], "bytes 500-999/1000");
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "video/x-matroska");
    assert_eq!(&resp.bytes().await.unwrap()[..], &data[500..]);

    let resp = stream_request(&client, addr, "direct", &path)
        .header(header::RANGE, "bytes=900-5000")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 206);
    assert_eq!(resp.headers()[header::CONTENT_RANGE], "bytes 900-999/1000");
    assert_eq!(&resp.bytes().await.unwrap()[..], &data[900..]);
}

#[tokio::test]
async fn windows_larger_than_a_chunk() {
    let h = TestHarness::new();
    let data = payload(300 * 1024);
    let path = h.write_media("big.webm", &data);
    let addr = h.spawn_server().await;

    let resp = stream_request(&reqwest::Client::new(), addr, "direct", &path)
        .header(header::RANGE, "bytes=1000-250000")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 206);
    assert_eq!(resp.headers()[header::CONTENT_LENGTH], "249001");
    assert_eq!(&resp.bytes().await.unwrap()[..], &data[1000..=250000]);
}

#[tokio::test]
async fn single_byte_file() {
    let h = TestHarness::new();
    let path = h.write_media("one.bin", b"x");
    let addr = h.spawn_server().await;

    let resp = stream_request(&reqwest::Client::new(), addr, "direct", &path)
        .header(header::RANGE, "bytes=0-")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 206);
    assert_eq!(resp.headers()[header::CONTENT_RANGE], "bytes 0-0/1");
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/octet-stream");
    assert_eq!(&resp.bytes().await.unwrap()[..], b"x");
}

#[tokio::test]
async fn concurrent_disjoint_ranges() {
    let h = TestHarness::new();
    let data = payload(200_000);
    let path = h.write_media("shared.mp4", &data);
    let addr = h.spawn_server().await;
    let client = reqwest::Client::new();

    let first = stream_request(&client, addr, "direct", &path)
        .header(header::RANGE, "bytes=0-99999")
        .send();
    let second = stream_request(&client, addr, "direct", &path)
        .header(header::RANGE, "bytes=100000-199999")
        .send();
    let (first, second) = tokio::join!(first, second);
    let (first, second) = (first.unwrap(), second.unwrap());

    assert_eq!(first.status(), 206);
    assert_eq!(second.status(), 206);
    let (a, b) = tokio::join!(first.bytes(), second.bytes());
    assert_eq!(&a.unwrap()[..], &data[..100_000]);
    assert_eq!(&b.unwrap()[..], &data[100_000..]);
}

async fn error_code(resp: reqwest::Response) -> String {
    let json: serde_json::Value = resp.json().await.unwrap();
    json["code"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn missing_range_is_400() {
    let h = TestHarness::new();
    let path = h.write_media("movie.mp4", &payload(1000));
    let addr = h.spawn_server().await;

    let resp = stream_request(&reqwest::Client::new(), addr, "direct", &path)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(error_code(resp).await, "missing_range");
}

#[tokio::test]
async fn bad_ranges_are_400() {
    let h = TestHarness::new();
    let path = h.write_media("movie.mp4", &payload(1000));
    let addr = h.spawn_server().await;
    let client = reqwest::Client::new();

    for (range, code) in [
        ("items=0-99", "malformed_range"),
        ("bytes=0-10,20-30", "malformed_range"),
        ("bytes=abc-def", "invalid_range"),
        ("bytes=600-500", "invalid_range"),
        ("bytes=1000-", "invalid_range"),
        ("bytes=-200", "invalid_range"),
    ] {
        let resp = stream_request(&client, addr, "direct", &path)
            .header(header::RANGE, range)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "{range}");
        assert_eq!(error_code(resp).await, code, "{range}");
    }
}

#[tokio::test]
async fn empty_file_has_no_satisfiable_range() {
    let h = TestHarness::new();
    let path = h.write_media("empty.mp4", b"");
    let addr = h.spawn_server().await;

    let resp = stream_request(&reqwest::Client::new(), addr, "direct", &path)
        .header(header::RANGE, "bytes=0-")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_eq!(error_code(resp).await, "invalid_range");
}

#[tokio::test]
async fn missing_file_is_404() {
    let h = TestHarness::new();
    let addr = h.spawn_server().await;

    // No Range header either: the path is checked first.
    let resp = stream_request(
        &reqwest::Client::new(),
        addr,
        "direct",
        &h.media.path().join("nope.mkv"),
    )
    .send()
    .await
    .unwrap();
    assert_eq!(resp.status(), 404);
    assert_eq!(error_code(resp).await, "not_found");
}

#[tokio::test]
async fn path_outside_roots_is_404() {
    let h = TestHarness::new();
    let outside = tempfile::tempdir().unwrap();
    let secret = outside.path().join("secret.mp4");
    std::fs::write(&secret, payload(100)).unwrap();
    let addr = h.spawn_server().await;
    let client = reqwest::Client::new();

    let resp = stream_request(&client, addr, "direct", &secret)
        .header(header::RANGE, "bytes=0-")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let sneaky = h.media.path().join("..").join(
        outside
            .path()
            .strip_prefix(h.media.path().parent().unwrap())
            .unwrap_or(outside.path()),
    );
    let resp = stream_request(&client, addr, "direct", &sneaky.join("secret.mp4"))
        .header(header::RANGE, "bytes=0-")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn missing_path_parameter_is_400() {
    let (_h, addr) = TestHarness::with_server().await;
    let resp = reqwest::get(format!("http://{addr}/api/stream/direct"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
