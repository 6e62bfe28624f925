//! Integration tests for the session registry and diagnostics routes.

mod common;

use std::time::Duration;

use common::{eventually, payload, stream_request, TestHarness};
use reqwest::header;

#[tokio::test]
async fn no_sessions_initially() {
    let (_h, addr) = TestHarness::with_server().await;
    let json: serde_json::Value = reqwest::get(format!("http://{addr}/api/sessions"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["active"], 0);
    assert_eq!(json["transcode_slots_free"], 2);
    assert!(json["sessions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn slow_reader_keeps_direct_session_open() {
    let h = TestHarness::new();
    // Large enough that the socket buffers fill and the body stalls.
    let data = payload(32 * 1024 * 1024);
    let path = h.write_media("large.mkv", &data);
    let addr = h.spawn_server().await;
    let client = reqwest::Client::new();

    let resp = stream_request(&client, addr, "direct", &path)
        .header(header::RANGE, "bytes=0-")
        .header(header::USER_AGENT, "mpv/0.37")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 206);

    let json: serde_json::Value = client
        .get(format!("http://{addr}/api/sessions"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["active"], 1);
    let session = &json["sessions"][0];
    assert_eq!(session["mode"], "direct");
    assert_eq!(session["client_ip"], "127.0.0.1");
    assert_eq!(session["user_agent"], "mpv/0.37");
    assert_eq!(session["range"]["start"], 0);
    assert_eq!(session["range"]["end"], data.len() as u64 - 1);
    assert!(session["pid"].is_null());

    // Backpressure: the server has not pushed the whole file.
    assert!(session["bytes_sent"].as_u64().unwrap() < data.len() as u64);

    drop(resp);

    let sessions = h.ctx.sessions.clone();
    assert!(
        eventually(Duration::from_secs(10), || {
            let sessions = sessions.clone();
            async move { sessions.is_empty() }
        })
        .await,
        "session outlived its client"
    );
}

#[tokio::test]
async fn recent_events_record_outcomes() {
    let h = TestHarness::new();
    let path = h.write_media("clip.mp4", &payload(500));
    let addr = h.spawn_server().await;
    let client = reqwest::Client::new();

    let resp = stream_request(&client, addr, "direct", &path)
        .header(header::RANGE, "bytes=0-499")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.bytes().await.unwrap().len(), 500);

    let resp = stream_request(&client, addr, "direct", &h.media.path().join("missing.mp4"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let events = h.ctx.events.clone();
    assert!(
        eventually(Duration::from_secs(5), || {
            let events = events.clone();
            async move { events.len() >= 3 }
        })
        .await
    );

    let json: serde_json::Value = client
        .get(format!("http://{addr}/api/sessions/recent?limit=10"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let types: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["type"].as_str())
        .collect();

    // Newest first.
    assert_eq!(types, vec!["rejected", "session_completed", "session_started"]);
    assert_eq!(json[0]["status"], 404);
    assert_eq!(json[1]["bytes_sent"], 500);
    assert_eq!(json[2]["mode"], "direct");
}

#[tokio::test]
async fn recent_events_respect_limit() {
    let h = TestHarness::new();
    let addr = h.spawn_server().await;
    let client = reqwest::Client::new();

    for i in 0..5 {
        let missing = h.media.path().join(format!("missing-{i}.mp4"));
        let resp = stream_request(&client, addr, "direct", &missing)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }

    let json: serde_json::Value = client
        .get(format!("http://{addr}/api/sessions/recent?limit=2"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json.as_array().unwrap().len(), 2);
}
