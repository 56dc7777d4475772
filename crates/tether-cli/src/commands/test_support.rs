//! Mock daemon wiring shared by command handler tests.

use httpmock::Mock;
use httpmock::prelude::*;
use serde_json::{Value, json};
use tether_config::{ClientConfig, ServerProfile};
use tether_rpc::DEFAULT_RPC_PATH;

use crate::cli::{OutputFormat, SessionOptions};
use crate::client::AppContext;

pub(crate) async fn context(server: &MockServer) -> AppContext {
    let mut profile = ServerProfile::new("mock", server.host());
    profile.port = server.port();
    let config = ClientConfig {
        servers: vec![profile],
        active_server: Some("mock".into()),
        ..ClientConfig::default()
    };
    let options = SessionOptions {
        output: OutputFormat::Json,
        ..SessionOptions::default()
    };
    match AppContext::connect(&config, &options).await {
        Ok(ctx) => ctx,
        Err(err) => panic!("mock context: {}", err.display_message()),
    }
}

fn success(arguments: Value) -> Value {
    json!({"result": "success", "arguments": arguments})
}

/// Answer one RPC method whose request body contains every `needles` entry.
pub(crate) fn mock_method<'a>(
    server: &'a MockServer,
    method: &str,
    needles: &[&str],
    body: Value,
) -> Mock<'a> {
    let method = format!("\"method\":\"{method}\"");
    let needles: Vec<String> = needles.iter().map(|needle| (*needle).to_string()).collect();
    server.mock(move |when, then| {
        needles.into_iter().fold(
            when.method(POST)
                .path(DEFAULT_RPC_PATH)
                .body_includes(method),
            |when, needle| when.body_includes(needle),
        );
        then.status(200)
            .header("content-type", "application/json")
            .json_body(body);
    })
}

/// Torrent list and session stats for one poll.
pub(crate) fn mock_poll(server: &MockServer, torrents: Value) -> Mock<'_> {
    mock_method(
        server,
        "session-stats",
        &[],
        success(json!({
            "activeTorrentCount": 1,
            "pausedTorrentCount": 0,
            "torrentCount": 1,
            "downloadSpeed": 2048,
            "uploadSpeed": 0
        })),
    );
    mock_method(
        server,
        "torrent-get",
        &["\"isStalled\""],
        success(json!({ "torrents": torrents })),
    )
}

pub(crate) fn mock_success<'a>(server: &'a MockServer, method: &str, needles: &[&str]) -> Mock<'a> {
    mock_method(server, method, needles, success(json!({})))
}

pub(crate) fn mock_rejected<'a>(server: &'a MockServer, method: &str) -> Mock<'a> {
    mock_method(
        server,
        method,
        &[],
        json!({"result": "invalid argument", "arguments": {}}),
    )
}

pub(crate) fn mock_files(server: &MockServer, torrent_id: i64, count: usize) -> Mock<'_> {
    let files: Vec<Value> = (0..count)
        .map(|index| {
            json!({
                "name": format!("show/e{index:02}.mkv"),
                "length": 100,
                "bytesCompleted": 0
            })
        })
        .collect();
    let stats: Vec<Value> = (0..count)
        .map(|_| json!({"bytesCompleted": 0, "wanted": true, "priority": 0}))
        .collect();
    mock_method(
        server,
        "torrent-get",
        &["\"fileStats\""],
        success(json!({"torrents": [{"id": torrent_id, "files": files, "fileStats": stats}]})),
    )
}

pub(crate) fn sample_torrents() -> Value {
    json!([
        {"id": 1, "name": "alpha", "status": 4, "percentDone": 0.5, "rateDownload": 2048},
        {"id": 2, "name": "beta", "status": 0, "percentDone": 1.0, "labels": ["linux"]}
    ])
}
