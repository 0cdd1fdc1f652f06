use code_anchor::graph::{GraphQueryer, HttpGraphClient};
use code_anchor::llm::{JsonCompleter, OpenAiJudge};
use std::collections::HashMap;

#[test]
fn graph_client_parses_path_rows() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/db/neo4j/tx/commit")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"results":[{"columns":["path"],"data":[{"row":["src/api.rs"]},{"row":["src/old_api.rs"]}]}],"errors":[]}"#,
        )
        .create();

    let client = HttpGraphClient::new(format!("{}/db/neo4j/tx/commit", server.url()));
    let rows = client
        .execute_query("MATCH (f:File) WHERE f.path IN $paths RETURN f.path AS path", &HashMap::new())
        .unwrap();

    mock.assert();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].path(), Some("src/api.rs"));
    assert_eq!(rows[1].path(), Some("src/old_api.rs"));
}

#[test]
fn graph_client_surfaces_store_errors() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/tx")
        .with_status(200)
        .with_body(r#"{"results":[],"errors":[{"code":"Neo.ClientError","message":"bad cypher"}]}"#)
        .create();

    let client = HttpGraphClient::new(format!("{}/tx", server.url()));
    let err = client.execute_query("NOT CYPHER", &HashMap::new()).unwrap_err();

    assert!(err.to_string().contains("bad cypher"));
}

#[test]
fn judge_returns_message_content() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"choices":[{"message":{"content":"{\"matched_index\":0,\"confidence\":0.85,\"reasoning\":\"ok\"}"}}]}"#,
        )
        .create();

    let judge = OpenAiJudge::new(
        format!("{}/v1/chat/completions", server.url()),
        "test-key",
        "test-model",
    );

    assert!(judge.is_enabled());
    let content = judge.complete_json("system", "user").unwrap();
    let verdict: serde_json::Value = serde_json::from_str(&content).unwrap();
    assert_eq!(verdict["matched_index"], 0);
}
