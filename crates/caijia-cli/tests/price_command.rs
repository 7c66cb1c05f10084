#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

mod common;

use common::{BULLETIN_HTML, INDEX_HTML, caijia_cmd, caijia_cmd_for, serve_bulletin};
use predicates::prelude::*;
use serde_json::{Value, json};
use wiremock::MockServer;

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

#[tokio::test]
async fn price_prints_success_json() -> anyhow::Result<()> {
    let server = serve_bulletin(INDEX_HTML, BULLETIN_HTML).await;

    let output = caijia_cmd_for(&server).args(["price", "西红柿"]).output()?;
    assert!(output.status.success());

    let value = stdout_json(&output);
    assert_eq!(value["success"], json!(true));
    assert_eq!(value["foodItem"], json!("西红柿"));
    assert_eq!(value["priceDate"], json!("2025-05-16"));
    assert_eq!(value["priceSource"], json!("5月16日主要农副产品价格"));

    let prices = value["prices"].as_array().unwrap();
    let names: Vec<&str> = prices.iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["西红柿", "番茄"]);
    assert_eq!(prices[0]["medianPrice"], json!(2.0));
    assert!(prices[0]["data"].get("序号").is_none());
    Ok(())
}

#[tokio::test]
async fn price_text_format() -> anyhow::Result<()> {
    let server = serve_bulletin(INDEX_HTML, BULLETIN_HTML).await;

    caijia_cmd_for(&server)
        .args(["price", "青菜", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("5月16日主要农副产品价格 (2025-05-16)"))
        .stdout(predicate::str::contains("Reference price: 2 (青菜)"))
        .stdout(predicate::str::contains("1. 青菜"));
    Ok(())
}

#[tokio::test]
async fn price_without_match_still_succeeds() -> anyhow::Result<()> {
    let server = serve_bulletin(INDEX_HTML, BULLETIN_HTML).await;

    let output = caijia_cmd_for(&server).args(["price", "榴莲"]).output()?;
    assert!(output.status.success());
    let value = stdout_json(&output);
    assert_eq!(value["success"], json!(true));
    assert_eq!(value["prices"], json!([]));
    Ok(())
}

#[tokio::test]
async fn price_without_bulletin_exits_nonzero() -> anyhow::Result<()> {
    let server = serve_bulletin("<html><body>暂无</body></html>", BULLETIN_HTML).await;

    let output = caijia_cmd_for(&server).args(["price", "番茄"]).output()?;
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        stdout_json(&output),
        json!({"success": false, "error": "未找到价格信息链接"})
    );
    Ok(())
}

#[tokio::test]
async fn price_with_failing_index_exits_nonzero() -> anyhow::Result<()> {
    let server = MockServer::start().await;

    caijia_cmd_for(&server)
        .args(["price", "番茄", "--format", "text"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("获取食材价格信息失败"));
    Ok(())
}

#[test]
fn blank_price_query_fails_fast() {
    // unroutable index: the query must be rejected before any request
    let output = caijia_cmd()
        .env("CAIJIA_INDEX_URL", "http://127.0.0.1:9/fgw/jbsj/index.html")
        .args(["price", "  "])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        stdout_json(&output),
        json!({"success": false, "error": "需要食材名称"})
    );
}

#[test]
fn missing_config_file_is_an_error() {
    caijia_cmd()
        .env("CAIJIA_CONFIG", "/nonexistent/caijia/config.toml")
        .args(["price", "番茄"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}
