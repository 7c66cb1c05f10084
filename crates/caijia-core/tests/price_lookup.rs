#![allow(
    clippy::unwrap_used,
    clippy::panic,
    clippy::disallowed_macros,
    clippy::indexing_slicing,
    clippy::float_cmp
)]

use caijia_core::{Config, PricePipeline};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html><head><meta charset="utf-8"><title>价格监测</title></head>
<body>
<div class="list">
  <a href="/fgw/jbsj/20250509/88001.html" title="5月9日">奉贤区5月9日主要农副产品价格</a>
  <a href="/fgw/jbsj/20250516/89097.html">奉贤区5月16日主要农副产品价格</a>
  <a href="/fgw/jbsj/20250516/89098.html">区发改委工作会议</a>
  <a href="/fgw/tzgg/20250520/90001.html">关于市场秩序的通知</a>
</div>
</body></html>"#;

const BULLETIN_HTML: &str = r#"<!DOCTYPE html>
<html><body>
<h1>奉贤区5月16日主要农副产品价格</h1>
<table border="1">
  <tbody>
    <tr><td>序号</td><td>品名</td><td>单位</td><td>最高价</td><td>最低价</td><td>平均价</td></tr>
    <tr><td>1</td><td>&nbsp;青菜&nbsp;</td><td>元/斤</td><td>3.00</td><td>2.00</td><td>2.50</td></tr>
    <tr><td>2</td><td>西红柿</td><td>元/斤</td><td>6.00</td><td>4.00</td><td>5.00</td></tr>
    <tr><td>3</td><td>番茄</td><td>元/斤</td><td>5.50</td><td>3.50</td><td>4.50</td></tr>
    <tr><td>4</td><td>土豆</td><td>元/斤</td><td>2.00</td><td>1.50</td><td>1.80</td></tr>
  </tbody>
</table>
<table>
  <tr><td>序号</td><td>商品</td><td>规格</td><td>零售价</td></tr>
  <tr><td>1</td><td>猪肉(前腿)</td><td>500g</td><td>14.5</td></tr>
</table>
</body></html>"#;

async fn mock_source() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fgw/jbsj/index.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(INDEX_HTML))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fgw/jbsj/20250516/89097.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string(BULLETIN_HTML))
        .mount(&server)
        .await;
    server
}

fn pipeline_for(server: &MockServer) -> PricePipeline {
    let mut config = Config::default();
    config.source.index_url = format!("{}/fgw/jbsj/index.html", server.uri());
    PricePipeline::from_config(&config).unwrap()
}

#[tokio::test]
async fn lookup_serializes_to_success_shape() {
    let server = mock_source().await;
    let result = pipeline_for(&server).get_food_item_price("西红柿").await;
    let value = serde_json::to_value(&result).unwrap();

    assert_eq!(value["success"], json!(true));
    assert_eq!(value["foodItem"], json!("西红柿"));
    assert_eq!(value["priceDate"], json!("2025-05-16"));
    assert_eq!(value["priceSource"], json!("奉贤区5月16日主要农副产品价格"));
    assert_eq!(
        value["priceUrl"],
        json!(format!("{}/fgw/jbsj/20250516/89097.html", server.uri()))
    );
    assert!(value.get("error").is_none());

    let prices = value["prices"].as_array().unwrap();
    assert_eq!(prices.len(), 2);
    assert_eq!(prices[0]["name"], json!("西红柿"));
    assert_eq!(
        prices[0]["data"],
        json!({"单位": "元/斤", "最高价": "6.00", "最低价": "4.00", "平均价": "5.00"})
    );
    // numeric cells in column order are [6, 4, 5]; the middle index holds 4
    assert_eq!(prices[0]["medianPrice"], json!(4.0));
    assert_eq!(prices[1]["name"], json!("番茄"));
    assert!(prices[1].get("medianPrice").is_none());
}

#[tokio::test]
async fn nbsp_cells_still_match() {
    let server = mock_source().await;
    let result = pipeline_for(&server).get_food_item_price("青菜").await;
    let report = result.payload().unwrap();
    assert_eq!(report.prices.len(), 1);
    assert_eq!(report.prices[0].name, "青菜");
}

#[tokio::test]
async fn second_table_with_other_name_header() {
    let server = mock_source().await;
    let result = pipeline_for(&server).get_food_item_price("猪肉").await;
    let report = result.payload().unwrap();
    assert_eq!(report.prices.len(), 1);
    assert_eq!(report.prices[0].data["零售价"], "14.5");
    assert_eq!(report.prices[0].median_price, Some(14.5));
}

#[tokio::test]
async fn concurrent_lookups_share_one_pipeline() {
    let server = mock_source().await;
    let pipeline = pipeline_for(&server);

    let (tomato, potato, durian) = tokio::join!(
        pipeline.get_food_item_price("西红柿"),
        pipeline.get_food_item_price("土豆"),
        pipeline.get_food_item_price("榴莲"),
    );

    assert_eq!(tomato.payload().unwrap().prices.len(), 2);
    assert_eq!(potato.payload().unwrap().prices[0].name, "土豆");
    assert!(durian.payload().unwrap().prices.is_empty());
}

#[tokio::test]
async fn failures_serialize_to_error_shape() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fgw/jbsj/index.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>暂无</body></html>"))
        .mount(&server)
        .await;

    let pipeline = pipeline_for(&server);
    let missing = serde_json::to_value(pipeline.get_food_item_price("番茄").await).unwrap();
    assert_eq!(missing, json!({"success": false, "error": "未找到价格信息链接"}));

    let empty = serde_json::to_value(pipeline.get_food_item_price("").await).unwrap();
    assert_eq!(empty, json!({"success": false, "error": "需要食材名称"}));
}

#[tokio::test]
async fn unreachable_index_is_lookup_failure() {
    let server = MockServer::start().await;
    let pipeline = pipeline_for(&server);
    drop(server);

    let value: Value = serde_json::to_value(pipeline.get_food_item_price("番茄").await).unwrap();
    assert_eq!(value, json!({"success": false, "error": "获取食材价格信息失败"}));
}

#[tokio::test]
async fn bulletin_snapshot_shape() {
    let server = mock_source().await;
    let result = pipeline_for(&server).latest_bulletin().await;
    let value = serde_json::to_value(&result).unwrap();

    assert_eq!(value["success"], json!(true));
    assert_eq!(value["date"], json!("2025-05-16"));
    assert_eq!(value["tables"].as_array().unwrap().len(), 2);
    // snapshot tables keep the serial column
    assert_eq!(value["tables"][0][0][0], json!("序号"));
    let links = value["allLinks"].as_array().unwrap();
    assert_eq!(links.len(), 2);
    assert_eq!(links[0]["title"], json!("奉贤区5月16日主要农副产品价格"));
    assert_eq!(links[1]["date"], json!("2025-05-09"));
}
