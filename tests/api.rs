mod common;

use common::{create_test_config, spawn_server};
use reqwest::StatusCode;
use serde_json::Value;

#[test_log::test(tokio::test)]
async fn test_site_data_endpoints() {
    let addr = spawn_server(&create_test_config("http://127.0.0.1:9/broadcast"));
    let base = format!("http://{}", addr);

    let health: Value = reqwest::get(format!("{}/health", base)).await.unwrap().json().await.unwrap();
    assert_eq!(health["status"], "ok");

    let token: Value = reqwest::get(format!("{}/api/token", base)).await.unwrap().json().await.unwrap();
    let price = token["price"].as_f64().unwrap();
    assert!((180.0..=188.0).contains(&price));
    assert!(token["marketCap"].as_f64().unwrap() > 0.0);

    let transactions: Value = reqwest::get(format!("{}/api/transactions", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let transactions = transactions.as_array().unwrap();
    assert!(!transactions.is_empty() && transactions.len() <= 5);
    assert!(transactions[0]["type"] == "buy" || transactions[0]["type"] == "sell");

    let quote: Value = reqwest::get(format!("{}/api/quote?from=TVLP&to=USDT&amount=2.5", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(quote["amountOut"], 460.0);

    let missing = reqwest::get(format!("{}/api/i18n/xx", base)).await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let unknown = reqwest::get(format!("{}/nope", base)).await.unwrap();
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);
}
