//! `HttpScorer` against a wiremock server.

use veille_core::SentimentLabel;
use veille_sentiment::{HttpScorer, SentimentError, SentimentScorer};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn posts_inputs_and_maps_best_label() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/classify"))
        .and(body_json(serde_json::json!({ "inputs": "Attaque à Tillabéri" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([[
            { "label": "positive", "score": 0.05 },
            { "label": "neutral", "score": 0.15 },
            { "label": "negative", "score": 0.80 }
        ]])))
        .expect(1)
        .mount(&server)
        .await;

    let scorer = HttpScorer::new(&format!("{}/classify", server.uri()), 5).unwrap();
    let sentiment = scorer.score("Attaque à Tillabéri").await.unwrap();

    assert_eq!(sentiment.label, SentimentLabel::Negative);
    assert!((sentiment.confidence - 0.80).abs() < 1e-6);
}

#[tokio::test]
async fn long_input_is_truncated() {
    let server = MockServer::start().await;
    let long = "é".repeat(600);
    let expected: String = "é".repeat(512);
    Mock::given(method("POST"))
        .and(body_json(serde_json::json!({ "inputs": expected })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([{ "label": "neutral", "score": 0.7 }])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let scorer = HttpScorer::new(&server.uri(), 5).unwrap();
    let sentiment = scorer.score(&long).await.unwrap();
    assert_eq!(sentiment.label, SentimentLabel::Neutral);
}

#[tokio::test]
async fn non_success_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("loading"))
        .mount(&server)
        .await;

    let scorer = HttpScorer::new(&server.uri(), 5).unwrap();
    let err = scorer.score("texte").await.unwrap_err();
    assert!(matches!(
        err,
        SentimentError::UnexpectedStatus { status: 503, ref body } if body == "loading"
    ));
}

#[tokio::test]
async fn empty_label_list_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let scorer = HttpScorer::new(&server.uri(), 5).unwrap();
    let err = scorer.score("texte").await.unwrap_err();
    assert!(matches!(err, SentimentError::EmptyResponse));
}
