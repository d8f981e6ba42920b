use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use docrank::config::RankConfig;
use docrank::criteria::default_criteria;
use docrank::gateway::openai::OpenAiAdapter;
use docrank::gateway::{GatewayConfig, ProviderGateway};
use docrank::rank::{rank, summarize, Winner};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const KEY: &str = "sk-test-0123456789abcdefghij";

#[derive(Clone, Copy)]
struct DeterministicJudge;

fn extract_between<'a>(s: &'a str, start: &str, end: &str) -> Option<&'a str> {
    let start_idx = s.find(start)? + start.len();
    let rest = &s[start_idx..];
    let end_idx = rest.find(end)?;
    Some(&rest[..end_idx])
}

fn score_for_text(text: &str) -> i32 {
    if text.contains("BEST") {
        5
    } else if text.contains("MID") {
        3
    } else if text.contains("WORST") {
        1
    } else {
        0
    }
}

impl Respond for DeterministicJudge {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let parsed: serde_json::Value = serde_json::from_slice(&request.body).unwrap_or_default();
        let messages = parsed
            .get("messages")
            .and_then(|m| m.as_array())
            .cloned()
            .unwrap_or_default();

        let user_content = messages
            .iter()
            .find(|m| m.get("role").and_then(|r| r.as_str()) == Some("user"))
            .and_then(|m| m.get("content").and_then(|c| c.as_str()))
            .unwrap_or("");

        let a_text = extract_between(user_content, "<document_A", "</document_A>").unwrap_or("");
        let b_text = extract_between(user_content, "<document_B", "</document_B>").unwrap_or("");

        let a_score = score_for_text(a_text);
        let b_score = score_for_text(b_text);
        let winner = match a_score.cmp(&b_score) {
            std::cmp::Ordering::Greater => "A",
            std::cmp::Ordering::Less => "B",
            std::cmp::Ordering::Equal => "Tie",
        };

        let content = format!(
            "```json\n{{\"document_a_score\": {a_score}, \"document_b_score\": {b_score}, \"winner\": \"{winner}\", \"reasoning\": \"deterministic\"}}\n```"
        );

        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "message": { "content": content },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 10 }
        }))
    }
}

fn gateway(server: &MockServer) -> ProviderGateway {
    let adapter = OpenAiAdapter::with_config(KEY, server.uri(), Duration::from_secs(5)).unwrap();
    ProviderGateway::with_provider(
        adapter,
        KEY,
        "gpt-4.1-mini",
        GatewayConfig {
            max_retries: 0,
            retry_base_delay: Duration::from_millis(0),
        },
    )
}

#[tokio::test]
async fn rank_runs_end_to_end_against_wiremock_gateway() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(DeterministicJudge)
        .mount(&server)
        .await;

    let ids: Vec<String> = ["worst", "best", "mid"].iter().map(|s| s.to_string()).collect();
    let documents: HashMap<String, String> = [
        ("worst", "WORST proposal text"),
        ("best", "BEST proposal text"),
        ("mid", "MID proposal text"),
    ]
    .into_iter()
    .map(|(id, text)| (id.to_string(), text.to_string()))
    .collect();
    let criteria = default_criteria();

    let outcome = rank(
        &ids,
        &documents,
        &criteria,
        Arc::new(gateway(&server)),
        &RankConfig::default(),
    )
    .await;

    assert_eq!(outcome.ranked, vec!["best", "mid", "worst"]);
    assert_eq!(outcome.stats.error_judgments, 0);

    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), outcome.stats.judgments);
    assert_eq!(received.len(), outcome.log.len() * criteria.len());

    let summary = summarize(&outcome.ranked, &outcome.log);
    assert_eq!(summary.documents[0].id, "best");
    assert_eq!(summary.documents[0].criterion_averages["Clarity"], 5.0);
    assert_eq!(summary.win_counts["worst"], 0);
}

#[tokio::test]
async fn server_errors_degrade_to_ties_without_aborting() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": { "message": "overloaded" }
        })))
        .mount(&server)
        .await;

    let ids: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    let documents: HashMap<String, String> = ids
        .iter()
        .map(|id| (id.clone(), format!("text {id}")))
        .collect();

    let outcome = rank(
        &ids,
        &documents,
        &default_criteria(),
        Arc::new(gateway(&server)),
        &RankConfig::default().max_concurrency(3),
    )
    .await;

    assert_eq!(outcome.ranked, ids);
    assert_eq!(outcome.stats.error_judgments, outcome.stats.judgments);
    for result in &outcome.log {
        assert_eq!(result.winner, Winner::NotApplicable);
        assert!(result.is_error());
        assert_eq!(result.verdicts.len(), default_criteria().len());
        assert!(result
            .verdicts
            .iter()
            .all(|v| v.winner == Winner::NotApplicable && v.error.is_some()));
    }
}
