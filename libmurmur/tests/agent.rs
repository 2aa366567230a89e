//! Agent facade end to end against a fake X API

mod common;

use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{agent_config, token, ACCOUNT_ID};
use libmurmur::model::ScriptedModel;
use libmurmur::store::{CommunityStore, EngagementStore, TokenStore};
use libmurmur::{Agent, SessionState, Stores};

async fn agent(server: &MockServer, stores: Stores, model: ScriptedModel) -> Agent {
    Agent::from_parts(agent_config(&server.uri()), stores, Arc::new(model))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_pass_replies_and_records_then_collects_engagement() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/2/users/{}/timelines/reverse_chronological", ACCOUNT_ID)))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": "1", "text": "new rust release", "author_id": "7"},
                {"id": "2", "text": "lunch photo", "author_id": "8"},
                {"id": "3", "text": "my own rust post", "author_id": ACCOUNT_ID}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/tweets"))
        .and(body_json(json!({"text": "Congrats!", "reply": {"in_reply_to_tweet_id": "1"}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {"id": "900", "text": "Congrats!"}})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2/tweets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "900", "text": "Congrats!", "public_metrics": {"like_count": 4, "retweet_count": 2}}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2/tweets/900/quote_tweets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"meta": {"result_count": 0}})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/2/tweets/search/recent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "901", "text": "thanks", "author_id": "7"}]
        })))
        .mount(&server)
        .await;

    let stores = Stores::in_memory();
    stores
        .tokens
        .save(&token("access-1", Some("refresh-1"), 3600))
        .await
        .unwrap();
    let engagement = stores.engagement.clone();
    let model = ScriptedModel::new()
        .when(&["Should we reply", "rust"], "YES")
        .when(&["Should we reply"], "NO")
        .when(&["Your reply:"], "Congrats!");
    let agent = agent(&server, stores, model.clone()).await;
    assert_eq!(agent.session_state().await, Some(SessionState::Authenticated));

    let outcome = agent.run_pass(true).await.unwrap();
    assert_eq!(outcome.replied.len(), 1);
    assert_eq!(outcome.replied[0].reply_id.as_deref(), Some("900"));
    assert_eq!(outcome.ignored.len(), 2);
    // Gate for posts 1 and 2, generation for post 1; our own post costs nothing
    assert_eq!(model.prompts().len(), 3);

    let summary = agent.collect_engagement().await.unwrap();
    assert_eq!(summary.updated, 1);
    let snapshot = engagement.get("900").await.unwrap().unwrap();
    assert_eq!(snapshot.likes, 4);
    assert_eq!(snapshot.reposts, 2);
    assert!(snapshot.quotes.is_none());
    assert_eq!(snapshot.comments.unwrap().len(), 1);
}

#[tokio::test]
async fn test_agent_without_tokens_needs_authorization() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/2/users/{}/timelines/reverse_chronological", ACCOUNT_ID)))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let agent = agent(&server, Stores::in_memory(), ScriptedModel::new()).await;
    assert_eq!(agent.session_state().await, Some(SessionState::Unauthenticated));

    let err = agent.run_pass(false).await.unwrap_err();
    assert!(err.is_fatal());

    let request = agent.begin_authorization().await.unwrap();
    assert!(request
        .authorization_url
        .starts_with("https://x.com/i/oauth2/authorize?"));
    assert_eq!(agent.session_state().await, Some(SessionState::AwaitingCallback));
}

#[tokio::test]
async fn test_bootstrap_follows_configured_accounts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/2/users/by"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "165262228", "username": "rustlang", "name": "Rust Language"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("/2/users/{}/following", ACCOUNT_ID)))
        .and(body_json(json!({"target_user_id": "165262228"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"following": true}})))
        .expect(1)
        .mount(&server)
        .await;

    let stores = Stores::in_memory();
    stores
        .tokens
        .save(&token("access-1", Some("refresh-1"), 3600))
        .await
        .unwrap();
    let community = stores.community.clone();
    let mut config = agent_config(&server.uri());
    config.accounts_to_follow = vec!["@rustlang".to_string()];
    let agent = Agent::from_parts(config, stores, Arc::new(ScriptedModel::new()))
        .await
        .unwrap();

    let outcomes = agent.bootstrap_follows().await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].handle, "@rustlang");
    let member = community.get("165262228").await.unwrap().unwrap();
    assert_eq!(member.handle, "rustlang");
}
