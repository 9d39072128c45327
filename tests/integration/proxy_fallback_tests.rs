use super::*;
use hotdeal_watcher::plugins::sites::AlgumonParser;
use tempfile::TempDir;
use wiremock::matchers::any;
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn blocking_site() -> MockServer {
    let site = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(403).set_body_string("Access denied"))
        .mount(&site)
        .await;
    site
}

#[tokio::test]
async fn test_blocked_site_is_read_through_proxy() -> anyhow::Result<()> {
    let site = blocking_site().await;

    let dead_proxy = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&dead_proxy)
        .await;

    let proxy = MockServer::start().await;
    Mock::given(any())
        .respond_with(
            ResponseTemplate::new(200).set_body_string(algumon_page(&[("900", "SSD via proxy", "10원")])),
        )
        .expect(1)
        .mount(&proxy)
        .await;

    let dir = TempDir::new()?;
    let stack = build_stack(
        dir.path(),
        vec![Arc::new(AlgumonParser::with_base_url(&site.uri())?)],
        vec![dead_proxy.uri(), proxy.uri()],
        &["ssd"],
    )
    .await?;

    let summary = stack.scheduler.tick().await;

    assert_eq!(summary.notified, 1);
    assert!(stack.sink.messages()[0].html_body.contains("SSD via proxy"));
    Ok(())
}

#[tokio::test]
async fn test_blocked_everywhere_is_a_skipped_pair() -> anyhow::Result<()> {
    let site = blocking_site().await;
    let proxy = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(403))
        .mount(&proxy)
        .await;

    let dir = TempDir::new()?;
    let stack = build_stack(
        dir.path(),
        vec![Arc::new(AlgumonParser::with_base_url(&site.uri())?)],
        vec![proxy.uri()],
        &["ssd"],
    )
    .await?;

    let summary = stack.scheduler.tick().await;

    assert_eq!(summary.failed, 1);
    assert!(stack.sink.messages().is_empty());
    assert!(!stack.state_dir.join("ssd").exists());
    Ok(())
}
