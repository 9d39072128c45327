use super::*;
use hotdeal_watcher::plugins::sites::{AlgumonParser, FmKoreaParser};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn serve(server: &MockServer, route: &str, body: String) {
    server.reset().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn algumon(server: &MockServer) -> Arc<dyn SiteParser> {
    Arc::new(AlgumonParser::with_base_url(&server.uri()).unwrap())
}

#[tokio::test]
async fn test_initial_then_updates_then_quiet() -> anyhow::Result<()> {
    let site = MockServer::start().await;
    let dir = TempDir::new()?;
    let stack = build_stack(dir.path(), vec![algumon(&site)], vec![], &["ssd"]).await?;

    serve(&site, "/search/ssd", algumon_page(&[
        ("101", "SSD 1TB", "89,000원"),
        ("100", "SSD 512GB", "49,000원"),
    ]))
    .await;
    let first = stack.scheduler.tick().await;
    assert_eq!((first.pairs, first.notified), (1, 1));

    serve(&site, "/search/ssd", algumon_page(&[
        ("103", "SSD 4TB", "299,000원"),
        ("102", "SSD 2TB", "149,000원"),
        ("101", "SSD 1TB", "89,000원"),
        ("100", "SSD 512GB", "49,000원"),
    ]))
    .await;
    let second = stack.scheduler.tick().await;
    assert_eq!(second.notified, 1);

    let third = stack.scheduler.tick().await;
    assert_eq!((third.notified, third.unchanged), (0, 1));

    assert_eq!(
        stack.sink.subjects(),
        vec!["[ssd] Deal alert registered", "[ssd] 2 new deal(s) on algumon"]
    );
    let updates = &stack.sink.messages()[1].html_body;
    let newest = updates.find("SSD 4TB").unwrap();
    let older = updates.find("SSD 2TB").unwrap();
    assert!(newest < older);
    assert!(!updates.contains("SSD 1TB"));

    let record: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(
        stack.state_dir.join("ssd").join("algumon.json"),
    )?)?;
    assert_eq!(record["current_id"], "103");
    assert_eq!(record["current_price"], "299,000원");
    assert_eq!(record["current_meta_data"], "쿠팡|무료배송");
    Ok(())
}

#[tokio::test]
async fn test_state_survives_restart() -> anyhow::Result<()> {
    let site = MockServer::start().await;
    let dir = TempDir::new()?;
    serve(&site, "/search/%ED%82%A4%EB%B3%B4%EB%93%9C", algumon_page(&[("7", "기계식 키보드", "59,000원")])).await;

    let before = build_stack(dir.path(), vec![algumon(&site)], vec![], &["키보드"]).await?;
    assert_eq!(before.scheduler.tick().await.notified, 1);
    drop(before);

    let after = build_stack(dir.path(), vec![algumon(&site)], vec![], &[]).await?;
    let summary = after.scheduler.tick().await;

    assert_eq!(summary.unchanged, 1);
    assert!(after.sink.messages().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failing_site_does_not_block_other_sites() -> anyhow::Result<()> {
    let broken = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&broken)
        .await;

    let board = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/index.php"))
        .and(query_param("mid", "hotdeal"))
        .respond_with(ResponseTemplate::new(200).set_body_string(fmkorea_page(&[
            ("7700000002", "갤럭시 버즈 특가", "99,000원"),
            ("7700000001", "SSD 2TB 역대가", "139,000원"),
        ])))
        .mount(&board)
        .await;

    let dir = TempDir::new()?;
    let stack = build_stack(
        dir.path(),
        vec![
            algumon(&broken),
            Arc::new(FmKoreaParser::with_base_url(&board.uri())?),
        ],
        vec![],
        &["ssd"],
    )
    .await?;

    let summary = stack.scheduler.tick().await;

    assert_eq!(summary.pairs, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.notified, 1);
    assert!(!stack.state_dir.join("ssd").join("algumon.json").exists());

    let message = &stack.sink.messages()[0];
    assert_eq!(message.subject, "[ssd] Deal alert registered");
    assert!(message.html_body.contains("SSD 2TB 역대가 (139,000원)"));
    Ok(())
}

#[tokio::test]
async fn test_corrupt_state_is_recovered_as_first_observation() -> anyhow::Result<()> {
    let site = MockServer::start().await;
    serve(&site, "/search/ssd", algumon_page(&[("55", "SSD", "1원")])).await;

    let dir = TempDir::new()?;
    let stack = build_stack(dir.path(), vec![algumon(&site)], vec![], &["ssd"]).await?;
    let record = stack.state_dir.join("ssd").join("algumon.json");
    std::fs::create_dir_all(record.parent().unwrap())?;
    std::fs::write(&record, "{ not json")?;

    let summary = stack.scheduler.tick().await;

    assert_eq!(summary.notified, 1);
    assert_eq!(stack.sink.subjects(), vec!["[ssd] Deal alert registered"]);
    let repaired: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&record)?)?;
    assert_eq!(repaired["current_id"], "55");
    Ok(())
}

#[tokio::test]
async fn test_removed_keyword_state_is_cleaned_up() -> anyhow::Result<()> {
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(algumon_page(&[("1", "deal", "1원")])))
        .mount(&site)
        .await;

    let dir = TempDir::new()?;
    let stack = build_stack(dir.path(), vec![algumon(&site)], vec![], &["ssd", "hdd"]).await?;
    stack.scheduler.tick().await;
    assert!(stack.state_dir.join("hdd").exists());

    stack.registry.remove("hdd")?;
    let summary = stack.scheduler.tick().await;

    assert_eq!(summary.pruned, 1);
    assert!(!stack.state_dir.join("hdd").exists());
    assert!(stack.state_dir.join("ssd").join("algumon.json").exists());
    Ok(())
}

#[tokio::test]
async fn test_blank_post_id_does_not_repeat_first_alert() -> anyhow::Result<()> {
    let site = MockServer::start().await;
    serve(&site, "/search/ssd", algumon_page(&[("", "ghost", "0원"), ("100", "SSD 1TB", "89,000원")])).await;

    let dir = TempDir::new()?;
    let stack = build_stack(dir.path(), vec![algumon(&site)], vec![], &["ssd"]).await?;

    for _ in 0..3 {
        stack.scheduler.tick().await;
    }

    assert_eq!(stack.sink.subjects(), vec!["[ssd] Deal alert registered"]);
    let record: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(
        stack.state_dir.join("ssd").join("algumon.json"),
    )?)?;
    assert_eq!(record["current_id"], "100");
    Ok(())
}
