// tests/providers_google_news.rs
use guardian_post::ingest::providers::google_news::GoogleNewsProvider;
use guardian_post::ingest::types::{FeedQuery, FeedSource, Locale};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FIXTURE: &str = include_str!("fixtures/google_news_rss.xml");

fn kr_query(keyword: &str) -> FeedQuery {
    FeedQuery {
        keyword: keyword.into(),
        locale: Locale {
            hl: "ko".into(),
            gl: "KR".into(),
            ceid: "KR:ko".into(),
            region: "KR".into(),
        },
    }
}

#[tokio::test]
async fn parses_google_news_fixture() {
    let p = GoogleNewsProvider::from_fixture(FIXTURE);
    let items = p.search(&kr_query("국방 AI")).await.expect("ok");

    assert_eq!(items.len(), 3);
    assert!(items.iter().all(|e| e.link.is_some()));
    assert!(items.iter().all(|e| e.published_at.is_some()));
    assert_eq!(items[0].source_name.as_deref(), Some("연합뉴스"));
    assert!(items[2].source_name.is_none());
    assert!(items[1]
        .content_html
        .as_deref()
        .unwrap()
        .contains("https://img.example.test/kookbang/a2.jpg"));
}

#[tokio::test]
async fn http_mode_sends_locale_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rss/search"))
        .and(query_param("q", "국방 AI"))
        .and(query_param("hl", "ko"))
        .and(query_param("gl", "KR"))
        .and(query_param("ceid", "KR:ko"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FIXTURE))
        .expect(1)
        .mount(&server)
        .await;

    let p = GoogleNewsProvider::from_url(format!("{}/rss/search", server.uri())).unwrap();
    let items = p.search(&kr_query("국방 AI")).await.expect("ok");
    assert_eq!(items.len(), 3);
}

#[tokio::test]
async fn http_error_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let p = GoogleNewsProvider::from_url(format!("{}/rss/search", server.uri())).unwrap();
    assert!(p.search(&kr_query("x")).await.is_err());
}

#[tokio::test]
async fn garbage_body_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>captcha"))
        .mount(&server)
        .await;

    let p = GoogleNewsProvider::from_url(format!("{}/rss/search", server.uri())).unwrap();
    assert!(p.search(&kr_query("x")).await.is_err());
}
