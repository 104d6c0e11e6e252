use super::*;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn loader_config() -> GitSourceConfig {
    GitSourceConfig {
        owner: "acme".to_string(),
        repo: "docs".to_string(),
        branch: "main".to_string(),
        token: None,
    }
}

fn mock_loader(server: &MockServer) -> GitMarkdownLoader {
    let api_base = Url::parse(&server.uri()).expect("mock server uri parses");
    GitMarkdownLoader::with_api_base(loader_config(), api_base)
}

fn test_domain(git_paths: &[&str]) -> DomainConfig {
    DomainConfig {
        name: "dispatch".to_string(),
        keywords: Vec::new(),
        git_paths: git_paths.iter().map(|p| (*p).to_string()).collect(),
        wiki_space: None,
        wiki_query: None,
        local_docs_dir: None,
    }
}

#[test]
fn markdown_detection_is_case_insensitive() {
    assert!(is_markdown("docs/README.md"));
    assert!(is_markdown("docs/GUIDE.MD"));
    assert!(is_markdown("docs/notes.markdown"));
    assert!(!is_markdown("docs/diagram.png"));
    assert!(!is_markdown("docs/data.json"));
}

#[test]
fn contents_url_includes_branch_ref() {
    let loader = GitMarkdownLoader::new(loader_config()).expect("loader builds");
    let url = loader
        .contents_url("docs/architecture")
        .expect("url builds");

    assert_eq!(url.path(), "/repos/acme/docs/contents/docs/architecture");
    assert_eq!(url.query(), Some("ref=main"));
}

#[tokio::test(flavor = "multi_thread")]
async fn recursive_walk_collects_markdown_with_provenance() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/docs/contents/docs"))
        .and(query_param("ref", "main"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "path": "docs/overview.md",
                "type": "file",
                "download_url": format!("{}/raw/docs/overview.md", server.uri())
            },
            {
                "path": "docs/guides",
                "type": "dir",
                "download_url": null
            },
            {
                "path": "docs/diagram.png",
                "type": "file",
                "download_url": format!("{}/raw/docs/diagram.png", server.uri())
            }
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/repos/acme/docs/contents/docs/guides"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {
                "path": "docs/guides/setup.md",
                "type": "file",
                "download_url": format!("{}/raw/docs/guides/setup.md", server.uri())
            }
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/raw/docs/overview.md"))
        .respond_with(ResponseTemplate::new(200).set_body_string("# Overview\ntop level"))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/raw/docs/guides/setup.md"))
        .respond_with(ResponseTemplate::new(200).set_body_string("# Setup\nnested"))
        .mount(&server)
        .await;

    let loader = mock_loader(&server);
    let domain = test_domain(&["docs"]);

    let text = tokio::task::spawn_blocking(move || loader.load(&domain))
        .await
        .expect("task completes")
        .expect("load succeeds");

    assert!(text.contains("--- docs/overview.md ---"));
    assert!(text.contains("top level"));
    assert!(text.contains("--- docs/guides/setup.md ---"));
    assert!(text.contains("nested"));
    assert!(!text.contains("diagram.png"));
}

#[tokio::test(flavor = "multi_thread")]
async fn api_failure_surfaces_as_loader_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let loader = mock_loader(&server);
    let domain = test_domain(&["docs"]);

    let result = tokio::task::spawn_blocking(move || loader.load(&domain))
        .await
        .expect("task completes");

    assert!(matches!(result, Err(crate::KbError::Loader(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn domain_without_git_paths_loads_nothing() {
    let server = MockServer::start().await;
    let loader = mock_loader(&server);
    let domain = test_domain(&[]);

    let text = tokio::task::spawn_blocking(move || loader.load(&domain))
        .await
        .expect("task completes")
        .expect("load succeeds");

    assert!(text.is_empty());
}
