//! Post list import

use super::ImportError;
use crate::api::dto::BulkResponse;
use crate::drafts::is_valid_post_url;
use crate::services::PostsService;

/// One link per line. Blank lines are ignored and repeats collapse to the
/// first occurrence; any invalid link rejects the whole list.
pub fn parse_post_list(text: &str) -> Result<Vec<String>, ImportError> {
    let mut links: Vec<String> = Vec::new();
    let mut invalid = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !is_valid_post_url(line) {
            invalid.push(line.to_string());
        } else if !links.iter().any(|l| l == line) {
            links.push(line.to_string());
        }
    }

    if !invalid.is_empty() {
        return Err(ImportError::Invalid(format!(
            "Invalid URLs: {}",
            invalid.join(", ")
        )));
    }
    if links.is_empty() {
        return Err(ImportError::NoValidRows("No post URLs found".to_string()));
    }
    Ok(links)
}

pub async fn import_posts(
    service: &PostsService,
    text: &str,
) -> Result<BulkResponse, ImportError> {
    let links = parse_post_list(text)?;
    let response = service.bulk_create(&links).await?;
    tracing::info!(
        total = links.len(),
        created = response.results.iter().filter(|r| r.is_success()).count(),
        "Post import finished"
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockBackend;
    use serde_json::json;

    #[test]
    fn test_parse_post_list() {
        let links = parse_post_list("https://t.me/a/1\n\n https://t.me/a/2 \r\nhttps://t.me/a/1\n").unwrap();
        assert_eq!(links, vec!["https://t.me/a/1", "https://t.me/a/2"]);

        let err = parse_post_list("https://t.me/a/1\nhttps://example.com/x").unwrap_err();
        assert_eq!(err.to_string(), "Invalid URLs: https://example.com/x");

        assert!(matches!(
            parse_post_list("\n  \n"),
            Err(ImportError::NoValidRows(_))
        ));
    }

    #[tokio::test]
    async fn test_import_posts() {
        let mock = MockBackend::start().await;
        mock.respond(
            "POST",
            "/posts/bulk",
            200,
            json!({"message": "ok", "results": [{"status": "success", "post_id": 1}]}),
        );
        let service = PostsService::new(mock.client());

        let response = import_posts(&service, "https://t.me/a/1").await.unwrap();
        assert!(response.results[0].is_success());

        // Nothing is sent for an invalid list
        assert!(import_posts(&service, "nope").await.is_err());
        assert_eq!(mock.requests_to("POST", "/posts/bulk").len(), 1);
    }
}
