//! Posts Service

use crate::api::dto::{BulkResponse, MessageResponse, NewPost, Post, PostCreated, PostUpdate};
use crate::api::{ApiClient, ApiResult, Query};

/// Filters for listing posts
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub post_id: Option<i64>,
    pub chat_id: Option<i64>,
    pub validated_only: Option<bool>,
}

impl PostFilter {
    fn query(&self) -> Query {
        let mut query = Query::new();
        if let Some(id) = self.post_id {
            query.push(("post_id", id.to_string()));
        }
        if let Some(chat_id) = self.chat_id {
            query.push(("chat_id", chat_id.to_string()));
        }
        if let Some(validated) = self.validated_only {
            query.push(("validated_only", validated.to_string()));
        }
        query
    }
}

#[derive(Clone)]
pub struct PostsService {
    client: ApiClient,
}

impl PostsService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, filter: &PostFilter) -> ApiResult<Vec<Post>> {
        self.client.get("/posts", &filter.query()).await
    }

    pub async fn get(&self, post_id: i64) -> ApiResult<Post> {
        self.client
            .get(&format!("/posts/{}", post_id), &Query::new())
            .await
    }

    pub async fn create(&self, message_link: &str) -> ApiResult<PostCreated> {
        let body = NewPost {
            message_link: message_link.to_string(),
        };
        self.client.post_json("/posts", &body).await
    }

    pub async fn update(&self, post_id: i64, update: &PostUpdate) -> ApiResult<MessageResponse> {
        self.client
            .put_json(&format!("/posts/{}", post_id), update)
            .await
    }

    pub async fn delete(&self, post_id: i64) -> ApiResult<MessageResponse> {
        self.client.delete(&format!("/posts/{}", post_id)).await
    }

    pub async fn bulk_create(&self, message_links: &[String]) -> ApiResult<BulkResponse> {
        let body: Vec<NewPost> = message_links
            .iter()
            .map(|link| NewPost {
                message_link: link.clone(),
            })
            .collect();
        self.client.post_json("/posts/bulk", &body).await
    }

    pub async fn bulk_delete(&self, post_ids: &[i64]) -> ApiResult<BulkResponse> {
        self.client.delete_json("/posts/bulk", post_ids).await
    }

    /// Resolve chat and message ids on the backend
    pub async fn validate(&self, post_id: i64) -> ApiResult<serde_json::Value> {
        self.client
            .post_json(&format!("/posts/{}/validate", post_id), &serde_json::json!({}))
            .await
    }

    /// Existing post with exactly this message link, if any
    pub async fn find_by_link(&self, message_link: &str) -> ApiResult<Option<Post>> {
        let posts = self.list(&PostFilter::default()).await?;
        Ok(posts.into_iter().find(|p| p.message_link == message_link))
    }
}
