//! Channels Service
//!
//! The backend takes channel create/update fields as query parameters.

use crate::api::dto::{Channel, ChannelFields, ChannelStats, ChannelWithPostCount, MessageResponse};
use crate::api::{ApiClient, ApiError, ApiResult, Query};

#[derive(Debug, Clone, Default)]
pub struct ChannelFilter {
    pub chat_id: Option<i64>,
    pub tag: Option<String>,
    pub name: Option<String>,
}

fn field_query(fields: &ChannelFields) -> Query {
    let mut query = Query::new();
    if let Some(name) = fields.channel_name.as_ref().filter(|n| !n.is_empty()) {
        query.push(("channel_name", name.clone()));
    }
    if let Some(v) = fields.is_private {
        query.push(("is_private", v.to_string()));
    }
    if let Some(v) = fields.has_enabled_reactions {
        query.push(("has_enabled_reactions", v.to_string()));
    }
    if let Some(v) = fields.reactions_only_for_subscribers {
        query.push(("reactions_only_for_subscribers", v.to_string()));
    }
    if let Some(id) = fields.discussion_chat_id {
        query.push(("discussion_chat_id", id.to_string()));
    }
    if let Some(tags) = &fields.tags {
        query.push(("tags", tags.join(",")));
    }
    query
}

#[derive(Clone)]
pub struct ChannelsService {
    client: ApiClient,
}

impl ChannelsService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn list(&self, filter: &ChannelFilter) -> ApiResult<Vec<Channel>> {
        let mut query = Query::new();
        if let Some(id) = filter.chat_id {
            query.push(("chat_id", id.to_string()));
        }
        if let Some(tag) = filter.tag.as_ref().filter(|t| !t.is_empty()) {
            query.push(("tag", tag.clone()));
        }
        if let Some(name) = filter.name.as_ref().filter(|n| !n.is_empty()) {
            query.push(("name", name.clone()));
        }
        self.client.get("/channels", &query).await
    }

    pub async fn get(&self, chat_id: i64) -> ApiResult<Channel> {
        self.client
            .get(&format!("/channels/{}", chat_id), &Query::new())
            .await
    }

    /// Create a channel; `channel_name` and the three flags are required
    pub async fn create(&self, chat_id: i64, fields: &ChannelFields) -> ApiResult<MessageResponse> {
        if fields.channel_name.as_deref().map_or(true, str::is_empty) {
            return Err(ApiError::Validation("channel_name is required".into()));
        }
        let complete = ChannelFields {
            is_private: Some(fields.is_private.unwrap_or(false)),
            has_enabled_reactions: Some(fields.has_enabled_reactions.unwrap_or(false)),
            reactions_only_for_subscribers: Some(
                fields.reactions_only_for_subscribers.unwrap_or(false),
            ),
            tags: fields.tags.clone().filter(|t| !t.is_empty()),
            ..fields.clone()
        };

        let mut query: Query = vec![("chat_id", chat_id.to_string())];
        query.extend(field_query(&complete));
        self.client.post_query("/channels", &query).await
    }

    pub async fn update(&self, chat_id: i64, fields: &ChannelFields) -> ApiResult<MessageResponse> {
        self.client
            .put_query(&format!("/channels/{}", chat_id), &field_query(fields))
            .await
    }

    pub async fn delete(&self, chat_id: i64) -> ApiResult<MessageResponse> {
        self.client.delete(&format!("/channels/{}", chat_id)).await
    }

    pub async fn stats(&self) -> ApiResult<ChannelStats> {
        self.client.get("/channels/stats/summary", &Query::new()).await
    }

    pub async fn with_post_counts(&self) -> ApiResult<Vec<ChannelWithPostCount>> {
        self.client
            .get("/channels/with-post-counts", &Query::new())
            .await
    }
}
