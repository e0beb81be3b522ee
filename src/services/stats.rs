//! Stats Service

use crate::api::dto::Stats;
use crate::api::{ApiClient, ApiResult, Query};

#[derive(Clone)]
pub struct StatsService {
    client: ApiClient,
}

impl StatsService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn get(&self) -> ApiResult<Stats> {
        self.client.get("/stats", &Query::new()).await
    }
}
