//! Palettes Service
//!
//! Reaction sets used by `react` tasks. Create/update fields travel as
//! query parameters with emojis comma-joined.

use crate::api::dto::{MessageResponse, Palette, PaletteUpdate};
use crate::api::{ApiClient, ApiError, ApiResult, Query};

#[derive(Clone)]
pub struct PalettesService {
    client: ApiClient,
}

impl PalettesService {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    fn path(name: &str) -> String {
        format!("/palettes/{}", ApiClient::segment(name))
    }

    /// All palettes. Failures degrade to an empty list.
    pub async fn list(&self) -> Vec<Palette> {
        match self.client.get("/palettes", &Query::new()).await {
            Ok(palettes) => palettes,
            Err(e) => {
                tracing::error!(error = %e, "Error fetching palettes");
                Vec::new()
            }
        }
    }

    pub async fn get(&self, palette_name: &str) -> ApiResult<Palette> {
        self.client.get(&Self::path(palette_name), &Query::new()).await
    }

    pub async fn create(&self, palette: &Palette) -> ApiResult<MessageResponse> {
        if palette.palette_name.trim().is_empty() {
            return Err(ApiError::Validation("palette_name is required".into()));
        }
        if palette.emojis.is_empty() {
            return Err(ApiError::Validation("At least one emoji is required".into()));
        }

        let mut query: Query = vec![
            ("palette_name", palette.palette_name.clone()),
            ("emojis", palette.emojis.join(",")),
            ("ordered", palette.ordered.to_string()),
        ];
        if let Some(description) = palette.description.as_ref().filter(|d| !d.is_empty()) {
            query.push(("description", description.clone()));
        }
        self.client.post_query("/palettes", &query).await
    }

    pub async fn update(&self, palette_name: &str, update: &PaletteUpdate) -> ApiResult<MessageResponse> {
        let mut query = Query::new();
        if let Some(emojis) = update.emojis.as_ref().filter(|e| !e.is_empty()) {
            query.push(("emojis", emojis.join(",")));
        }
        if let Some(ordered) = update.ordered {
            query.push(("ordered", ordered.to_string()));
        }
        if let Some(description) = &update.description {
            query.push(("description", description.clone()));
        }
        self.client.put_query(&Self::path(palette_name), &query).await
    }

    pub async fn delete(&self, palette_name: &str) -> ApiResult<MessageResponse> {
        self.client.delete(&Self::path(palette_name)).await
    }
}
