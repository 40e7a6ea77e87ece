//! In-memory SavedViewStore, mainly for tests and single-process hosts.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{QueryFilter, SavedView};
use crate::error::EngineError;
use crate::ports::SavedViewStore;
use crate::validation;

#[derive(Default)]
pub struct InMemorySavedViewStore {
    views: RwLock<HashMap<Uuid, SavedView>>,
}

impl InMemorySavedViewStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SavedViewStore for InMemorySavedViewStore {
    async fn list_views(&self, owner: Uuid) -> Result<Vec<SavedView>, EngineError> {
        let views = self.views.read().await;
        let mut owned: Vec<_> = views
            .values()
            .filter(|view| view.owner == owner)
            .cloned()
            .collect();
        owned.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(owned)
    }

    async fn save_view(
        &self,
        owner: Uuid,
        name: &str,
        filter: QueryFilter,
    ) -> Result<SavedView, EngineError> {
        let name = validation::sanitize_string(name);
        validation::validate_required("name", &name)?;
        filter.validate()?;

        let view = SavedView::new(owner, name, filter);
        self.views.write().await.insert(view.id, view.clone());
        Ok(view)
    }

    async fn delete_view(&self, id: Uuid) -> Result<(), EngineError> {
        match self.views.write().await.remove(&id) {
            Some(_) => Ok(()),
            None => Err(EngineError::NotFound(id.to_string())),
        }
    }
}
