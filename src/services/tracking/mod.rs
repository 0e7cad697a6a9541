use crate::error::Result;
use crate::models::*;
use crate::services::cache::ProfileCache;
use crate::services::store::{ContentCatalog, InteractionLog};
use crate::utils::validation::validate_interaction;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Records engagement events and keeps the cached profile's watch time current.
pub struct InteractionTracker {
    log: Arc<dyn InteractionLog>,
    catalog: Arc<dyn ContentCatalog>,
    cache: Arc<dyn ProfileCache>,
}

impl InteractionTracker {
    pub fn new(
        log: Arc<dyn InteractionLog>,
        catalog: Arc<dyn ContentCatalog>,
        cache: Arc<dyn ProfileCache>,
    ) -> Self {
        Self { log, catalog, cache }
    }

    pub async fn track_interaction(
        &self,
        user_id: Uuid,
        video_id: Uuid,
        interaction_type: InteractionType,
        value: Option<InteractionValue>,
    ) -> Result<()> {
        let value = value.unwrap_or_default();
        let mut event = InteractionEvent::new(user_id, video_id, interaction_type);
        event.watch_time_seconds = value.watch_time_seconds;
        event.device_type = value.device_type.unwrap_or_default();
        event.session_id = value.session_id.unwrap_or_default();
        validate_interaction(&event)?;

        self.resolve_content(&mut event).await;
        let watch_time = event.watch_time_seconds;
        self.log.append(event).await?;

        debug!(
            user_id = %user_id,
            video_id = %video_id,
            interaction = %interaction_type,
            "Tracked interaction"
        );

        if interaction_type == InteractionType::View {
            if let Some(seconds) = watch_time {
                self.fold_watch_time(user_id, seconds).await;
            }
        }

        Ok(())
    }

    /// Copies the creator and tags from the catalog. Unknown videos are still recorded.
    async fn resolve_content(&self, event: &mut InteractionEvent) {
        match self.catalog.get_candidate(event.video_id).await {
            Ok(Some(candidate)) => {
                event.creator_id = Some(candidate.creator_id);
                event.tags = candidate.tags;
            }
            Ok(None) => {
                debug!(
                    video_id = %event.video_id,
                    "Video not in catalog, recording without content"
                );
            }
            Err(e) => {
                warn!(video_id = %event.video_id, "Catalog lookup failed: {}", e);
            }
        }
    }

    async fn fold_watch_time(&self, user_id: Uuid, seconds: f64) {
        // Uncached profiles pick the event up on their next rebuild
        let fold = |profile: &mut UserProfile| profile.fold_watch_time(seconds);
        match self.cache.update(user_id, &fold).await {
            Ok(Some(profile)) => debug!(
                user_id = %user_id,
                avg_watch_time = profile.behaviors.avg_watch_time,
                "Folded watch time into cached profile"
            ),
            Ok(None) => {}
            Err(e) => warn!(user_id = %user_id, "Failed to update cached profile: {}", e),
        }
    }
}
