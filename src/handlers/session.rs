use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{DetectionError, SessionError};
use crate::models::{clamp_grams, DraftItem, FoodEntry, ImageInput, ItemOutcome, ItemReport, OutputFormat};
use crate::services::{NutritionResolver, VisionDetector};

/// Transient state of one user's detect → edit → analyze cycle.
#[derive(Debug, Clone)]
pub struct FoodSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    drafts: Vec<DraftItem>,
    reports: Vec<ItemReport>,
    generation: u64, // bumped whenever a new image replaces the drafts
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub items: Vec<DraftItem>,
    pub results: Vec<ItemReport>,
}

impl FoodSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            drafts: Vec::new(),
            reports: Vec::new(),
            generation: 0,
        }
    }

    pub fn drafts(&self) -> &[DraftItem] {
        &self.drafts
    }

    pub fn clear(&mut self) {
        self.drafts.clear();
        self.reports.clear();
        self.generation += 1;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Keep reports computed from an earlier copy of the drafts, unless a
    /// new image arrived since. Returns whether they were stored.
    pub fn store_reports(&mut self, generation: u64, reports: Vec<ItemReport>) -> bool {
        if generation != self.generation {
            return false;
        }
        self.reports = reports;
        true
    }

    fn load_detections(&mut self, names: Vec<String>) {
        self.drafts = names.into_iter().map(DraftItem::new).collect();
    }

    /// Apply a user correction. The weight is clamped to the accepted range.
    pub fn edit_item(
        &mut self,
        index: usize,
        name: Option<&str>,
        grams: Option<u32>,
    ) -> Result<&DraftItem, SessionError> {
        let name = match name {
            Some(name) if name.trim().is_empty() => return Err(SessionError::EmptyName),
            Some(name) => Some(name.trim().to_string()),
            None => None,
        };

        let draft = self
            .drafts
            .get_mut(index)
            .ok_or(SessionError::NoSuchItem(index))?;

        if let Some(name) = name {
            draft.name = name;
        }
        if let Some(grams) = grams {
            draft.grams = clamp_grams(grams);
        }

        Ok(draft)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            created_at: self.created_at,
            items: self.drafts.clone(),
            results: self.reports.clone(),
        }
    }
}

impl Default for FoodSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Sequences the two user-triggered phases against a session.
pub struct SessionOrchestrator {
    detector: VisionDetector,
    resolver: NutritionResolver,
    concurrency: usize,
}

impl SessionOrchestrator {
    pub fn new(detector: VisionDetector, resolver: NutritionResolver, concurrency: usize) -> Self {
        Self {
            detector,
            resolver,
            concurrency: concurrency.max(1),
        }
    }

    /// Phase 1: a new image replaces whatever the session held before.
    pub async fn detect<'s>(
        &self,
        session: &'s mut FoodSession,
        image: ImageInput,
    ) -> Result<&'s [DraftItem], DetectionError> {
        session.clear();

        let names = self.detector.detect(&image).await?;
        session.load_detections(names);

        log::info!("📝 Session {} holds {} draft item(s)", session.id, session.drafts.len());
        Ok(session.drafts())
    }

    /// Phase 2: resolve every draft independently from a copy of the
    /// session's drafts. One failing item never stops the others; reports
    /// come back in draft order.
    pub async fn resolve_all(
        &self,
        session_id: Uuid,
        drafts: Vec<DraftItem>,
        format: OutputFormat,
    ) -> Vec<ItemReport> {
        let reports: Vec<ItemReport> = stream::iter(drafts.into_iter().enumerate())
            .map(|(index, draft)| self.resolve_one(index, draft, format))
            .buffered(self.concurrency)
            .collect()
            .await;

        let failed = reports.iter().filter(|r| !r.is_resolved()).count();
        log::info!(
            "📊 Session {} analyzed: {} resolved, {} failed",
            session_id,
            reports.len() - failed,
            failed
        );

        reports
    }

    async fn resolve_one(&self, index: usize, draft: DraftItem, format: OutputFormat) -> ItemReport {
        let outcome = match FoodEntry::new(&draft.name, draft.grams) {
            Ok(entry) => match self.resolver.resolve(&entry.name, entry.grams, format).await {
                Ok(result) => ItemOutcome::Resolved(result),
                Err(e) => {
                    log::error!("❌ Failed to analyze {} ({}g): {}", entry.name, entry.grams, e);
                    ItemOutcome::Failed { error: e.to_string() }
                }
            },
            Err(e) => ItemOutcome::Failed { error: e.to_string() },
        };

        ItemReport {
            index,
            name: draft.name,
            grams: draft.grams,
            outcome,
        }
    }
}
