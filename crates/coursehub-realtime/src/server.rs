//! Top-level realtime engine that ties together all subsystems.

use std::sync::Arc;

use sqlx::PgPool;
use tracing::info;

use coursehub_core::config::PerfConfig;
use coursehub_core::result::AppResult;
use coursehub_database::repositories::{ChoiceRepository, CourseRepository, StateRepository};

use crate::catalogue::Catalogue;
use crate::engine::SelectionEngine;
use crate::mode::ModeController;
use crate::notifier::UpdateNotifier;
use crate::registry::SessionRegistry;

/// Central realtime engine coordinating the selection subsystems.
#[derive(Debug)]
pub struct RealtimeEngine {
    /// The course catalogue with seat counters and subscriber tables.
    pub catalogue: Arc<Catalogue>,
    /// Live session handles per user.
    pub registry: Arc<SessionRegistry>,
    /// Update fan-out and pacing.
    pub notifier: Arc<UpdateNotifier>,
    /// Global mode switch.
    pub mode: Arc<ModeController>,
    /// Admission and commit protocol.
    pub selection: Arc<SelectionEngine>,
    /// Tuning knobs shared with the session machinery.
    pub perf: PerfConfig,
}

impl RealtimeEngine {
    /// Build the engine: load the catalogue (rebuilding seat counters
    /// from existing choices), restore the persisted mode, and wire the
    /// selection engine.
    pub async fn new(perf: PerfConfig, pool: PgPool) -> AppResult<Self> {
        let catalogue = Arc::new(
            Catalogue::load(
                &CourseRepository::new(pool.clone()),
                &ChoiceRepository::new(pool.clone()),
            )
            .await?,
        );
        let registry = Arc::new(SessionRegistry::new());
        let notifier = Arc::new(UpdateNotifier::new(perf.usem_delay_shift_bits));
        let mode = Arc::new(
            ModeController::load(StateRepository::new(pool.clone()), Arc::clone(&registry)).await?,
        );
        let selection = Arc::new(SelectionEngine::new(
            pool,
            Arc::clone(&catalogue),
            Arc::clone(&notifier),
            Arc::clone(&mode),
            perf.propagate_immediate,
        ));

        info!(courses = catalogue.len(), "realtime engine initialized");

        Ok(Self {
            catalogue,
            registry,
            notifier,
            mode,
            selection,
            perf,
        })
    }
}
