//! The global mode switch: closed / frozen / open.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::{info, warn};

use coursehub_core::result::AppResult;
use coursehub_database::repositories::StateRepository;
use coursehub_entity::mode::Mode;

use crate::protocol::ServerFrame;
use crate::registry::SessionRegistry;

/// Owns the process-wide mode cell and its persistence.
///
/// Transitions are durable-first: the new value is written to the
/// database before the in-memory cell advances, so a persistence
/// failure leaves the running mode untouched.
#[derive(Debug)]
pub struct ModeController {
    current: AtomicU32,
    states: StateRepository,
    registry: Arc<SessionRegistry>,
}

impl ModeController {
    /// Load the persisted mode, defaulting to closed when the row is
    /// missing or holds an unknown value.
    pub async fn load(states: StateRepository, registry: Arc<SessionRegistry>) -> AppResult<Self> {
        let raw = states.load_or_init().await?;
        let mode = Mode::try_from(raw).unwrap_or_else(|bad| {
            warn!(value = bad, "unknown persisted mode; defaulting to closed");
            Mode::Closed
        });
        info!(?mode, "access mode loaded");
        Ok(Self {
            current: AtomicU32::new(mode as u32),
            states,
            registry,
        })
    }

    /// The current mode.
    pub fn current(&self) -> Mode {
        // The cell only ever holds values written from a valid Mode.
        Mode::try_from(self.current.load(Ordering::Acquire)).unwrap_or(Mode::Closed)
    }

    /// Switch the global mode, persisting first and then applying the
    /// transition's side effect: mass disconnect on closed, `STOP` on
    /// frozen, `START` on open.
    pub async fn set_mode(&self, new: Mode) -> AppResult<()> {
        self.states.save(new.as_i32()).await?;
        self.current.store(new as u32, Ordering::Release);

        match new {
            Mode::Closed => {
                self.registry.cancel_all();
                info!(sessions = self.registry.len(), "mode closed; live sessions cancelled");
            }
            Mode::Frozen => {
                let reached = self.registry.broadcast(&ServerFrame::Stop.to_string());
                info!(reached, "mode frozen");
            }
            Mode::Open => {
                let reached = self.registry.broadcast(&ServerFrame::Start.to_string());
                info!(reached, "mode open");
            }
        }
        Ok(())
    }
}
