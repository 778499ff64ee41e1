//! The per-user session machine.
//!
//! A session owns its select loop; a reader task (owned by the
//! transport layer) feeds inbound frames through a channel, and one
//! forwarder task per subscribed course turns coalesced update signals
//! into entries on the session's `updates` channel. Message handlers
//! run serially within the loop, which is what lets the group set and
//! type counters live unlocked in [`SessionSelections`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use coursehub_core::error::AppError;
use coursehub_core::result::AppResult;
use coursehub_entity::mode::Mode;

use crate::engine::SessionSelections;
use crate::protocol::{ClientFrame, ServerFrame};
use crate::registry::SessionHandle;
use crate::server::RealtimeEngine;
use crate::signal::{UpdateWaiter, update_signal};

/// Final frame delivered when a session is torn down by preemption or
/// a mode change.
const CANCELED: &str = "Context canceled";

/// Reply when the user's stored choices cannot be loaded.
const POPULATE_FAILED: &str = "Cannot fetch your current choices";

/// Run one authenticated session to completion.
///
/// `outbound` carries encoded server frames toward the socket;
/// `inbound` carries raw text frames from it. The transport closing
/// `inbound` ends the session; the session dropping `outbound` (via
/// its teardown) tells the transport to finish writing and close.
pub async fn run_session(
    engine: Arc<RealtimeEngine>,
    userid: String,
    outbound: mpsc::Sender<String>,
    inbound: mpsc::Receiver<String>,
) -> AppResult<()> {
    let handle = SessionHandle::new(outbound.clone());

    // Single session per user: displace and join any prior session
    // before touching the subscriber tables.
    if let Some(prior) = engine.registry.install(&userid, handle.clone()) {
        prior.cancel();
        let grace = Duration::from_millis(engine.perf.preempt_grace_ms);
        if tokio::time::timeout(grace, prior.finished()).await.is_err() {
            warn!(userid = %userid, "prior session did not finish within the preemption grace period");
        } else {
            debug!(userid = %userid, "prior session preempted");
        }
    }

    let (updates_tx, updates_rx) = mpsc::channel(engine.perf.senq);
    engine.catalogue.for_each(|course| {
        let (signal, waiter) = update_signal();
        course.subscribe(&userid, signal);
        spawn_forwarder(
            Arc::clone(&engine),
            handle.cancel_token(),
            waiter,
            course.id,
            updates_tx.clone(),
        );
    });
    engine.notifier.subscribers_added(engine.catalogue.len());
    drop(updates_tx);

    let result = drive(&engine, &userid, &handle, &outbound, inbound, updates_rx).await;

    // Teardown must run on every exit path: stop the forwarders, leave
    // the subscriber tables, release the registry slot (unless a newer
    // session already took it), and wake anyone joining on us.
    handle.cancel();
    engine.catalogue.for_each(|course| course.unsubscribe(&userid));
    engine.notifier.subscribers_removed(engine.catalogue.len());
    engine.registry.compare_and_delete(&userid, &handle);
    handle.mark_finished();

    result
}

/// One forwarder: wait on the course's coalescing signal, push the
/// course id into the session's `updates` channel, then pace.
fn spawn_forwarder(
    engine: Arc<RealtimeEngine>,
    cancel: CancellationToken,
    mut waiter: UpdateWaiter,
    course_id: i32,
    updates: mpsc::Sender<i32>,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                marked = waiter.wait() => {
                    if !marked {
                        return;
                    }
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => return,
                sent = updates.send(course_id) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
            tokio::time::sleep(engine.notifier.pacing_delay()).await;
        }
    });
}

/// The select loop proper.
async fn drive(
    engine: &RealtimeEngine,
    userid: &str,
    handle: &SessionHandle,
    outbound: &mpsc::Sender<String>,
    mut inbound: mpsc::Receiver<String>,
    mut updates: mpsc::Receiver<i32>,
) -> AppResult<()> {
    let rows = match engine.selection.choices().find_selections_by_user(userid).await {
        Ok(rows) => rows,
        Err(e) => {
            let _ = send(outbound, &ServerFrame::error(POPULATE_FAILED)).await;
            return Err(e);
        }
    };
    let mut selections = SessionSelections::from_rows(&rows);
    let held: Vec<i32> = rows.iter().map(|r| r.courseid).collect();

    if engine.mode.current() == Mode::Open {
        send(outbound, &ServerFrame::Start).await?;
    }
    send(outbound, &ServerFrame::Welcome { course_ids: held }).await?;

    info!(userid = %userid, "session attached");

    loop {
        tokio::select! {
            _ = handle.cancelled() => {
                // Best-effort farewell; the queue may already be gone.
                let _ = outbound.try_send(ServerFrame::error(CANCELED).to_string());
                return Err(AppError::session("session canceled"));
            }
            Some(course_id) = updates.recv() => {
                if let Some(course) = engine.catalogue.lookup(course_id) {
                    let frame = ServerFrame::Count {
                        course_id,
                        selected: course.selected(),
                    };
                    send(outbound, &frame).await?;
                }
            }
            line = inbound.recv() => {
                let Some(line) = line else {
                    debug!(userid = %userid, "transport closed");
                    return Ok(());
                };
                handle_frame(engine, userid, outbound, &mut selections, &line).await?;
            }
        }
    }
}

/// Dispatch one inbound frame. An `Err` return is terminal.
async fn handle_frame(
    engine: &RealtimeEngine,
    userid: &str,
    outbound: &mpsc::Sender<String>,
    selections: &mut SessionSelections,
    line: &str,
) -> AppResult<()> {
    if line.len() > engine.perf.msg_bytes_cap {
        return send(outbound, &ServerFrame::error("Message too long")).await;
    }

    let frame = match ClientFrame::parse(line, engine.perf.msg_args_cap) {
        Ok(frame) => frame,
        Err(e) => return send(outbound, &ServerFrame::error(e.to_string())).await,
    };

    match frame {
        ClientFrame::Hello => {
            let held = match engine
                .selection
                .choices()
                .find_course_ids_by_user(userid)
                .await
            {
                Ok(ids) => ids,
                Err(e) => {
                    let _ = send(outbound, &ServerFrame::error(POPULATE_FAILED)).await;
                    return Err(e);
                }
            };
            if engine.mode.current() == Mode::Open {
                send(outbound, &ServerFrame::Start).await?;
            }
            send(outbound, &ServerFrame::Welcome { course_ids: held }).await
        }
        ClientFrame::Choose { course_id } => {
            deliver(
                outbound,
                engine.selection.choose(userid, course_id, selections).await,
            )
            .await
        }
        ClientFrame::Release { course_id } => {
            deliver(
                outbound,
                engine
                    .selection
                    .unchoose(userid, course_id, selections)
                    .await,
            )
            .await
        }
    }
}

/// Write a handler's replies, converting a terminal error into a final
/// `E :` frame before propagating it.
async fn deliver(
    outbound: &mpsc::Sender<String>,
    result: AppResult<Vec<ServerFrame>>,
) -> AppResult<()> {
    match result {
        Ok(frames) => {
            for frame in &frames {
                send(outbound, frame).await?;
            }
            Ok(())
        }
        Err(e) => {
            let _ = send(outbound, &ServerFrame::error(e.message.clone())).await;
            Err(e)
        }
    }
}

/// Queue one frame, treating a closed queue as a dead transport.
async fn send(outbound: &mpsc::Sender<String>, frame: &ServerFrame) -> AppResult<()> {
    outbound
        .send(frame.to_string())
        .await
        .map_err(|_| AppError::session("outbound queue closed"))
}
