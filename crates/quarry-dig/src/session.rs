//! The excavation session controller.
//!
//! Owns the single active [`ExcavationSession`] and sequences the dig
//! protocol exchange around it: begin on start, cancel/begin pairs on forced
//! restarts, finish packets once progress reaches 1, and cancel on stop.
//! Three asynchronous feeds drive it — tick pulses, per-position block-change
//! notifications, and caller-issued stops — each handled atomically through
//! `&mut self`, so a tick can never resend packets for a session a concurrent
//! change notification already cleared.

use std::time::{Duration, Instant};

use glam::Vec3;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use quarry_core::{AgentSnapshot, Block, BlockFace, BlockPos, Presentation, WorldView};
use quarry_protocol::{CANCEL_FACE_NEUTRAL, DigPacket, PacketSink, TransportError};

use crate::aim::{Aim, AimHint, FaceError, resolve_aim};
use crate::events::{DigEvent, DigEventBuffer, DigTicket};
use crate::progress::{AttemptProgress, ProgressStep};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum center-to-eye distance at which a dig may start.
pub const MAX_REACH: f32 = 4.5;

/// Looser reach used by the [`can_dig`] reachability probe.
pub const CAN_DIG_REACH: f32 = 5.1;

/// How often the viewpoint is re-steered toward the aim point.
pub const REAIM_PERIOD: Duration = Duration::from_millis(150);

/// How often the cosmetic arm swing replays.
pub const SWING_PERIOD: Duration = Duration::from_millis(350);

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// How the session treats the viewpoint while digging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrientationMode {
    /// Snap the view to the aim point and keep re-steering it.
    Forced,
    /// Turn smoothly toward the aim point and keep re-steering it.
    Smooth,
    /// Leave the viewpoint alone entirely. Face resolution is skipped and
    /// the default face is used.
    Ignore,
}

/// Observable controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigState {
    /// No active session.
    Idle,
    /// A session is active and accumulating progress.
    Digging,
    /// Progress reached 1; finish packets resend until the world confirms.
    Finishing,
}

/// Excavation failure surfaced to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DigError {
    /// The requested target block is missing or unloaded.
    #[error("dig requested for a missing or unloaded block")]
    InvalidTarget,
    /// Face resolution found no reachable face.
    #[error("no clear face toward the target block")]
    BlockNotInView,
    /// The session was stopped externally or superseded by a new target.
    #[error("digging aborted")]
    Aborted,
    /// A packet send failed; the protocol state is no longer trustworthy.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
}

impl From<FaceError> for DigError {
    fn from(err: FaceError) -> Self {
        match err {
            FaceError::BlockNotInView => Self::BlockNotInView,
        }
    }
}

/// Returns `true` if `block` is excavatable and within the loose reach probe.
///
/// Callers routinely use this to test reachability before committing to a
/// dig; it is deliberately looser than the start-time [`MAX_REACH`] check.
pub fn can_dig(block: &Block, agent: &AgentSnapshot) -> bool {
    block.diggable && block.position.center().distance(agent.eye_position()) <= CAN_DIG_REACH
}

// ---------------------------------------------------------------------------
// ExcavationSession
// ---------------------------------------------------------------------------

/// The single active excavation attempt. Owned exclusively by the
/// controller; cleared only on completion, abort, or agent reset.
struct ExcavationSession {
    /// Target block snapshot, immutable for the session's lifetime.
    target: Block,
    /// Resolved dig face, named by every protocol packet of the session.
    face: BlockFace,
    /// Point the orientation subsystem is asked to track.
    aim_point: Vec3,
    /// Viewpoint policy for this session.
    orientation: OrientationMode,
    /// Progress of the current attempt.
    progress: AttemptProgress,
    /// Last re-aim instant.
    last_aim: Instant,
    /// Last arm-swing instant.
    last_swing: Instant,
    /// Resolves the caller's ticket on the terminal transition.
    done: Option<oneshot::Sender<Result<Block, DigError>>>,
}

// ---------------------------------------------------------------------------
// DigController
// ---------------------------------------------------------------------------

/// Orchestrates the dig protocol exchange for at most one session at a time.
pub struct DigController<S: PacketSink, P: Presentation> {
    sink: S,
    view: P,
    session: Option<ExcavationSession>,
    last_stop: Option<Instant>,
    events: DigEventBuffer,
}

impl<S: PacketSink, P: Presentation> DigController<S, P> {
    /// Creates an idle controller over the given transport and presentation
    /// collaborators.
    pub fn new(sink: S, view: P) -> Self {
        Self {
            sink,
            view,
            session: None,
            last_stop: None,
            events: DigEventBuffer::new(),
        }
    }

    /// Starts excavating `target`.
    ///
    /// Returns `Ok(None)` without side effects when the target is farther
    /// than [`MAX_REACH`] (a benign probe, not an error). An already-active
    /// session is stopped first — if it targets the same position, its
    /// cancel packet carries the new session's face instead of the neutral
    /// value (server-observed quirk).
    ///
    /// # Errors
    ///
    /// [`DigError::InvalidTarget`] when no block exists at `target`,
    /// [`DigError::BlockNotInView`] from face resolution, and
    /// [`DigError::Transport`] when the begin packet cannot be sent.
    pub fn start(
        &mut self,
        world: &dyn WorldView,
        agent: &AgentSnapshot,
        target: BlockPos,
        orientation: OrientationMode,
        hint: AimHint,
        now: Instant,
    ) -> Result<Option<DigTicket>, DigError> {
        let block = world.block_at(target).ok_or(DigError::InvalidTarget)?;
        let eye = agent.eye_position();
        let distance = block.position.center().distance(eye);
        if distance > MAX_REACH {
            debug!(?target, distance, "dig target out of reach, ignoring");
            return Ok(None);
        }

        let aim = if orientation == OrientationMode::Ignore {
            Aim {
                face: BlockFace::Top,
                point: block.position.center(),
            }
        } else {
            resolve_aim(&block, &hint, eye, world)?
        };

        // Single-session invariant: supersede any active session before the
        // new begin goes out.
        let cancel_face = match &self.session {
            Some(active) if active.target.position == target => aim.face.wire(),
            _ => CANCEL_FACE_NEUTRAL,
        };
        if self.session.is_some() {
            self.abort_active(cancel_face, now);
        }

        self.sink.send(DigPacket::begin(target, aim.face))?;
        debug!(?target, face = ?aim.face, "begin dig");

        if orientation != OrientationMode::Ignore
            && let Err(err) = self
                .view
                .look_at(aim.point, orientation == OrientationMode::Forced)
        {
            trace!(%err, "initial look-at failed, continuing");
        }
        self.view.swing_arm();

        let (done, ticket) = DigTicket::channel();
        self.session = Some(ExcavationSession {
            target: block,
            face: aim.face,
            aim_point: aim.point,
            orientation,
            progress: AttemptProgress::new(now),
            last_aim: now,
            last_swing: now,
            done: Some(done),
        });
        Ok(Some(ticket))
    }

    /// Stops the active session, if any. Idempotent: a stop on an idle
    /// controller sends nothing and notifies nobody. `now` stamps the
    /// last-stop moment.
    pub fn stop(&mut self, now: Instant) {
        self.abort_active(CANCEL_FACE_NEUTRAL, now);
    }

    /// Feeds one block-change notification.
    ///
    /// Only a transition to air on the session's own target position
    /// completes the session; spurious non-air updates, changes at other
    /// positions, and world-unload `(None, None)` pairs are ignored.
    pub fn on_block_change(
        &mut self,
        pos: BlockPos,
        _old: Option<&Block>,
        new: Option<&Block>,
        now: Instant,
    ) {
        let is_target = self
            .session
            .as_ref()
            .is_some_and(|s| s.target.position == pos);
        if !is_target {
            return;
        }
        let Some(new) = new else {
            // (None, None) signals world unload, not completion.
            return;
        };
        if !new.is_air() {
            // Some servers emit block updates while digging is in progress;
            // only the air transition is authoritative.
            return;
        }
        let Some(mut session) = self.session.take() else {
            return;
        };
        self.last_stop = Some(now);
        if let Some(done) = session.done.take() {
            let _ = done.send(Ok(new.clone()));
        }
        debug!(target = ?pos, restarts = session.progress.restarts(), "dig completed");
        self.events.send(DigEvent::Completed(new.clone()));
    }

    /// Feeds one tick pulse.
    ///
    /// Re-evaluates the completion-time estimate, accumulates progress, and
    /// emits restart or finish packets as required. Also drives the
    /// best-effort re-aim and arm-swing timers, which run on coarser periods
    /// than the tick itself.
    pub fn on_tick(&mut self, now: Instant, world: &dyn WorldView, agent: &AgentSnapshot) {
        let mut failure: Option<TransportError> = None;

        let Some(session) = self.session.as_mut() else {
            return;
        };

        if now.duration_since(session.last_swing) >= SWING_PERIOD {
            session.last_swing = now;
            self.view.swing_arm();
        }
        if session.orientation != OrientationMode::Ignore
            && now.duration_since(session.last_aim) >= REAIM_PERIOD
        {
            session.last_aim = now;
            // Fire-and-forget: if another module moved the view, reacquire
            // the target without escalating.
            if let Err(err) = self.view.look_at(session.aim_point, true) {
                trace!(%err, "re-aim failed, continuing");
            }
        }

        let estimate = world.dig_duration(&session.target, &agent.dig_context());
        match session.progress.advance(now, estimate) {
            ProgressStep::Advancing => {}
            ProgressStep::Restart => {
                let position = session.target.position;
                let face = session.face;
                let mut sent = self
                    .sink
                    .send(DigPacket::cancel(position, CANCEL_FACE_NEUTRAL));
                if sent.is_ok() {
                    sent = self.sink.send(DigPacket::begin(position, face));
                }
                match sent {
                    Ok(()) => {
                        session.progress.reset(now);
                        debug!(?position, restarts = session.progress.restarts(), "dig restarted");
                    }
                    Err(err) => failure = Some(err),
                }
            }
            ProgressStep::Finish => {
                let packet = DigPacket::finish(session.target.position, session.face);
                if let Err(err) = self.sink.send(packet) {
                    failure = Some(err);
                }
            }
        }

        if let Some(err) = failure {
            self.fail_active(err, now);
        }
    }

    /// Handles the owning agent's death or respawn: force-stops any active
    /// session and drops queued notifications, so nothing outlives the
    /// agent's lifecycle.
    pub fn on_agent_reset(&mut self, now: Instant) {
        self.stop(now);
        self.events.clear();
    }

    /// Current controller state.
    pub fn state(&self) -> DigState {
        match &self.session {
            None => DigState::Idle,
            Some(s) if s.progress.finishing() => DigState::Finishing,
            Some(_) => DigState::Digging,
        }
    }

    /// The active session's target block, if any.
    pub fn target(&self) -> Option<&Block> {
        self.session.as_ref().map(|s| &s.target)
    }

    /// Forced restarts of the active session. Zero when idle.
    pub fn restarts(&self) -> u32 {
        self.session
            .as_ref()
            .map_or(0, |s| s.progress.restarts())
    }

    /// When the last session ended, if any has.
    pub fn last_stop(&self) -> Option<Instant> {
        self.last_stop
    }

    /// Readable terminal notifications.
    pub fn events(&self) -> &DigEventBuffer {
        &self.events
    }

    /// Mutable access to the notification buffer, for per-frame swapping.
    pub fn events_mut(&mut self) -> &mut DigEventBuffer {
        &mut self.events
    }

    /// Tears down the active session with a cancel packet. The cancel face
    /// is neutral except when a same-position supersede passes the new face.
    fn abort_active(&mut self, cancel_face: u8, now: Instant) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        let position = session.target.position;
        if let Err(err) = self.sink.send(DigPacket::cancel(position, cancel_face)) {
            // The session is ending regardless; nothing left to protect.
            warn!(%err, ?position, "cancel packet lost during teardown");
        }
        self.last_stop = Some(now);
        if let Some(done) = session.done.take() {
            let _ = done.send(Err(DigError::Aborted));
        }
        debug!(?position, face = cancel_face, "dig aborted");
        self.events.send(DigEvent::Aborted(session.target));
    }

    /// Tears down the active session after a mid-session transport failure.
    /// No further packets are attempted: the stream is already broken.
    fn fail_active(&mut self, err: TransportError, now: Instant) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        warn!(%err, target = ?session.target.position, "transport failure ends dig");
        self.last_stop = Some(now);
        if let Some(done) = session.done.take() {
            let _ = done.send(Err(DigError::Transport(err)));
        }
        self.events.send(DigEvent::Aborted(session.target));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::rc::Rc;

    use quarry_core::{BlockId, DigContext, DigDuration, PresentationError, RaycastHit};
    use quarry_protocol::DigStatus;

    use crate::progress::TICK_DURATION;

    // -- mocks --------------------------------------------------------------

    /// Packet recorder with a switchable failure mode.
    #[derive(Clone, Default)]
    struct SharedSink {
        sent: Rc<RefCell<Vec<DigPacket>>>,
        fail: Rc<Cell<bool>>,
    }

    impl PacketSink for SharedSink {
        fn send(&mut self, packet: DigPacket) -> Result<(), TransportError> {
            if self.fail.get() {
                return Err(TransportError::Closed);
            }
            self.sent.borrow_mut().push(packet);
            Ok(())
        }
    }

    /// Records look-at requests and arm swings.
    #[derive(Clone, Default)]
    struct SharedView {
        looks: Rc<RefCell<Vec<(Vec3, bool)>>>,
        swings: Rc<Cell<u32>>,
        fail_looks: Rc<Cell<bool>>,
    }

    impl Presentation for SharedView {
        fn look_at(&mut self, point: Vec3, forced: bool) -> Result<(), PresentationError> {
            if self.fail_looks.get() {
                return Err(PresentationError::ViewpointBusy);
            }
            self.looks.borrow_mut().push((point, forced));
            Ok(())
        }

        fn swing_arm(&mut self) {
            self.swings.set(self.swings.get() + 1);
        }
    }

    struct TestWorld {
        blocks: HashMap<BlockPos, Block>,
        duration: DigDuration,
    }

    impl TestWorld {
        fn new() -> Self {
            Self {
                blocks: HashMap::new(),
                duration: DigDuration::Finite(Duration::from_secs(1)),
            }
        }

        fn stone(&mut self, x: i32, y: i32, z: i32) -> BlockPos {
            let pos = BlockPos::new(x, y, z);
            self.blocks.insert(
                pos,
                Block {
                    id: BlockId::STONE,
                    position: pos,
                    diggable: true,
                    has_collision: true,
                },
            );
            pos
        }
    }

    impl WorldView for TestWorld {
        fn block_at(&self, pos: BlockPos) -> Option<Block> {
            self.blocks.get(&pos).cloned()
        }

        fn raycast(&self, _origin: Vec3, _dir: Vec3, _max: f32) -> Option<RaycastHit> {
            None
        }

        fn dig_duration(&self, _block: &Block, _ctx: &DigContext) -> DigDuration {
            self.duration
        }
    }

    fn agent_at(eye: Vec3) -> AgentSnapshot {
        AgentSnapshot {
            position: eye,
            eye_height: 0.0,
            submerged: false,
            on_ground: true,
            held_item: None,
            headgear: None,
            effects: Vec::new(),
            creative: false,
        }
    }

    fn air_at(pos: BlockPos) -> Block {
        Block {
            id: BlockId::AIR,
            position: pos,
            diggable: false,
            has_collision: false,
        }
    }

    fn setup() -> (
        DigController<SharedSink, SharedView>,
        SharedSink,
        SharedView,
        TestWorld,
        AgentSnapshot,
        BlockPos,
        Instant,
    ) {
        let sink = SharedSink::default();
        let view = SharedView::default();
        let controller = DigController::new(sink.clone(), view.clone());
        let mut world = TestWorld::new();
        let target = world.stone(2, 0, 0);
        let agent = agent_at(Vec3::new(0.5, 0.5, 0.5));
        (controller, sink, view, world, agent, target, Instant::now())
    }

    fn statuses(sink: &SharedSink) -> Vec<DigStatus> {
        sink.sent.borrow().iter().map(|p| p.status).collect()
    }

    // -- start --------------------------------------------------------------

    #[test]
    fn test_start_emits_begin_and_creates_session() {
        let (mut ctrl, sink, view, world, agent, target, t0) = setup();
        let ticket = ctrl
            .start(&world, &agent, target, OrientationMode::Forced, AimHint::Auto, t0)
            .unwrap();
        assert!(ticket.is_some());

        let sent = sink.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], DigPacket::begin(target, BlockFace::Top));
        assert_eq!(ctrl.state(), DigState::Digging);

        // Initial aim and swing fired.
        assert_eq!(
            view.looks.borrow().as_slice(),
            &[(Vec3::new(2.5, 0.5, 0.5), true)]
        );
        assert_eq!(view.swings.get(), 1);
    }

    #[test]
    fn test_start_missing_block_is_invalid_target() {
        let (mut ctrl, sink, _view, world, agent, _target, t0) = setup();
        let err = ctrl
            .start(
                &world,
                &agent,
                BlockPos::new(9, 9, 9),
                OrientationMode::Forced,
                AimHint::Auto,
                t0,
            )
            .unwrap_err();
        assert_eq!(err, DigError::InvalidTarget);
        assert!(sink.sent.borrow().is_empty());
        assert_eq!(ctrl.state(), DigState::Idle);
    }

    #[test]
    fn test_start_beyond_reach_is_benign_noop() {
        let (mut ctrl, sink, _view, world, _agent, target, t0) = setup();
        let far_agent = agent_at(Vec3::new(10.0, 0.5, 0.5));
        let ticket = ctrl
            .start(&world, &far_agent, target, OrientationMode::Forced, AimHint::Auto, t0)
            .unwrap();
        assert!(ticket.is_none());
        assert!(sink.sent.borrow().is_empty());
        assert_eq!(ctrl.state(), DigState::Idle);
    }

    #[test]
    fn test_start_propagates_block_not_in_view() {
        // A solid block whose probe rays all miss (this world's raycast
        // returns nothing) has no reachable face.
        let (mut ctrl, sink, _view, world, agent, target, t0) = setup();
        let err = ctrl
            .start(&world, &agent, target, OrientationMode::Forced, AimHint::Probe, t0)
            .unwrap_err();
        assert_eq!(err, DigError::BlockNotInView);
        assert!(sink.sent.borrow().is_empty());
    }

    #[test]
    fn test_begin_send_failure_creates_no_session() {
        let (mut ctrl, sink, _view, world, agent, target, t0) = setup();
        sink.fail.set(true);
        let err = ctrl
            .start(&world, &agent, target, OrientationMode::Forced, AimHint::Auto, t0)
            .unwrap_err();
        assert_eq!(err, DigError::Transport(TransportError::Closed));
        assert_eq!(ctrl.state(), DigState::Idle);
    }

    // -- stop / supersede ---------------------------------------------------

    #[test]
    fn test_stop_on_idle_controller_is_noop() {
        let (mut ctrl, sink, _view, _world, _agent, _target, t0) = setup();
        ctrl.stop(t0);
        assert!(sink.sent.borrow().is_empty());
        assert!(ctrl.events().is_empty());
        assert!(ctrl.last_stop().is_none());
    }

    #[tokio::test]
    async fn test_external_stop_cancels_with_neutral_face() {
        let (mut ctrl, sink, _view, world, agent, target, t0) = setup();
        let ticket = ctrl
            .start(&world, &agent, target, OrientationMode::Forced, AimHint::Auto, t0)
            .unwrap()
            .unwrap();

        ctrl.stop(t0 + TICK_DURATION);

        let sent = sink.sent.borrow();
        assert_eq!(sent[1], DigPacket::cancel(target, CANCEL_FACE_NEUTRAL));
        assert_eq!(ctrl.state(), DigState::Idle);
        assert_eq!(ctrl.last_stop(), Some(t0 + TICK_DURATION));

        let events: Vec<_> = ctrl.events().read().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], DigEvent::Aborted(b) if b.position == target));

        assert_eq!(ticket.wait().await, Err(DigError::Aborted));
    }

    #[tokio::test]
    async fn test_cancel_send_failure_during_stop_still_clears_session() {
        let (mut ctrl, sink, _view, world, agent, target, t0) = setup();
        let ticket = ctrl
            .start(&world, &agent, target, OrientationMode::Forced, AimHint::Auto, t0)
            .unwrap()
            .unwrap();

        // The wire drops just before the cancel goes out; the teardown must
        // not depend on it.
        sink.fail.set(true);
        ctrl.stop(t0 + TICK_DURATION);

        assert_eq!(ctrl.state(), DigState::Idle);
        assert_eq!(ctrl.last_stop(), Some(t0 + TICK_DURATION));
        assert_eq!(statuses(&sink), vec![DigStatus::Begin], "cancel never left");

        let events: Vec<_> = ctrl.events().read().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], DigEvent::Aborted(b) if b.position == target));

        assert_eq!(ticket.wait().await, Err(DigError::Aborted));
    }

    #[tokio::test]
    async fn test_same_position_supersede_reuses_new_face() {
        let (mut ctrl, sink, _view, world, agent, target, t0) = setup();
        let first = ctrl
            .start(&world, &agent, target, OrientationMode::Forced, AimHint::Auto, t0)
            .unwrap()
            .unwrap();

        // Same position, explicit west hint this time.
        let second = ctrl
            .start(
                &world,
                &agent,
                target,
                OrientationMode::Forced,
                AimHint::Toward(-Vec3::X),
                t0 + TICK_DURATION,
            )
            .unwrap();
        assert!(second.is_some());

        let sent = sink.sent.borrow();
        assert_eq!(sent[0], DigPacket::begin(target, BlockFace::Top));
        // Server quirk: the cancel names the replacing request's face.
        assert_eq!(sent[1], DigPacket::cancel(target, BlockFace::West.wire()));
        assert_eq!(sent[2], DigPacket::begin(target, BlockFace::West));

        assert_eq!(first.wait().await, Err(DigError::Aborted));
        assert_eq!(ctrl.state(), DigState::Digging);
    }

    #[test]
    fn test_other_position_supersede_uses_neutral_face() {
        let (mut ctrl, sink, _view, mut world, agent, target, t0) = setup();
        let other = world.stone(0, 2, 0);
        ctrl.start(&world, &agent, target, OrientationMode::Forced, AimHint::Auto, t0)
            .unwrap();
        ctrl.start(&world, &agent, other, OrientationMode::Forced, AimHint::Auto, t0)
            .unwrap();

        let sent = sink.sent.borrow();
        assert_eq!(sent[1], DigPacket::cancel(target, CANCEL_FACE_NEUTRAL));
        assert_eq!(sent[2], DigPacket::begin(other, BlockFace::Top));
    }

    // -- ticking ------------------------------------------------------------

    #[test]
    fn test_tick_on_idle_controller_is_noop() {
        let (mut ctrl, sink, _view, world, agent, _target, t0) = setup();
        ctrl.on_tick(t0 + TICK_DURATION, &world, &agent);
        assert!(sink.sent.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_scenario_twenty_ticks_then_finish_until_air() {
        let (mut ctrl, sink, _view, world, agent, target, t0) = setup();
        let ticket = ctrl
            .start(&world, &agent, target, OrientationMode::Forced, AimHint::Auto, t0)
            .unwrap()
            .unwrap();

        // Estimate 1000ms, tick 50ms: progress reaches 1 on the 20th tick.
        for tick in 1..20u32 {
            ctrl.on_tick(t0 + TICK_DURATION * tick, &world, &agent);
            assert_eq!(ctrl.state(), DigState::Digging, "tick {tick}");
        }
        assert_eq!(statuses(&sink), vec![DigStatus::Begin]);

        for tick in 20..=23u32 {
            ctrl.on_tick(t0 + TICK_DURATION * tick, &world, &agent);
            assert_eq!(ctrl.state(), DigState::Finishing);
        }
        // Finish resends on every tick past completion.
        assert_eq!(
            statuses(&sink),
            vec![
                DigStatus::Begin,
                DigStatus::Finish,
                DigStatus::Finish,
                DigStatus::Finish,
                DigStatus::Finish,
            ]
        );

        // The air update is authoritative: exactly one completion.
        let air = air_at(target);
        ctrl.on_block_change(target, None, Some(&air), t0 + TICK_DURATION * 24);
        assert_eq!(ctrl.state(), DigState::Idle);
        assert_eq!(ctrl.last_stop(), Some(t0 + TICK_DURATION * 24));
        let events: Vec<_> = ctrl.events().read().collect();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], DigEvent::Completed(b) if b.is_air()));

        // Duplicate air updates after completion change nothing.
        ctrl.on_block_change(target, None, Some(&air), t0 + TICK_DURATION * 25);
        assert_eq!(ctrl.events().len(), 1);

        assert_eq!(ticket.wait().await.unwrap().position, target);
    }

    #[test]
    fn test_infeasible_estimate_restarts_with_cancel_begin_pair() {
        let (mut ctrl, sink, _view, mut world, agent, target, t0) = setup();
        ctrl.start(&world, &agent, target, OrientationMode::Forced, AimHint::Auto, t0)
            .unwrap();

        world.duration = DigDuration::Infeasible;
        ctrl.on_tick(t0 + TICK_DURATION, &world, &agent);

        let sent = sink.sent.borrow();
        assert_eq!(sent[1], DigPacket::cancel(target, CANCEL_FACE_NEUTRAL));
        assert_eq!(sent[2], DigPacket::begin(target, BlockFace::Top));
        assert_eq!(ctrl.restarts(), 1);
        assert_eq!(ctrl.state(), DigState::Digging, "restart keeps the session");
        assert!(ctrl.events().is_empty(), "restart never notifies the caller");
    }

    #[test]
    fn test_stall_past_deadline_restarts_and_resets_progress() {
        let (mut ctrl, sink, _view, mut world, agent, target, t0) = setup();
        world.duration = DigDuration::Finite(Duration::from_millis(100));
        ctrl.start(&world, &agent, target, OrientationMode::Forced, AimHint::Auto, t0)
            .unwrap();

        // Deadline is 2*100ms + 150ms = 350ms; a tick at 400ms stalls.
        ctrl.on_tick(t0 + Duration::from_millis(400), &world, &agent);
        assert_eq!(
            statuses(&sink),
            vec![DigStatus::Begin, DigStatus::Cancel, DigStatus::Begin]
        );
        assert_eq!(ctrl.restarts(), 1);

        // Fresh attempt clock: the next tick accumulates normally.
        ctrl.on_tick(t0 + Duration::from_millis(450), &world, &agent);
        assert_eq!(ctrl.restarts(), 1);
        assert_eq!(ctrl.state(), DigState::Digging);
    }

    #[tokio::test]
    async fn test_transport_failure_mid_session_aborts() {
        let (mut ctrl, sink, _view, world, agent, target, t0) = setup();
        let ticket = ctrl
            .start(&world, &agent, target, OrientationMode::Forced, AimHint::Auto, t0)
            .unwrap()
            .unwrap();

        // Reach finishing, then break the transport under the finish resend.
        for tick in 1..=20u32 {
            ctrl.on_tick(t0 + TICK_DURATION * tick, &world, &agent);
        }
        sink.fail.set(true);
        ctrl.on_tick(t0 + TICK_DURATION * 21, &world, &agent);

        assert_eq!(ctrl.state(), DigState::Idle);
        let events: Vec<_> = ctrl.events().read().collect();
        assert!(matches!(events[0], DigEvent::Aborted(_)));
        assert_eq!(
            ticket.wait().await,
            Err(DigError::Transport(TransportError::Closed))
        );
    }

    // -- block-change filtering ---------------------------------------------

    #[test]
    fn test_non_air_update_on_target_is_ignored() {
        let (mut ctrl, _sink, _view, world, agent, target, t0) = setup();
        ctrl.start(&world, &agent, target, OrientationMode::Forced, AimHint::Auto, t0)
            .unwrap();

        let still_stone = world.block_at(target).unwrap();
        ctrl.on_block_change(target, None, Some(&still_stone), t0 + TICK_DURATION);
        assert_eq!(ctrl.state(), DigState::Digging);
        assert!(ctrl.events().is_empty());
    }

    #[test]
    fn test_world_unload_pair_is_noop() {
        let (mut ctrl, _sink, _view, world, agent, target, t0) = setup();
        ctrl.start(&world, &agent, target, OrientationMode::Forced, AimHint::Auto, t0)
            .unwrap();

        ctrl.on_block_change(target, None, None, t0 + TICK_DURATION);
        assert_eq!(ctrl.state(), DigState::Digging);
        assert!(ctrl.events().is_empty());
    }

    #[test]
    fn test_update_at_other_position_is_ignored() {
        let (mut ctrl, _sink, _view, world, agent, target, t0) = setup();
        ctrl.start(&world, &agent, target, OrientationMode::Forced, AimHint::Auto, t0)
            .unwrap();

        let elsewhere = BlockPos::new(0, 5, 0);
        ctrl.on_block_change(elsewhere, None, Some(&air_at(elsewhere)), t0 + TICK_DURATION);
        assert_eq!(ctrl.state(), DigState::Digging);
        assert!(ctrl.events().is_empty());
    }

    // -- cosmetic timers ----------------------------------------------------

    #[test]
    fn test_swing_replays_on_its_own_period() {
        let (mut ctrl, _sink, view, world, agent, target, t0) = setup();
        ctrl.start(&world, &agent, target, OrientationMode::Forced, AimHint::Auto, t0)
            .unwrap();
        assert_eq!(view.swings.get(), 1, "one swing at start");

        for tick in 1..=7u32 {
            ctrl.on_tick(t0 + TICK_DURATION * tick, &world, &agent);
        }
        // 350ms elapsed on the 7th tick: exactly one replay.
        assert_eq!(view.swings.get(), 2);
    }

    #[test]
    fn test_reaim_repeats_toward_aim_point() {
        let (mut ctrl, _sink, view, world, agent, target, t0) = setup();
        ctrl.start(&world, &agent, target, OrientationMode::Smooth, AimHint::Auto, t0)
            .unwrap();

        for tick in 1..=3u32 {
            ctrl.on_tick(t0 + TICK_DURATION * tick, &world, &agent);
        }
        let looks = view.looks.borrow();
        // Initial smooth look, then a forced re-aim at the 150ms mark.
        assert_eq!(looks.len(), 2);
        assert_eq!(looks[0], (Vec3::new(2.5, 0.5, 0.5), false));
        assert_eq!(looks[1], (Vec3::new(2.5, 0.5, 0.5), true));
    }

    #[test]
    fn test_reaim_failure_never_ends_the_session() {
        let (mut ctrl, _sink, view, world, agent, target, t0) = setup();
        ctrl.start(&world, &agent, target, OrientationMode::Forced, AimHint::Auto, t0)
            .unwrap();

        view.fail_looks.set(true);
        for tick in 1..=10u32 {
            ctrl.on_tick(t0 + TICK_DURATION * tick, &world, &agent);
        }
        assert_eq!(ctrl.state(), DigState::Digging);
    }

    #[test]
    fn test_ignore_mode_never_touches_the_viewpoint() {
        let (mut ctrl, sink, view, world, agent, target, t0) = setup();
        ctrl.start(&world, &agent, target, OrientationMode::Ignore, AimHint::Probe, t0)
            .unwrap();

        for tick in 1..=10u32 {
            ctrl.on_tick(t0 + TICK_DURATION * tick, &world, &agent);
        }
        assert!(view.looks.borrow().is_empty());
        // Face resolution was skipped: the default face went out.
        assert_eq!(
            sink.sent.borrow()[0],
            DigPacket::begin(target, BlockFace::Top)
        );
        // Swings are protocol-independent and still play.
        assert!(view.swings.get() >= 1);
    }

    // -- lifecycle ----------------------------------------------------------

    #[test]
    fn test_agent_reset_clears_session_and_events() {
        let (mut ctrl, sink, _view, world, agent, target, t0) = setup();
        ctrl.start(&world, &agent, target, OrientationMode::Forced, AimHint::Auto, t0)
            .unwrap();

        ctrl.on_agent_reset(t0 + TICK_DURATION);

        assert_eq!(ctrl.state(), DigState::Idle);
        assert!(ctrl.events().is_empty(), "queued notifications are dropped");
        // The force-stop still cancelled cleanly on the wire.
        assert_eq!(
            statuses(&sink),
            vec![DigStatus::Begin, DigStatus::Cancel]
        );
    }

    #[tokio::test]
    async fn test_dropped_controller_rejects_outstanding_ticket() {
        let (mut ctrl, _sink, _view, world, agent, target, t0) = setup();
        let ticket = ctrl
            .start(&world, &agent, target, OrientationMode::Forced, AimHint::Auto, t0)
            .unwrap()
            .unwrap();
        drop(ctrl);
        assert_eq!(ticket.wait().await, Err(DigError::Aborted));
    }

    #[test]
    fn test_can_dig_boundary() {
        let agent = agent_at(Vec3::new(0.5, 0.5, 0.5));
        let near = Block {
            id: BlockId::STONE,
            position: BlockPos::new(5, 0, 0),
            diggable: true,
            has_collision: true,
        };
        // Center (5.5, 0.5, 0.5) is 5.0 away: inside the 5.1 probe reach.
        assert!(can_dig(&near, &agent));

        let far = Block {
            position: BlockPos::new(6, 0, 0),
            ..near.clone()
        };
        // Center (6.5, 0.5, 0.5) is 6.0 away.
        assert!(!can_dig(&far, &agent));

        let undiggable = Block {
            diggable: false,
            ..near
        };
        assert!(!can_dig(&undiggable, &agent));
    }
}
