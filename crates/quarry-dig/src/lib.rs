//! Block-excavation session control: face resolution, tick-driven progress
//! tracking, dig packet sequencing, and completion/abort signaling.

pub mod aim;
pub mod events;
pub mod progress;
pub mod session;

pub use aim::{Aim, AimHint, FaceError, PROBE_RANGE, resolve_aim};
pub use events::{DigEvent, DigEventBuffer, DigTicket};
pub use progress::{AttemptProgress, ProgressStep, STALL_GRACE, TICK_DURATION};
pub use session::{
    CAN_DIG_REACH, DigController, DigError, DigState, MAX_REACH, OrientationMode, REAIM_PERIOD,
    SWING_PERIOD, can_dig,
};
