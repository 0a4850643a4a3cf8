//! The viewpoint/presentation collaborator seam.
//!
//! Orientation steering and arm swings are best-effort side effects: the
//! excavation core issues them and swallows failures, so a competing
//! viewpoint request elsewhere never aborts a dig.

/// Failure from the orientation subsystem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PresentationError {
    /// Another module currently owns the viewpoint.
    #[error("viewpoint is controlled by another module")]
    ViewpointBusy,
    /// The presentation layer is not available (headless agent).
    #[error("presentation subsystem unavailable")]
    Unavailable,
}

/// Best-effort presentation outputs.
pub trait Presentation {
    /// Asks the orientation subsystem to track `point`. `forced` requests an
    /// immediate snap rather than a smooth turn.
    fn look_at(&mut self, point: glam::Vec3, forced: bool) -> Result<(), PresentationError>;

    /// Plays the visible arm-swing animation. Purely cosmetic.
    fn swing_arm(&mut self);
}
