//! Face resolution: which side of the target block to dig, and where to aim.
//!
//! Three modes: an explicit direction hint, a plain default, and a
//! visibility probe that raycasts toward each candidate face and keeps the
//! closest one actually reachable from the eye.

use glam::Vec3;

use quarry_core::{Block, BlockFace, WorldView};

/// Maximum probe ray length in blocks.
pub const PROBE_RANGE: f32 = 5.0;

/// How the caller wants the dig face chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AimHint {
    /// No preference: aim at the block center, default face.
    Auto,
    /// Dig the face on the hinted side of the block. The dominant axis of
    /// the vector selects the face; a zero vector behaves like [`Auto`].
    ///
    /// [`Auto`]: AimHint::Auto
    Toward(Vec3),
    /// Probe face visibility with raycasts from the eye position.
    Probe,
}

/// A resolved dig face and the exact point to aim at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aim {
    /// The face the dig packets will name.
    pub face: BlockFace,
    /// The point the orientation subsystem is asked to track.
    pub point: Vec3,
}

/// Face resolution failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FaceError {
    /// Every candidate face is obstructed by nearer geometry.
    #[error("no clear face toward the target block")]
    BlockNotInView,
}

/// Axis iteration order is fixed (y, x, z) so probe tie-breaks are
/// reproducible.
#[derive(Debug, Clone, Copy)]
enum Axis {
    Y,
    X,
    Z,
}

impl Axis {
    fn unit(self) -> Vec3 {
        match self {
            Self::Y => Vec3::Y,
            Self::X => Vec3::X,
            Self::Z => Vec3::Z,
        }
    }

    /// The face on the positive or negative side of this axis.
    fn face(self, positive: bool) -> BlockFace {
        match (self, positive) {
            (Self::Y, true) => BlockFace::Top,
            (Self::Y, false) => BlockFace::Bottom,
            (Self::X, true) => BlockFace::East,
            (Self::X, false) => BlockFace::West,
            (Self::Z, true) => BlockFace::South,
            (Self::Z, false) => BlockFace::North,
        }
    }
}

/// Resolves the dig face and aim point for `block`.
///
/// Deterministic for fixed inputs: no randomness, fixed axis order, and
/// first-computed-wins on exact probe distance ties.
///
/// # Errors
///
/// [`FaceError::BlockNotInView`] when probing finds no reachable face.
pub fn resolve_aim(
    block: &Block,
    hint: &AimHint,
    eye: Vec3,
    world: &dyn WorldView,
) -> Result<Aim, FaceError> {
    let center = block.position.center();
    match hint {
        AimHint::Auto => Ok(Aim {
            // Arbitrary fixed default, only used for the initial begin packet.
            face: BlockFace::Top,
            point: center,
        }),
        AimHint::Toward(direction) => Ok(resolve_toward(center, *direction)),
        AimHint::Probe => resolve_probe(block, center, eye, world),
    }
}

/// Explicit-hint mode: dominant axis of the hint picks the face, aim point
/// sits on that face's center.
fn resolve_toward(center: Vec3, direction: Vec3) -> Aim {
    let abs = direction.abs();
    let (axis, component) = if abs.x >= abs.y && abs.x >= abs.z && abs.x > 0.0 {
        (Axis::X, direction.x)
    } else if abs.y >= abs.z && abs.y > 0.0 {
        (Axis::Y, direction.y)
    } else if abs.z > 0.0 {
        (Axis::Z, direction.z)
    } else {
        return Aim {
            face: BlockFace::Top,
            point: center,
        };
    };
    let positive = component > 0.0;
    let side = if positive { 0.5 } else { -0.5 };
    Aim {
        face: axis.face(positive),
        point: center + axis.unit() * side,
    }
}

/// Visibility-probe mode.
///
/// An axis is a candidate only if the eye sits more than half a block away
/// along it (closer axes are hidden by the block's own bulk). Each candidate
/// face center is probed with a ray from the eye; a strictly-closer
/// intersection records an obstruction and discards the axis, a hit on the
/// target block itself yields a valid face. The valid face nearest the eye
/// wins.
fn resolve_probe(
    block: &Block,
    center: Vec3,
    eye: Vec3,
    world: &dyn WorldView,
) -> Result<Aim, FaceError> {
    let displacement = eye - center;
    let axes = [
        (Axis::Y, displacement.y),
        (Axis::X, displacement.x),
        (Axis::Z, displacement.z),
    ];

    let mut best: Option<(Aim, f32)> = None;
    let mut saw_obstruction = false;

    for (axis, delta) in axes {
        if delta.abs() <= 0.5 {
            continue;
        }
        let candidate = center + axis.unit() * 0.5 * delta.signum();
        let direction = (candidate - eye).normalize();
        let Some(hit) = world.raycast(eye, direction, PROBE_RANGE) else {
            continue;
        };
        if eye.distance(hit.intersect) < eye.distance(candidate) {
            // Something sits between the eye and this face.
            saw_obstruction = true;
            continue;
        }
        if hit.position != block.position {
            continue;
        }
        let dist_sq = hit.intersect.distance_squared(eye);
        // Strict comparison keeps the first candidate on exact ties.
        if best.as_ref().is_none_or(|(_, d)| dist_sq < *d) {
            best = Some((
                Aim {
                    face: hit.face,
                    point: hit.intersect,
                },
                dist_sq,
            ));
        }
    }

    if let Some((aim, _)) = best {
        return Ok(aim);
    }
    if !saw_obstruction && !block.has_collision {
        // Nothing in the way and the block has no collision geometry (short
        // foliage): dig it by aiming at its center, no guaranteed face.
        return Ok(Aim {
            face: BlockFace::Top,
            point: center,
        });
    }
    Err(FaceError::BlockNotInView)
}
