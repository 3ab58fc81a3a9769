/// Player body and per-frame input.
///
/// The pose (`x`, `y`, `facing`) is what history snapshots capture.
/// Velocity, ground contact and the jump window are transient and are
/// zeroed whenever a snapshot is restored.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub enum Facing {
    Left,
    #[default]
    Right,
}

/// Horizontal intent for one frame.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Horizontal {
    Left,
    #[default]
    None,
    Right,
}

impl Horizontal {
    pub fn sign(self) -> f32 {
        match self {
            Horizontal::Left => -1.0,
            Horizontal::None => 0.0,
            Horizontal::Right => 1.0,
        }
    }
}

/// Frame input: continuous (held) movement and jump.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameInput {
    pub horizontal: Horizontal,
    pub jump: bool,
}

/// Player pose in pixel coordinates (centre of the body), y grows downward.
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct PlayerPose {
    pub x: f32,
    pub y: f32,
    pub facing: Facing,
}

#[derive(Clone, Debug, Default)]
pub struct Player {
    pub x: f32,
    pub y: f32,
    pub facing: Facing,
    pub vx: f32,
    pub vy: f32,
    pub on_ground: bool,
    pub jump_frames: u32,   // remaining frames of the jump hold window
    pub push_cooldown: u32, // frames until another push is allowed
}

impl Player {
    pub fn new(x: f32, y: f32) -> Self {
        Player { x, y, ..Player::default() }
    }

    pub fn pose(&self) -> PlayerPose {
        PlayerPose { x: self.x, y: self.y, facing: self.facing }
    }

    /// Place the body at a stored pose with all motion cleared.
    pub fn reset_to(&mut self, pose: PlayerPose) {
        *self = Player { x: pose.x, y: pose.y, facing: pose.facing, ..Player::default() };
    }
}
