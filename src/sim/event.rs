/// Events emitted during a simulation step.
/// The presentation layer consumes these for the status line and effects.

use crate::domain::cell::{ObjectId, SwitchId};

#[derive(Clone, Debug, PartialEq)]
pub enum GameEvent {
    SwitchPressed { id: SwitchId, x: usize, y: usize },
    SwitchReleased { id: SwitchId, x: usize, y: usize },
    BlockLanded { x: usize, y: usize },
    ObjectPushed { object_id: ObjectId, dx: i32 },
    Respawned,
    Goal,
    SpikeDeath,
    /// Illegal transitions rejected by the grid this step.
    TransitionRejected { count: usize },
}
