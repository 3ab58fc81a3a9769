/// GameState: the serializable unit of history.
///
/// Everything here is plain data (no shared references, no closures), so
/// `Clone` is a full deep copy and a snapshot survives any later mutation
/// of the live state. Display-only dynamics (fall offsets, player velocity)
/// are deliberately absent: they are reset whenever a snapshot is restored.

use serde::{Deserialize, Serialize};

use crate::domain::cell::{BlockKind, Cell, SwitchId};
use crate::domain::entity::PlayerPose;

/// One switch cell, created at load time.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SwitchState {
    pub id: SwitchId,
    pub x: usize,
    pub y: usize,
    pub pressed_by_player: bool,
    pub pressed_by_block: bool,
}

impl SwitchState {
    pub fn new(id: SwitchId, x: usize, y: usize) -> Self {
        SwitchState { id, x, y, pressed_by_player: false, pressed_by_block: false }
    }

    pub fn pressed(&self) -> bool {
        self.pressed_by_player || self.pressed_by_block
    }
}

/// One switching-block cell, created at load time.
/// Its current phase is read from the grid, never stored here.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SwitchingBlockState {
    pub id: SwitchId,
    pub x: usize,
    pub y: usize,
}

impl SwitchingBlockState {
    /// Phase this block should be in for a given group state.
    pub fn phase_for(&self, group_pressed: bool) -> BlockKind {
        if group_pressed {
            BlockKind::SwitchingOn
        } else {
            BlockKind::SwitchingOff
        }
    }
}

#[derive(Clone, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct GameState {
    pub cells: Vec<Vec<Cell>>,
    pub switches: Vec<SwitchState>,
    pub switching_blocks: Vec<SwitchingBlockState>,
    pub inventory: Option<BlockKind>,
    pub inventory_is_infinite: bool,
    /// Discrete actions taken to reach this state.
    pub usage: u32,
    pub paused: bool,
    pub goaled: bool,
    pub gameover: bool,
}

impl GameState {
    /// Has the run ended (goal reached or player killed)?
    pub fn run_over(&self) -> bool {
        self.goaled || self.gameover
    }
}

/// The unit stored in history: game state plus player pose.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: GameState,
    pub player: PlayerPose,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entity::Facing;

    fn sample() -> Snapshot {
        Snapshot {
            state: GameState {
                cells: vec![
                    vec![Cell::EMPTY, Cell::movable(10), Cell::linked(BlockKind::Switch, 2)],
                    vec![Cell::plain(BlockKind::Solid); 3],
                ],
                switches: vec![SwitchState::new(2, 2, 0)],
                switching_blocks: vec![SwitchingBlockState { id: 2, x: 0, y: 0 }],
                inventory: Some(BlockKind::Fallable),
                inventory_is_infinite: true,
                usage: 4,
                ..GameState::default()
            },
            player: PlayerPose { x: 48.0, y: 17.5, facing: Facing::Left },
        }
    }

    #[test]
    fn snapshot_survives_json_round_trip() {
        let snap = sample();
        let text = serde_json::to_string(&snap).unwrap();
        let back: Snapshot = serde_json::from_str(&text).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn clone_is_independent() {
        let original = sample();
        let mut copy = original.clone();
        copy.state.cells[0][0] = Cell::plain(BlockKind::Solid);
        copy.state.switches[0].pressed_by_block = true;
        copy.player.x = 0.0;
        assert_eq!(original.state.cells[0][0], Cell::EMPTY);
        assert!(!original.state.switches[0].pressed_by_block);
        assert_eq!(original.player.x, 48.0);
    }

    #[test]
    fn phase_follows_group() {
        let block = SwitchingBlockState { id: 0, x: 0, y: 0 };
        assert_eq!(block.phase_for(true), BlockKind::SwitchingOn);
        assert_eq!(block.phase_for(false), BlockKind::SwitchingOff);
    }
}
