/// Block kinds and the per-position `Cell` value.
/// Properties are queried via methods, not stored as flags,
/// so block semantics are centralized here.

use serde::{Deserialize, Serialize};

pub type ObjectId = u32;
pub type SwitchId = u32;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    #[default]
    Empty,
    Solid,
    Movable,       // Pushable rigid object
    Fallable,      // Pushable + subject to gravity
    Switch,        // Pressure plate, passable
    SwitchBase,    // Solid base under a switch
    SwitchingOff,  // Switching block, passable phase
    SwitchingOn,   // Switching block, solid phase
    SwitchPressed, // Switch with the player on it
    Goal,
    Spike,
}

impl BlockKind {
    /// Does this kind block the player?
    pub fn is_solid(self) -> bool {
        matches!(
            self,
            BlockKind::Solid
                | BlockKind::Movable
                | BlockKind::Fallable
                | BlockKind::SwitchBase
                | BlockKind::SwitchingOn
        )
    }

    /// Can a falling cell or pushed object move into this kind?
    pub fn is_free(self) -> bool {
        matches!(self, BlockKind::Empty | BlockKind::Switch)
    }

    /// Kinds that carry an object id.
    pub fn is_object(self) -> bool {
        matches!(self, BlockKind::Movable | BlockKind::Fallable)
    }

    /// Kinds whose switch id is fixed to their position at load time.
    pub fn is_switch_family(self) -> bool {
        matches!(
            self,
            BlockKind::Switch
                | BlockKind::SwitchPressed
                | BlockKind::SwitchingOff
                | BlockKind::SwitchingOn
        )
    }

    pub fn is_switching_block(self) -> bool {
        matches!(self, BlockKind::SwitchingOff | BlockKind::SwitchingOn)
    }

    /// Display character for this kind; the stage alphabet letter where one exists.
    pub fn glyph(self) -> char {
        match self {
            BlockKind::Empty => '.',
            BlockKind::Solid => 'b',
            BlockKind::Movable => 'm',
            BlockKind::Fallable => 'f',
            BlockKind::Switch => 's',
            BlockKind::SwitchBase => 'S',
            BlockKind::SwitchingOff => 'w',
            BlockKind::SwitchingOn => '#',
            BlockKind::SwitchPressed => 'p',
            BlockKind::Goal => 'g',
            BlockKind::Spike => '^',
        }
    }
}

/// One grid position: block kind plus linkage ids.
///
/// `object_id` is present iff the kind is an object kind. `switch_id` is
/// present on switch-family kinds, and on objects resting on a switch.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct Cell {
    pub kind: BlockKind,
    pub object_id: Option<ObjectId>,
    pub switch_id: Option<SwitchId>,
}

impl Cell {
    pub const EMPTY: Cell = Cell { kind: BlockKind::Empty, object_id: None, switch_id: None };

    /// A cell with no linkage ids (empty, solid, goal, ...).
    pub fn plain(kind: BlockKind) -> Self {
        Cell { kind, object_id: None, switch_id: None }
    }

    pub fn movable(object_id: ObjectId) -> Self {
        Cell { kind: BlockKind::Movable, object_id: Some(object_id), switch_id: None }
    }

    pub fn fallable(object_id: ObjectId) -> Self {
        Cell { kind: BlockKind::Fallable, object_id: Some(object_id), switch_id: None }
    }

    /// A switch-family cell (switch, pressed switch, switching block).
    pub fn linked(kind: BlockKind, switch_id: SwitchId) -> Self {
        Cell { kind, object_id: None, switch_id: Some(switch_id) }
    }

    /// Same cell, different kind, ids kept.
    pub fn with_kind(self, kind: BlockKind) -> Self {
        Cell { kind, ..self }
    }

    pub fn with_switch(self, switch_id: Option<SwitchId>) -> Self {
        Cell { switch_id, ..self }
    }

    pub fn is_empty(&self) -> bool {
        self.kind == BlockKind::Empty
    }

    /// The cell left behind when this one moves away:
    /// a switch if it was resting on one, otherwise empty.
    pub fn vacated(&self) -> Cell {
        match (self.kind.is_object(), self.switch_id) {
            (true, Some(id)) => Cell::linked(BlockKind::Switch, id),
            _ => Cell::EMPTY,
        }
    }
}
