/// Block transition rules and cell invariants, truth-table driven.
///
/// Pure functions: these encode "what is legal" without performing the
/// mutation. `GridModel::set_block` is the only caller that acts on them.
///
/// ## Transition Truth Table
///
/// ┌───────────────────────────┬───────────────────┬──────────────────────────────┐
/// │ From                       │ To                │ Rule                         │
/// ├───────────────────────────┼───────────────────┼──────────────────────────────┤
/// │ switch                     │ switchPressed     │ PlayerPress                  │
/// │ switchPressed              │ switch            │ PlayerRelease                │
/// │ switch                     │ movable/fallable  │ ObjectOnSwitch (inherits id) │
/// │ movable/fallable + switch  │ switch            │ ObjectOffSwitch              │
/// │ switchingOff               │ switchingOn       │ SwitchOn                     │
/// │ switchingOn                │ switchingOff      │ SwitchOff                    │
/// │ empty                      │ solid/mov/fall    │ Place                        │
/// │ anything                   │ empty             │ Remove                       │
/// │ identical cell             │ identical cell    │ Unchanged                    │
/// │ Otherwise                  │                   │ Denied                       │
/// └───────────────────────────┴───────────────────┴──────────────────────────────┘
///
/// ## Cell Invariants
///
///   - object kinds (movable, fallable) carry an object id; nothing else does
///   - switch-family kinds carry a switch id
///   - only object kinds and switch-family kinds may carry a switch id

use thiserror::Error;

use super::cell::{BlockKind, Cell};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Transition {
    Unchanged,
    PlayerPress,
    PlayerRelease,
    ObjectOnSwitch,
    ObjectOffSwitch,
    SwitchOn,
    SwitchOff,
    Place,
    Remove,
    Denied,
}

impl Transition {
    pub fn is_allowed(self) -> bool {
        self != Transition::Denied
    }
}

/// A cell value that can never legally exist.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InvariantError {
    #[error("{kind:?} cell is missing its object id")]
    MissingObjectId { kind: BlockKind },
    #[error("{kind:?} cell must not carry object id {object_id}")]
    StrayObjectId { kind: BlockKind, object_id: u32 },
    #[error("{kind:?} cell is missing its switch id")]
    MissingSwitchId { kind: BlockKind },
    #[error("{kind:?} cell must not carry switch id {switch_id}")]
    StraySwitchId { kind: BlockKind, switch_id: u32 },
}

/// Check the id-presence invariants of a single cell value.
pub fn validate(cell: &Cell) -> Result<(), InvariantError> {
    let kind = cell.kind;
    match (kind.is_object(), cell.object_id) {
        (true, None) => return Err(InvariantError::MissingObjectId { kind }),
        (false, Some(object_id)) => return Err(InvariantError::StrayObjectId { kind, object_id }),
        _ => {}
    }
    if kind.is_switch_family() && cell.switch_id.is_none() {
        return Err(InvariantError::MissingSwitchId { kind });
    }
    if let Some(switch_id) = cell.switch_id {
        if !kind.is_switch_family() && !kind.is_object() {
            return Err(InvariantError::StraySwitchId { kind, switch_id });
        }
    }
    Ok(())
}

/// Classify a `from → to` change. See truth table above.
pub fn classify(from: &Cell, to: &Cell) -> Transition {
    use BlockKind::*;

    if from == to {
        return Transition::Unchanged;
    }
    match (from.kind, to.kind) {
        (_, Empty) => Transition::Remove,
        (Switch, SwitchPressed) => Transition::PlayerPress,
        (SwitchPressed, Switch) => Transition::PlayerRelease,
        (Switch, Movable | Fallable) => Transition::ObjectOnSwitch,
        (Movable | Fallable, Switch) if from.switch_id.is_some() => Transition::ObjectOffSwitch,
        (SwitchingOff, SwitchingOn) => Transition::SwitchOn,
        (SwitchingOn, SwitchingOff) => Transition::SwitchOff,
        (Empty, Solid | Movable | Fallable) if to.switch_id.is_none() => Transition::Place,
        _ => Transition::Denied,
    }
}
