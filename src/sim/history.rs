/// Linear undo/redo over snapshots, plus a one-slot stash.
///
/// ## Layout
///
///   tree:  [initial, before₁, after₁, before₂, after₂, ...]
///   index: always even; points at the materialized checkpoint
///
/// Checkpoints are appended in before/after pairs, so stepping by two
/// moves between consecutive "after" states.
///
/// ## Stash
///
/// Undoing from the newest checkpoint first saves the live state, so
/// progress made since that checkpoint (walking, falling blocks) can be
/// recovered by a redo once the tree has nothing further ahead.

use crate::sim::grid::GridError;
use crate::sim::state::Snapshot;

/// Something a snapshot can be taken from and restored into.
pub trait Restorable {
    fn capture(&self) -> Snapshot;
    fn restore(&mut self, snapshot: &Snapshot) -> Result<(), GridError>;
    /// Goal reached or player dead.
    fn run_over(&self) -> bool;
}

#[derive(Clone, Debug)]
pub struct HistoryManager {
    tree: Vec<Snapshot>,
    index: usize,
    stash: Option<Snapshot>,
}

impl HistoryManager {
    pub fn new(initial: Snapshot) -> Self {
        HistoryManager { tree: vec![initial], index: 0, stash: None }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn has_stash(&self) -> bool {
        self.stash.is_some()
    }

    #[cfg(test)]
    pub fn snapshot(&self, i: usize) -> Option<&Snapshot> {
        self.tree.get(i)
    }

    fn at_latest(&self) -> bool {
        self.index + 1 == self.tree.len()
    }

    /// Append a before/after pair for one discrete action.
    /// Anything beyond `index` (an undone future) is discarded first.
    pub fn record(&mut self, before: Snapshot, after: Snapshot) {
        if !self.at_latest() {
            log::debug!("history: pruning {} undone snapshots", self.tree.len() - self.index - 1);
        }
        self.tree.truncate(self.index + 1);
        self.tree.push(before);
        self.tree.push(after);
        self.index = self.tree.len() - 1;
        self.stash = None;
    }

    /// Step back one checkpoint (clamped at the initial state).
    /// Returns false if nothing changed.
    pub fn undo<R: Restorable + ?Sized>(&mut self, target: &mut R) -> Result<bool, GridError> {
        let live = target.capture();
        let on_checkpoint = live == self.tree[self.index];
        // Sitting exactly on the checkpoint: keep any older stash.
        if self.at_latest() && !target.run_over() && !on_checkpoint {
            self.stash = Some(live);
        }
        let prev = self.index.saturating_sub(2);
        if prev == self.index && on_checkpoint {
            return Ok(false);
        }
        self.index = prev;
        target.restore(&self.tree[self.index])?;
        log::debug!("history: undo to {}/{}", self.index, self.tree.len());
        Ok(true)
    }

    /// Step forward one checkpoint, or return to the stashed live state.
    /// Returns false if there was nothing to redo.
    pub fn redo<R: Restorable + ?Sized>(&mut self, target: &mut R) -> Result<bool, GridError> {
        if self.index + 2 < self.tree.len() {
            self.index += 2;
            target.restore(&self.tree[self.index])?;
            log::debug!("history: redo to {}/{}", self.index, self.tree.len());
            return Ok(true);
        }
        match self.stash.take() {
            Some(stash) => {
                target.restore(&stash)?;
                log::debug!("history: returned to stashed state");
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cell::{BlockKind, Cell};
    use crate::domain::entity::PlayerPose;
    use crate::sim::state::GameState;
    use proptest::prelude::*;

    /// Bare restore target: the live state is just a snapshot.
    struct Live {
        snap: Snapshot,
        restores: usize,
    }

    impl Restorable for Live {
        fn capture(&self) -> Snapshot {
            self.snap.clone()
        }
        fn restore(&mut self, snapshot: &Snapshot) -> Result<(), GridError> {
            self.snap = snapshot.clone();
            self.restores += 1;
            Ok(())
        }
        fn run_over(&self) -> bool {
            self.snap.state.run_over()
        }
    }

    fn snap(usage: u32, x: f32) -> Snapshot {
        Snapshot {
            state: GameState {
                cells: vec![vec![Cell::EMPTY, Cell::movable(10)]],
                usage,
                ..GameState::default()
            },
            player: PlayerPose { x, ..PlayerPose::default() },
        }
    }

    fn live(s: Snapshot) -> Live {
        Live { snap: s, restores: 0 }
    }

    #[test]
    fn index_stays_even() {
        let mut h = HistoryManager::new(snap(0, 0.0));
        for i in 1..5 {
            h.record(snap(i, 1.0), snap(i, 2.0));
            assert_eq!(h.index() % 2, 0);
        }
        assert_eq!(h.len(), 9);
        assert_eq!(h.index(), 8);
    }

    #[test]
    fn undo_then_redo_round_trips() {
        let mut h = HistoryManager::new(snap(0, 0.0));
        h.record(snap(0, 5.0), snap(1, 6.0));
        let mut l = live(snap(1, 6.0));
        let before_undo = l.capture();

        assert!(h.undo(&mut l).unwrap());
        assert_eq!(l.snap, snap(0, 0.0));
        assert!(h.redo(&mut l).unwrap());
        assert_eq!(l.snap, before_undo);
        assert_eq!(h.index(), 2);
    }

    #[test]
    fn redo_consumes_stash_when_nothing_ahead() {
        let mut h = HistoryManager::new(snap(0, 0.0));
        // Walked somewhere without any checkpoint.
        let mut l = live(snap(0, 99.0));

        assert!(h.undo(&mut l).unwrap());
        assert_eq!(l.snap, snap(0, 0.0));
        assert!(h.has_stash());
        assert_eq!(h.index(), 0);

        assert!(h.redo(&mut l).unwrap());
        assert_eq!(l.snap.player.x, 99.0);
        assert!(!h.has_stash());
        assert_eq!(h.index(), 0);

        // Nothing left.
        assert!(!h.redo(&mut l).unwrap());
    }

    #[test]
    fn stash_is_skipped_when_run_is_over() {
        let mut h = HistoryManager::new(snap(0, 0.0));
        h.record(snap(0, 1.0), snap(1, 2.0));
        let mut dead = snap(1, 3.0);
        dead.state.gameover = true;
        let mut l = live(dead);

        assert!(h.undo(&mut l).unwrap());
        assert!(!h.has_stash());
        assert!(h.redo(&mut l).unwrap());
        assert_eq!(l.snap, snap(1, 2.0));
        assert!(!h.redo(&mut l).unwrap());
    }

    #[test]
    fn undo_at_start_without_progress_is_noop() {
        let mut h = HistoryManager::new(snap(0, 0.0));
        let mut l = live(snap(0, 0.0));
        assert!(!h.undo(&mut l).unwrap());
        assert!(!h.redo(&mut l).unwrap());
        assert_eq!(l.snap, snap(0, 0.0));
        assert_eq!(l.restores, 0);
        assert_eq!(h.index(), 0);
    }

    #[test]
    fn repeated_undo_keeps_the_first_stash() {
        let mut h = HistoryManager::new(snap(0, 0.0));
        h.record(snap(0, 1.0), snap(1, 2.0));
        let mut l = live(snap(1, 50.0));
        h.undo(&mut l).unwrap();
        h.redo(&mut l).unwrap(); // back on the checkpoint, stash kept
        assert_eq!(l.snap, snap(1, 2.0));
        h.undo(&mut l).unwrap();
        h.redo(&mut l).unwrap();
        assert!(h.redo(&mut l).unwrap());
        assert_eq!(l.snap.player.x, 50.0);
    }

    #[test]
    fn record_after_undo_truncates_the_future() {
        let mut h = HistoryManager::new(snap(0, 0.0));
        h.record(snap(0, 1.0), snap(1, 2.0));
        h.record(snap(1, 3.0), snap(2, 4.0));
        assert_eq!(h.len(), 5);

        let mut l = live(snap(2, 4.0));
        h.undo(&mut l).unwrap();
        h.undo(&mut l).unwrap();
        assert_eq!(h.index(), 0);

        h.record(snap(0, 7.0), snap(1, 8.0));
        assert_eq!(h.len(), 3);
        assert_eq!(h.index(), 2);
        assert!(!h.has_stash());
        assert_eq!(h.snapshot(2), Some(&snap(1, 8.0)));
        assert!(!h.redo(&mut l).unwrap());
    }

    proptest! {
        #[test]
        fn restored_state_is_independent_of_the_store(
            edits in proptest::collection::vec((0usize..2, any::<bool>()), 1..20),
        ) {
            let mut h = HistoryManager::new(snap(0, 0.0));
            h.record(snap(0, 1.0), snap(1, 2.0));
            let stored: Vec<Snapshot> = (0..h.len()).filter_map(|i| h.snapshot(i).cloned()).collect();

            let mut l = live(snap(1, 2.0));
            h.undo(&mut l).unwrap();
            for (x, solid) in edits {
                let kind = if solid { BlockKind::Solid } else { BlockKind::Goal };
                l.snap.state.cells[0][x] = Cell::plain(kind);
                l.snap.state.usage += 1;
                l.snap.player.x += 1.0;
            }
            h.redo(&mut l).unwrap();
            l.snap.state.cells[0][0] = Cell::plain(BlockKind::Spike);

            let after: Vec<Snapshot> = (0..h.len()).filter_map(|i| h.snapshot(i).cloned()).collect();
            prop_assert_eq!(stored, after);
        }
    }
}
