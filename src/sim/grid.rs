/// GridModel: the authoritative logical grid.
///
/// ## Ownership
///
///   - `state`: the `GameState` (cells + switch registries + run flags).
///     Cells are mutated **only** through `set_block()`, which enforces the
///     transition table in `domain::rules` and keeps the registries in sync.
///   - `motion`: display-only per-cell dynamics (fall speed, sub-cell
///     offset). Not part of `GameState`; reset on every restore.
///   - `render_ops`: queue of visual changes for the presentation layer,
///     drained once per frame. Only block-kind changes are queued here,
///     plus `Offset` entries pushed by the gravity integrator.
///
/// ## Failure tiers
///
///   - Invariant violations (bad ids, out of bounds) → `Err(GridError)`.
///   - Illegal-but-reachable transitions → `Ok(Transition::Denied)` + warning.

use thiserror::Error;

use crate::domain::cell::{BlockKind, Cell, ObjectId, SwitchId};
use crate::domain::physics::BlockQuery;
use crate::domain::rules::{self, InvariantError, Transition};
use super::stage::{kind_from_glyph, StageDefinition};
use super::state::{GameState, SwitchState, SwitchingBlockState};

/// Rejected transitions kept for inspection (HUD, tests).
const MAX_DIAGNOSTICS: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("cell ({x}, {y}): {source}")]
    Invariant { x: usize, y: usize, source: InvariantError },
    #[error("cell ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds { x: usize, y: usize, width: usize, height: usize },
    #[error("cell ({x}, {y}) is fixed to switch {fixed:?}, got {given:?}")]
    SwitchIdChanged { x: usize, y: usize, fixed: Option<SwitchId>, given: Option<SwitchId> },
    #[error("grid is {width}x{height}, replacement is {new_width}x{new_height}")]
    DimensionMismatch { width: usize, height: usize, new_width: usize, new_height: usize },
}

/// Visual change for the rendering collaborator.
#[derive(Clone, Copy, PartialEq, Debug)]
pub enum RenderOp {
    Put { x: usize, y: usize, kind: BlockKind },
    Remove { x: usize, y: usize },
    /// Sub-cell vertical offset of a falling cell, in cells.
    Offset { x: usize, y: usize, dy: f32 },
}

/// Per-cell dynamics of a falling cell.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct CellMotion {
    pub speed: f32,  // cells per frame
    pub offset: f32, // cells below the logical row, in [0, 1)
}

impl CellMotion {
    pub fn is_rest(&self) -> bool {
        self.speed == 0.0 && self.offset == 0.0
    }
}

/// The cells sharing one object id, anchored at (min x, max y).
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MovableObject {
    pub object_id: ObjectId,
    pub origin: (usize, usize),
    /// Offsets from `origin`: dx >= 0, dy <= 0.
    pub offsets: Vec<(i32, i32)>,
}

impl MovableObject {
    /// Absolute positions of every cell of the object.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let (ox, oy) = (self.origin.0 as i32, self.origin.1 as i32);
        self.offsets.iter().map(move |&(dx, dy)| ((ox + dx) as usize, (oy + dy) as usize))
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        self.cells().any(|c| c == (x, y))
    }
}

pub struct GridModel {
    state: GameState,
    width: usize,
    height: usize,
    motion: Vec<Vec<CellMotion>>,
    render_ops: Vec<RenderOp>,
    diagnostics: Vec<String>,
    rejections: usize,
}

// ── Construction ──

impl GridModel {
    /// Build the initial grid from a stage definition.
    pub fn from_stage(def: &StageDefinition) -> Result<Self, GridError> {
        let (width, height) = (def.width, def.height);
        let mut cells = vec![vec![Cell::EMPTY; width]; height];
        let mut switches = vec![];
        let mut switching_blocks = vec![];

        for (y, row) in cells.iter_mut().enumerate() {
            for (x, slot) in row.iter_mut().enumerate() {
                let glyph = def.glyph_at(x, y);
                let kind = kind_from_glyph(glyph).unwrap_or_default();
                let cell = Cell {
                    kind,
                    object_id: if kind.is_object() { def.object_id_at(x, y) } else { None },
                    switch_id: if kind.is_switch_family() { def.switch_id_at(x, y) } else { None },
                };
                rules::validate(&cell).map_err(|source| GridError::Invariant { x, y, source })?;
                if let Some(id) = cell.switch_id {
                    if kind == BlockKind::Switch {
                        switches.push(SwitchState::new(id, x, y));
                    } else {
                        switching_blocks.push(SwitchingBlockState { id, x, y });
                    }
                }
                *slot = cell;
            }
        }

        let mut grid = GridModel {
            state: GameState {
                cells,
                switches,
                switching_blocks,
                inventory: def.inventory,
                inventory_is_infinite: def.inventory_is_infinite,
                ..GameState::default()
            },
            width,
            height,
            motion: vec![vec![CellMotion::default(); width]; height],
            render_ops: vec![],
            diagnostics: vec![],
            rejections: 0,
        };
        grid.publish_all();
        grid.sync_all_switching_blocks()?;
        Ok(grid)
    }
}

// ── Queries ──

impl GridModel {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Block kind at (x, y), or None outside the grid.
    pub fn get_block(&self, x: i32, y: i32) -> Option<BlockKind> {
        self.get_cell(x, y).map(|c| c.kind)
    }

    pub fn get_cell(&self, x: i32, y: i32) -> Option<Cell> {
        if x < 0 || y < 0 {
            return None;
        }
        self.state.cells.get(y as usize).and_then(|r| r.get(x as usize)).copied()
    }

    /// The rigid object containing (x, y). Scans the whole grid:
    /// cell contents are the single source of truth, nothing is cached.
    pub fn get_movable_object(&self, x: usize, y: usize) -> Option<MovableObject> {
        let cell = self.get_cell(x as i32, y as i32)?;
        if !cell.kind.is_object() {
            return None;
        }
        let object_id = cell.object_id?;

        let members: Vec<(usize, usize)> = self.state.cells.iter().enumerate()
            .flat_map(|(cy, row)| row.iter().enumerate().map(move |(cx, c)| (cx, cy, c)))
            .filter(|(_, _, c)| c.kind.is_object() && c.object_id == Some(object_id))
            .map(|(cx, cy, _)| (cx, cy))
            .collect();

        let min_x = members.iter().map(|m| m.0).min()?;
        let max_y = members.iter().map(|m| m.1).max()?;
        let offsets = members
            .iter()
            .map(|&(mx, my)| (mx as i32 - min_x as i32, my as i32 - max_y as i32))
            .collect();
        Some(MovableObject { object_id, origin: (min_x, max_y), offsets })
    }

    /// Is any switch of this group pressed?
    pub fn switch_group_pressed(&self, id: SwitchId) -> bool {
        self.state.switches.iter().any(|s| s.id == id && s.pressed())
    }

    pub fn switch_at(&self, x: usize, y: usize) -> Option<&SwitchState> {
        self.state.switches.iter().find(|s| s.x == x && s.y == y)
    }

    /// Switch id fixed to (x, y) at load time, if any.
    pub fn fixed_switch_id(&self, x: usize, y: usize) -> Option<SwitchId> {
        self.switch_at(x, y).map(|s| s.id).or_else(|| {
            self.state.switching_blocks.iter().find(|b| b.x == x && b.y == y).map(|b| b.id)
        })
    }

    pub fn motion(&self, x: usize, y: usize) -> CellMotion {
        self.motion.get(y).and_then(|r| r.get(x)).copied().unwrap_or_default()
    }

    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    /// Total rejected transitions since the grid was built.
    pub fn rejection_count(&self) -> usize {
        self.rejections
    }
}

impl BlockQuery for GridModel {
    fn block_at(&self, x: i32, y: i32) -> Option<BlockKind> {
        self.get_block(x, y)
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }
}

// ── Mutation ──

impl GridModel {
    /// The single legal mutation path for cells.
    ///
    /// Validates invariants (hard failure), classifies the transition
    /// (illegal → warning + no-op), applies it, then updates the switch
    /// registries and any switching blocks linked to an affected group.
    pub fn set_block(&mut self, x: usize, y: usize, new: Cell) -> Result<Transition, GridError> {
        let old = self.cell_checked(x, y)?;
        let mut new = new;

        // An object landing on a switch inherits the switch's id.
        if old.kind == BlockKind::Switch && new.kind.is_object() && new.switch_id.is_none() {
            new.switch_id = old.switch_id;
        }
        // Removing an object that rests on a switch uncovers the switch.
        if new.kind == BlockKind::Empty && old.kind.is_object() && old.switch_id.is_some() {
            new = old.vacated();
        }
        self.check_cell(x, y, &new)?;

        let transition = rules::classify(&old, &new);
        match transition {
            Transition::Unchanged => return Ok(transition),
            Transition::Denied => {
                self.reject(x, y, &old, &new);
                return Ok(transition);
            }
            _ => {}
        }

        self.write_cell(x, y, new);

        let affected = match transition {
            Transition::PlayerPress => self.mark_switch(x, y, |s| s.pressed_by_player = true),
            Transition::PlayerRelease => self.mark_switch(x, y, |s| s.pressed_by_player = false),
            Transition::ObjectOnSwitch => self.mark_switch(x, y, |s| s.pressed_by_block = true),
            Transition::ObjectOffSwitch => self.mark_switch(x, y, |s| s.pressed_by_block = false),
            Transition::Remove if old.switch_id.is_some() => self.mark_switch(x, y, |s| {
                s.pressed_by_player = false;
                s.pressed_by_block = false;
            }),
            _ => None,
        };
        if let Some(id) = affected {
            self.sync_switching_blocks(id)?;
        }
        Ok(transition)
    }

    /// Replace the whole grid, touching only cells that differ.
    /// Used to restore snapshots: cells are validated but not run through
    /// the transition table (a restore may jump between any two states),
    /// and only block-kind changes reach the render queue.
    pub fn diff_and_update_to(&mut self, new_cells: &[Vec<Cell>]) -> Result<usize, GridError> {
        let new_height = new_cells.len();
        let new_width = new_cells.first().map_or(0, |r| r.len());
        if new_height != self.height
            || new_width != self.width
            || new_cells.iter().any(|r| r.len() != self.width)
        {
            return Err(GridError::DimensionMismatch {
                width: self.width,
                height: self.height,
                new_width,
                new_height,
            });
        }

        for (y, row) in new_cells.iter().enumerate() {
            for (x, cell) in row.iter().enumerate() {
                rules::validate(cell).map_err(|source| GridError::Invariant { x, y, source })?;
            }
        }

        let mut changed = 0;
        for (y, row) in new_cells.iter().enumerate() {
            for (x, &cell) in row.iter().enumerate() {
                let old = self.state.cells[y][x];
                if old == cell {
                    continue;
                }
                if old.kind == cell.kind {
                    self.state.cells[y][x] = cell; // ids only, no visual change
                } else {
                    self.write_cell(x, y, cell);
                }
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Apply `f` to every cell. A cell counts as changed only if `f`
    /// returns a value unequal to the current one; changes go through
    /// `set_block`, so the transition rules still apply.
    /// Returns the number of transitions actually applied.
    pub fn update<F>(&mut self, mut f: F) -> Result<usize, GridError>
    where
        F: FnMut(&Cell, usize, usize) -> Cell,
    {
        let mut pending = vec![];
        for (y, row) in self.state.cells.iter().enumerate() {
            for (x, cell) in row.iter().enumerate() {
                let next = f(cell, x, y);
                if next != *cell {
                    pending.push((x, y, next));
                }
            }
        }

        let mut applied = 0;
        for (x, y, next) in pending {
            let t = self.set_block(x, y, next)?;
            if t.is_allowed() && t != Transition::Unchanged {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Restore a full game state (cells by diff, registries and flags by copy)
    /// and bring every cell to rest.
    pub fn restore(&mut self, state: &GameState) -> Result<(), GridError> {
        self.diff_and_update_to(&state.cells)?;
        let cells = std::mem::take(&mut self.state.cells);
        self.state = GameState { cells, ..state.clone() };
        self.reset_motion();
        Ok(())
    }

    // ── Run flags ──

    pub fn set_paused(&mut self, paused: bool) {
        self.state.paused = paused;
    }

    pub fn mark_goaled(&mut self) {
        self.state.goaled = true;
    }

    pub fn mark_gameover(&mut self) {
        self.state.gameover = true;
    }

    pub fn count_usage(&mut self) {
        self.state.usage += 1;
    }

    // ── Motion ──

    pub fn set_motion(&mut self, x: usize, y: usize, m: CellMotion) {
        if let Some(slot) = self.motion.get_mut(y).and_then(|r| r.get_mut(x)) {
            *slot = m;
        }
    }

    /// Bring every cell to rest and tell the renderer.
    pub fn reset_motion(&mut self) {
        for (y, row) in self.motion.iter_mut().enumerate() {
            for (x, m) in row.iter_mut().enumerate() {
                if !m.is_rest() {
                    self.render_ops.push(RenderOp::Offset { x, y, dy: 0.0 });
                }
                *m = CellMotion::default();
            }
        }
    }

    // ── Render queue ──

    pub fn push_render_op(&mut self, op: RenderOp) {
        self.render_ops.push(op);
    }

    pub fn take_render_ops(&mut self) -> Vec<RenderOp> {
        std::mem::take(&mut self.render_ops)
    }

    /// Queue a `Put` for every non-empty cell (initial population).
    pub fn publish_all(&mut self) {
        for (y, row) in self.state.cells.iter().enumerate() {
            for (x, cell) in row.iter().enumerate() {
                if !cell.is_empty() {
                    self.render_ops.push(RenderOp::Put { x, y, kind: cell.kind });
                }
            }
        }
    }
}

// ── Internals ──

impl GridModel {
    fn cell_checked(&self, x: usize, y: usize) -> Result<Cell, GridError> {
        if x >= self.width || y >= self.height {
            return Err(GridError::OutOfBounds { x, y, width: self.width, height: self.height });
        }
        Ok(self.state.cells[y][x])
    }

    /// Id invariants plus the load-time switch id of the position.
    fn check_cell(&self, x: usize, y: usize, cell: &Cell) -> Result<(), GridError> {
        rules::validate(cell).map_err(|source| GridError::Invariant { x, y, source })?;
        if cell.switch_id.is_some() {
            let fixed = self.fixed_switch_id(x, y);
            if fixed != cell.switch_id {
                return Err(GridError::SwitchIdChanged { x, y, fixed, given: cell.switch_id });
            }
        }
        Ok(())
    }

    fn write_cell(&mut self, x: usize, y: usize, cell: Cell) {
        let old_kind = self.state.cells[y][x].kind;
        self.state.cells[y][x] = cell;
        if old_kind == cell.kind {
            return;
        }
        let op = if cell.is_empty() {
            RenderOp::Remove { x, y }
        } else {
            RenderOp::Put { x, y, kind: cell.kind }
        };
        self.render_ops.push(op);
    }

    fn reject(&mut self, x: usize, y: usize, old: &Cell, new: &Cell) {
        let msg = format!("rejected {:?} -> {:?} at ({x}, {y})", old.kind, new.kind);
        log::warn!("{msg}");
        self.rejections += 1;
        if self.diagnostics.len() >= MAX_DIAGNOSTICS {
            self.diagnostics.remove(0);
        }
        self.diagnostics.push(msg);
    }

    /// Update the registry entry of the switch at (x, y); returns its group.
    fn mark_switch<F: FnOnce(&mut SwitchState)>(&mut self, x: usize, y: usize, f: F) -> Option<SwitchId> {
        let s = self.state.switches.iter_mut().find(|s| s.x == x && s.y == y)?;
        let id = s.id;
        f(s);
        Some(id)
    }

    /// Bring every switching block of group `id` to the phase its group demands.
    /// Blocks whose position no longer holds a switching block are left alone.
    fn sync_switching_blocks(&mut self, id: SwitchId) -> Result<(), GridError> {
        let pressed = self.switch_group_pressed(id);
        let targets: Vec<(usize, usize, BlockKind)> = self.state.switching_blocks.iter()
            .filter(|b| b.id == id)
            .map(|b| (b.x, b.y, b.phase_for(pressed)))
            .collect();

        for (x, y, phase) in targets {
            let current = self.state.cells[y][x];
            if current.kind.is_switching_block() && current.kind != phase {
                self.set_block(x, y, current.with_kind(phase))?;
            }
        }
        Ok(())
    }

    fn sync_all_switching_blocks(&mut self) -> Result<(), GridError> {
        let mut ids: Vec<SwitchId> = self.state.switching_blocks.iter().map(|b| b.id).collect();
        ids.sort_unstable();
        ids.dedup();
        for id in ids {
            self.sync_switching_blocks(id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::stage::{compile, StageTemplate};
    use BlockKind::*;

    fn grid_from(base: &[&str], overlay: Option<&[&str]>) -> GridModel {
        let template = StageTemplate {
            name: "test".into(),
            base: base.iter().map(|s| s.to_string()).collect(),
            overlay: overlay.map(|o| o.iter().map(|s| s.to_string()).collect()),
            ..StageTemplate::default()
        };
        let def = compile(&template).unwrap();
        GridModel::from_stage(&def).unwrap()
    }

    /// Switch (group 1) at (2,0), switching block (group 1) at (4,0).
    fn switch_stage() -> GridModel {
        grid_from(&["Pms.w.g", "bbSbbbb"], Some(&["..1.1..", "......."]))
    }

    #[test]
    fn out_of_bounds_is_none() {
        let g = switch_stage();
        assert_eq!(g.get_block(-1, 0), None);
        assert_eq!(g.get_block(0, 5), None);
        assert_eq!(g.get_block(7, 0), None);
        assert_eq!(g.get_block(2, 0), Some(Switch));
    }

    #[test]
    fn registries_built_at_load() {
        let g = switch_stage();
        assert_eq!(g.state().switches, vec![SwitchState::new(1, 2, 0)]);
        assert_eq!(
            g.state().switching_blocks,
            vec![SwitchingBlockState { id: 1, x: 4, y: 0 }]
        );
        assert_eq!(g.fixed_switch_id(4, 0), Some(1));
        assert_eq!(g.fixed_switch_id(3, 0), None);
    }

    #[test]
    fn switch_to_solid_is_rejected() {
        let mut g = switch_stage();
        let before = g.state().clone();
        let t = g.set_block(2, 0, Cell::plain(Solid)).unwrap();
        assert_eq!(t, Transition::Denied);
        assert_eq!(g.state(), &before);
        assert_eq!(g.diagnostics().len(), 1);
        assert!(g.diagnostics()[0].contains("Switch"));
    }

    #[test]
    fn player_press_toggles_linked_block() {
        let mut g = switch_stage();
        g.take_render_ops();
        let t = g.set_block(2, 0, Cell::linked(SwitchPressed, 1)).unwrap();
        assert_eq!(t, Transition::PlayerPress);
        assert!(g.state().switches[0].pressed_by_player);
        assert!(g.switch_group_pressed(1));
        assert_eq!(g.get_block(4, 0), Some(SwitchingOn));
        let ops = g.take_render_ops();
        assert!(ops.contains(&RenderOp::Put { x: 4, y: 0, kind: SwitchingOn }));

        g.set_block(2, 0, Cell::linked(Switch, 1)).unwrap();
        assert!(!g.switch_group_pressed(1));
        assert_eq!(g.get_block(4, 0), Some(SwitchingOff));
    }

    #[test]
    fn object_on_switch_inherits_id() {
        let mut g = switch_stage();
        g.set_block(1, 0, Cell::EMPTY).unwrap();
        let t = g.set_block(2, 0, Cell::movable(10)).unwrap();
        assert_eq!(t, Transition::ObjectOnSwitch);
        assert_eq!(g.get_cell(2, 0), Some(Cell::movable(10).with_switch(Some(1))));
        assert!(g.state().switches[0].pressed_by_block);
        assert_eq!(g.get_block(4, 0), Some(SwitchingOn));

        let t = g.set_block(2, 0, Cell::linked(Switch, 1)).unwrap();
        assert_eq!(t, Transition::ObjectOffSwitch);
        assert!(!g.state().switches[0].pressed_by_block);
        assert_eq!(g.get_block(4, 0), Some(SwitchingOff));
    }

    #[test]
    fn switch_id_is_fixed_to_position() {
        let mut g = switch_stage();
        let err = g.set_block(2, 0, Cell::linked(SwitchPressed, 2)).unwrap_err();
        assert_eq!(
            err,
            GridError::SwitchIdChanged { x: 2, y: 0, fixed: Some(1), given: Some(2) }
        );
        assert_eq!(g.get_cell(2, 0), Some(Cell::linked(Switch, 1)));
    }

    #[test]
    fn invariant_violation_is_hard_error() {
        let mut g = switch_stage();
        let err = g.set_block(3, 0, Cell::plain(Movable)).unwrap_err();
        assert!(matches!(err, GridError::Invariant { x: 3, y: 0, .. }));
        let err = g.set_block(99, 0, Cell::EMPTY).unwrap_err();
        assert!(matches!(err, GridError::OutOfBounds { .. }));
    }

    #[test]
    fn movable_object_anchor_is_bottom_left() {
        let g = grid_from(
            &["P.....g", ".mm....", ".m.....", "bbbbbbb"],
            Some(&[".......", ".55....", ".5.....", "......."]),
        );
        let obj = g.get_movable_object(2, 1).unwrap();
        assert_eq!(obj.object_id, 5);
        assert_eq!(obj.origin, (1, 2));
        let mut offsets = obj.offsets.clone();
        offsets.sort();
        assert_eq!(offsets, vec![(0, -1), (0, 0), (1, -1)]);
        assert!(obj.contains(1, 1));
        assert!(!obj.contains(3, 1));
        assert!(g.get_movable_object(0, 3).is_none());
        assert!(g.get_movable_object(4, 0).is_none());
    }

    #[test]
    fn update_only_counts_real_changes() {
        let mut g = switch_stage();
        // Goal -> empty is applied; solid -> movable is denied.
        let applied = g
            .update(|c, _, _| match c.kind {
                Goal => Cell::EMPTY,
                Solid => Cell::movable(99),
                _ => *c,
            })
            .unwrap();
        assert_eq!(applied, 1);
        assert_eq!(g.get_block(6, 0), Some(Empty));
        assert_eq!(g.get_block(0, 1), Some(Solid));
        assert!(!g.diagnostics().is_empty());
    }

    #[test]
    fn diff_restore_only_publishes_kind_changes() {
        let mut g = switch_stage();
        let saved = g.state().clone();
        g.set_block(1, 0, Cell::EMPTY).unwrap();
        g.set_block(2, 0, Cell::movable(10)).unwrap();
        g.take_render_ops();

        g.restore(&saved).unwrap();
        assert_eq!(g.state(), &saved);
        let ops = g.take_render_ops();
        assert!(ops.contains(&RenderOp::Put { x: 1, y: 0, kind: Movable }));
        assert!(ops.contains(&RenderOp::Put { x: 2, y: 0, kind: Switch }));
        assert!(ops.contains(&RenderOp::Put { x: 4, y: 0, kind: SwitchingOff }));
        assert!(!ops.iter().any(|op| matches!(op, RenderOp::Put { x: 0, y: 1, .. })));
    }

    #[test]
    fn diff_rejects_wrong_dimensions() {
        let mut g = switch_stage();
        let err = g.diff_and_update_to(&[vec![Cell::EMPTY; 3]]).unwrap_err();
        assert!(matches!(err, GridError::DimensionMismatch { .. }));
    }

    #[test]
    fn both_switching_glyphs_start_off() {
        let mut g = grid_from(&["P.s.W.w.g", "bbSbbbbbb"], Some(&["..3.3.3..", "........."]));
        assert_eq!(g.get_block(4, 0), Some(SwitchingOff));
        assert_eq!(g.get_block(6, 0), Some(SwitchingOff));

        g.set_block(2, 0, Cell::linked(SwitchPressed, 3)).unwrap();
        assert_eq!(g.get_block(4, 0), Some(SwitchingOn));
        assert_eq!(g.get_block(6, 0), Some(SwitchingOn));
    }

    #[test]
    fn removing_object_on_switch_uncovers_the_switch() {
        let mut g = switch_stage();
        g.set_block(1, 0, Cell::EMPTY).unwrap();
        g.set_block(2, 0, Cell::movable(10)).unwrap();
        assert_eq!(g.get_block(4, 0), Some(SwitchingOn));

        let t = g.set_block(2, 0, Cell::EMPTY).unwrap();
        assert_eq!(t, Transition::ObjectOffSwitch);
        assert_eq!(g.get_cell(2, 0), Some(Cell::linked(Switch, 1)));
        assert!(!g.state().switches[0].pressed_by_block);
        assert_eq!(g.get_block(4, 0), Some(SwitchingOff));

        // The switch still works afterwards.
        g.set_block(2, 0, Cell::linked(SwitchPressed, 1)).unwrap();
        assert_eq!(g.get_block(4, 0), Some(SwitchingOn));
    }

    #[test]
    fn objects_carry_ids_everywhere() {
        let g = grid_from(&["Pmf.s.g", "bbbbSbb"], Some(&["....1..", "......."]));
        for row in &g.state().cells {
            for c in row {
                assert_eq!(c.object_id.is_some(), c.kind.is_object());
            }
        }
    }
}
