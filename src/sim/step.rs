/// The step function: advances the simulation by one frame.
///
/// Processing order:
///   1. Push cooldown
///   2. Player kinematics (physics::step_player)
///   3. Object pushing (discrete action → history checkpoint)
///   4. Fallable gravity (per object, lowest object first)
///   5. Switch contact under the player's feet
///   6. Goal / spike contact
///
/// All cell changes go through `GridModel::set_block`.
/// Goal reached, player dead, or paused → the step does nothing.

use crate::config::PhysicsConfig;
use crate::domain::cell::{BlockKind, Cell};
use crate::domain::entity::{FrameInput, Horizontal, Player};
use crate::domain::physics;
use super::event::GameEvent;
use super::grid::{CellMotion, GridError, GridModel, MovableObject, RenderOp};
use super::history::Restorable;
use super::stage::StageDefinition;
use super::state::Snapshot;

/// Result of one step.
#[derive(Debug, Default)]
pub struct StepOutcome {
    pub events: Vec<GameEvent>,
    /// Before/after pair of a discrete action taken this step.
    pub checkpoint: Option<(Snapshot, Snapshot)>,
}

/// One live stage: grid, player and the tunables driving them.
pub struct Simulation {
    pub grid: GridModel,
    pub player: Player,
    start: (usize, usize),
    cfg: PhysicsConfig,
}

impl Simulation {
    pub fn new(def: &StageDefinition, cfg: PhysicsConfig) -> Result<Self, GridError> {
        let grid = GridModel::from_stage(def)?;
        let (x, y) = physics::spawn_point(def.player_start, &cfg);
        Ok(Simulation { grid, player: Player::new(x, y), start: def.player_start, cfg })
    }

    // ══════════════════════════════════════════════════════════════
    // Main entry point
    // ══════════════════════════════════════════════════════════════

    pub fn step(&mut self, input: FrameInput, dt: f32) -> Result<StepOutcome, GridError> {
        let mut out = StepOutcome::default();
        let state = self.grid.state();
        if state.paused || state.run_over() {
            return Ok(out);
        }
        let rejected_before = self.grid.rejection_count();

        if self.player.push_cooldown > 0 {
            self.player.push_cooldown -= 1;
        }

        let report = physics::step_player(&mut self.player, input, &self.grid, &self.cfg, self.start, dt);
        if report.respawned {
            out.events.push(GameEvent::Respawned);
        }

        if let Some(dir) = report.wall {
            if dir == input.horizontal && self.player.on_ground && self.player.push_cooldown == 0 {
                out.checkpoint = self.try_push(dir, &mut out.events)?;
            }
        }

        self.resolve_block_gravity(dt, &mut out.events)?;
        self.resolve_switch_contact(&mut out.events)?;
        self.resolve_hazards(&mut out.events);

        let rejected = self.grid.rejection_count() - rejected_before;
        if rejected > 0 {
            out.events.push(GameEvent::TransitionRejected { count: rejected });
        }
        Ok(out)
    }

    // ══════════════════════════════════════════════════════════════
    // Pushing
    // ══════════════════════════════════════════════════════════════

    /// Push the object beside the player one cell towards `dir`.
    /// Returns the before/after snapshots if the push happened.
    fn try_push(
        &mut self,
        dir: Horizontal,
        events: &mut Vec<GameEvent>,
    ) -> Result<Option<(Snapshot, Snapshot)>, GridError> {
        let Some((ax, ay)) = physics::adjacent_cell(&self.player, dir, &self.cfg) else {
            return Ok(None);
        };
        if ax < 0 || ay < 0 {
            return Ok(None);
        }
        let Some(object) = self.grid.get_movable_object(ax as usize, ay as usize) else {
            return Ok(None);
        };

        let dx = dir.sign() as i32;
        if object.cells().any(|(x, y)| !self.grid.motion(x, y).is_rest()) {
            return Ok(None);
        }
        if !self.object_fits(&object, dx, 0) {
            return Ok(None);
        }

        let before = self.capture();
        self.move_object(&object, dx, 0)?;
        self.grid.count_usage();
        self.player.push_cooldown = self.cfg.push_cooldown_frames;
        let after = self.capture();

        log::debug!("pushed object {} by {dx}", object.object_id);
        events.push(GameEvent::ObjectPushed { object_id: object.object_id, dx });
        Ok(Some((before, after)))
    }

    // ══════════════════════════════════════════════════════════════
    // Fallable gravity
    // ══════════════════════════════════════════════════════════════

    /// Can every cell of `object` shift by (dx, dy)? Each target must be
    /// free or already part of the object. Outside the grid is never free,
    /// so the bottom edge is a floor.
    fn object_fits(&self, object: &MovableObject, dx: i32, dy: i32) -> bool {
        object.cells().all(|(x, y)| {
            let (tx, ty) = (x as i32 + dx, y as i32 + dy);
            match self.grid.get_block(tx, ty) {
                Some(kind) => kind.is_free() || object.contains(tx as usize, ty as usize),
                None => false,
            }
        })
    }

    /// Vacate every cell of `object`, then occupy the shifted cells.
    /// Returns the object at its new position.
    fn move_object(&mut self, object: &MovableObject, dx: i32, dy: i32) -> Result<MovableObject, GridError> {
        let moving: Vec<(usize, usize, Cell)> = object
            .cells()
            .filter_map(|(x, y)| self.grid.get_cell(x as i32, y as i32).map(|c| (x, y, c)))
            .collect();
        for &(x, y, cell) in &moving {
            self.grid.set_block(x, y, cell.vacated())?;
            self.grid.set_motion(x, y, CellMotion::default());
        }
        for &(x, y, cell) in &moving {
            let (tx, ty) = ((x as i32 + dx) as usize, (y as i32 + dy) as usize);
            self.grid.set_block(tx, ty, cell.with_switch(None))?;
        }
        let (ox, oy) = object.origin;
        Ok(MovableObject {
            origin: ((ox as i32 + dx) as usize, (oy as i32 + dy) as usize),
            ..object.clone()
        })
    }

    /// Every fallable object, lowest first, so a stack never overtakes itself.
    fn fallable_objects(&self) -> Vec<MovableObject> {
        let mut seen = vec![];
        let mut objects = vec![];
        for (y, row) in self.grid.state().cells.iter().enumerate() {
            for (x, cell) in row.iter().enumerate() {
                if cell.kind != BlockKind::Fallable {
                    continue;
                }
                let Some(id) = cell.object_id else { continue };
                if seen.contains(&id) {
                    continue;
                }
                seen.push(id);
                objects.extend(self.grid.get_movable_object(x, y));
            }
        }
        objects.sort_by(|a, b| b.origin.1.cmp(&a.origin.1));
        objects
    }

    /// An object falls as one body: only when every cell can move down.
    fn resolve_block_gravity(&mut self, dt: f32, events: &mut Vec<GameEvent>) -> Result<(), GridError> {
        for object in self.fallable_objects() {
            // All members share one motion.
            let Some((mx, my)) = object.cells().next() else { continue };
            let mut m = self.grid.motion(mx, my);

            if !self.object_fits(&object, 0, 1) {
                if !m.is_rest() {
                    self.settle(&object, events);
                }
                continue;
            }

            m.speed = (m.speed + self.cfg.block_gravity * dt).min(self.cfg.block_max_fall_speed);
            m.offset += m.speed * dt;

            let mut object = object;
            while m.offset >= 1.0 {
                object = self.move_object(&object, 0, 1)?;
                m.offset -= 1.0;
                if !self.object_fits(&object, 0, 1) {
                    m = CellMotion::default();
                    break;
                }
            }

            if m.is_rest() {
                self.settle(&object, events);
            } else {
                for (x, y) in object.cells() {
                    self.grid.set_motion(x, y, m);
                    self.grid.push_render_op(RenderOp::Offset { x, y, dy: m.offset });
                }
            }
        }
        Ok(())
    }

    fn settle(&mut self, object: &MovableObject, events: &mut Vec<GameEvent>) {
        for (x, y) in object.cells() {
            self.grid.set_motion(x, y, CellMotion::default());
            self.grid.push_render_op(RenderOp::Offset { x, y, dy: 0.0 });
        }
        let (x, y) = object.origin;
        events.push(GameEvent::BlockLanded { x, y });
    }

    // ══════════════════════════════════════════════════════════════
    // Switch contact
    // ══════════════════════════════════════════════════════════════

    /// Switches in the feet row become pressed; pressed switches no longer
    /// under the feet are released.
    fn resolve_switch_contact(&mut self, events: &mut Vec<GameEvent>) -> Result<(), GridError> {
        let feet: Vec<(usize, usize)> = physics::feet_cells(&self.player, &self.cfg)
            .into_iter()
            .filter(|&(x, y)| x >= 0 && y >= 0)
            .map(|(x, y)| (x as usize, y as usize))
            .collect();

        for &(x, y) in &feet {
            let Some(cell) = self.grid.get_cell(x as i32, y as i32) else { continue };
            if cell.kind == BlockKind::Switch {
                self.grid.set_block(x, y, cell.with_kind(BlockKind::SwitchPressed))?;
                if let Some(id) = cell.switch_id {
                    events.push(GameEvent::SwitchPressed { id, x, y });
                }
            }
        }

        self.grid.update(|cell, x, y| {
            if cell.kind != BlockKind::SwitchPressed || feet.contains(&(x, y)) {
                return *cell;
            }
            if let Some(id) = cell.switch_id {
                events.push(GameEvent::SwitchReleased { id, x, y });
            }
            cell.with_kind(BlockKind::Switch)
        })?;
        Ok(())
    }

    // ══════════════════════════════════════════════════════════════
    // Goal / spike
    // ══════════════════════════════════════════════════════════════

    fn resolve_hazards(&mut self, events: &mut Vec<GameEvent>) {
        let touching_spike = physics::overlapped_cells(&self.player, &self.cfg)
            .into_iter()
            .any(|(x, y)| self.grid.get_block(x, y) == Some(BlockKind::Spike));
        if touching_spike {
            log::info!("player hit a spike");
            self.grid.mark_gameover();
            events.push(GameEvent::SpikeDeath);
            return;
        }

        let (cx, cy) = physics::centre_cell(&self.player, &self.cfg);
        if self.grid.get_block(cx, cy) == Some(BlockKind::Goal) {
            log::info!("goal reached after {} actions", self.grid.state().usage);
            self.grid.mark_goaled();
            events.push(GameEvent::Goal);
        }
    }
}

impl Restorable for Simulation {
    fn capture(&self) -> Snapshot {
        Snapshot { state: self.grid.state().clone(), player: self.player.pose() }
    }

    fn restore(&mut self, snapshot: &Snapshot) -> Result<(), GridError> {
        self.grid.restore(&snapshot.state)?;
        self.player.reset_to(snapshot.player);
        Ok(())
    }

    fn run_over(&self) -> bool {
        self.grid.state().run_over()
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════
