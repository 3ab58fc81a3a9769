/// World: the session around a running stage.
///
/// Owns the stage list, the live `Simulation` and its `HistoryManager`.
/// The frame-loop driver talks only to this type: per-frame `tick`, plus
/// the discrete commands (undo, redo, restart, next stage, pause).
///
/// History and simulation are separate fields, so `history.undo(&mut sim)`
/// borrows them disjointly; nothing in history aliases the live state.

use thiserror::Error;

use crate::config::PhysicsConfig;
use crate::domain::entity::FrameInput;
use super::event::GameEvent;
use super::grid::{GridError, GridModel};
use super::history::{HistoryManager, Restorable};
use super::stage::StageDefinition;
use super::step::Simulation;

const MESSAGE_FRAMES: u32 = 120;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("no stages available")]
    NoStages,
    #[error(transparent)]
    Grid(#[from] GridError),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Playing,
    Paused,
    StageClear,
    GameOver,
    AllCleared,
}

pub struct World {
    stages: Vec<StageDefinition>,
    current: usize,
    physics: PhysicsConfig,
    pub sim: Simulation,
    history: HistoryManager,
    all_cleared: bool,
    /// Bumped on every stage (re)load; presentation resets its visuals on change.
    generation: u64,

    pub tick: u64,

    // ── UI ──
    pub message: String,
    pub message_timer: u32,
}

// ── Construction / stage control ──

impl World {
    pub fn new(stages: Vec<StageDefinition>, start: usize, physics: PhysicsConfig) -> Result<Self, WorldError> {
        if stages.is_empty() {
            return Err(WorldError::NoStages);
        }
        let current = start.min(stages.len() - 1);
        let sim = Simulation::new(&stages[current], physics.clone())?;
        let history = HistoryManager::new(sim.capture());
        log::info!("starting at stage {} of {}: {}", current + 1, stages.len(), stages[current].name);
        Ok(World {
            stages,
            current,
            physics,
            sim,
            history,
            all_cleared: false,
            generation: 0,
            tick: 0,
            message: String::new(),
            message_timer: 0,
        })
    }

    /// Build stage `n` from its definition and start a fresh history.
    pub fn load_stage(&mut self, n: usize) -> Result<(), GridError> {
        let Some(def) = self.stages.get(n) else {
            log::warn!("stage {n} does not exist");
            return Ok(());
        };
        self.sim = Simulation::new(def, self.physics.clone())?;
        self.history = HistoryManager::new(self.sim.capture());
        self.current = n;
        self.all_cleared = false;
        self.generation += 1;
        log::info!("loaded stage {}: {}", n + 1, def.name);
        self.set_message(&format!("Stage {}: {}", n + 1, def.name));
        Ok(())
    }

    pub fn restart(&mut self) -> Result<(), GridError> {
        self.load_stage(self.current)
    }

    /// Advance after a cleared stage. Returns false on the last stage.
    pub fn next_stage(&mut self) -> Result<bool, GridError> {
        if !self.sim.grid.state().goaled {
            return Ok(false);
        }
        if self.current + 1 >= self.stages.len() {
            self.all_cleared = true;
            self.set_message("All stages cleared!");
            return Ok(false);
        }
        self.load_stage(self.current + 1)?;
        Ok(true)
    }

    pub fn toggle_pause(&mut self) {
        let paused = !self.sim.grid.state().paused;
        self.sim.grid.set_paused(paused);
        self.set_message(if paused { "Paused" } else { "" });
    }

    // ── History ──

    pub fn undo(&mut self) -> Result<(), GridError> {
        if self.history.undo(&mut self.sim)? {
            self.set_message("Undo");
        }
        Ok(())
    }

    pub fn redo(&mut self) -> Result<(), GridError> {
        if self.history.redo(&mut self.sim)? {
            self.set_message("Redo");
        }
        Ok(())
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    // ── Per-frame ──

    pub fn tick(&mut self, input: FrameInput, dt: f32) -> Result<Vec<GameEvent>, GridError> {
        self.tick += 1;
        if self.message_timer > 0 {
            self.message_timer -= 1;
            if self.message_timer == 0 {
                self.message.clear();
            }
        }

        let outcome = self.sim.step(input, dt)?;
        if let Some((before, after)) = outcome.checkpoint {
            self.history.record(before, after);
        }

        for event in &outcome.events {
            match event {
                GameEvent::Goal => self.set_message("Stage clear!  [n] next stage"),
                GameEvent::SpikeDeath => self.set_message("Ouch!  [z] undo  [r] restart"),
                GameEvent::Respawned => self.set_message("Fell out of the world"),
                _ => {}
            }
        }
        Ok(outcome.events)
    }

    // ── Queries ──

    pub fn grid(&self) -> &GridModel {
        &self.sim.grid
    }

    pub fn grid_mut(&mut self) -> &mut GridModel {
        &mut self.sim.grid
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stage_index(&self) -> usize {
        self.current
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stage_name(&self) -> &str {
        &self.stages[self.current].name
    }

    pub fn phase(&self) -> Phase {
        let state = self.sim.grid.state();
        if self.all_cleared {
            Phase::AllCleared
        } else if state.goaled {
            Phase::StageClear
        } else if state.gameover {
            Phase::GameOver
        } else if state.paused {
            Phase::Paused
        } else {
            Phase::Playing
        }
    }

    pub fn set_message(&mut self, msg: &str) {
        self.message = msg.to_string();
        self.message_timer = if msg.is_empty() { 0 } else { MESSAGE_FRAMES };
    }
}
