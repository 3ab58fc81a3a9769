/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD).
/// Falls back to sensible defaults if the file is missing or incomplete.

use serde::Deserialize;
use std::path::PathBuf;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct GameConfig {
    pub physics: PhysicsConfig,
    pub general: GeneralConfig,
}

/// Physics tunables. Player values are in pixels and frames,
/// block values in cells and frames.
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicsConfig {
    pub block_size: f32,
    pub gravity: f32,
    pub max_fall_speed: f32,
    pub move_speed: f32,
    pub ground_accel: f32,
    pub air_accel: f32,
    pub jump_speed: f32,
    pub jump_hold_frames: u32,
    pub player_half_width: f32,  // in cells
    pub player_half_height: f32, // in cells
    pub block_gravity: f32,
    pub block_max_fall_speed: f32, // must stay below 1 cell/frame
    pub push_cooldown_frames: u32,
}

#[derive(Clone, Debug)]
pub struct GeneralConfig {
    pub tick_rate_ms: u64,
    pub stages_dir: PathBuf,
    pub start_stage: usize,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        TomlPhysics::default().into()
    }
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    physics: TomlPhysics,
    #[serde(default)]
    general: TomlGeneral,
}

#[derive(Deserialize, Debug)]
struct TomlPhysics {
    #[serde(default = "default_block_size")]
    block_size: f32,
    #[serde(default = "default_gravity")]
    gravity: f32,
    #[serde(default = "default_max_fall_speed")]
    max_fall_speed: f32,
    #[serde(default = "default_move_speed")]
    move_speed: f32,
    #[serde(default = "default_ground_accel")]
    ground_accel: f32,
    #[serde(default = "default_air_accel")]
    air_accel: f32,
    #[serde(default = "default_jump_speed")]
    jump_speed: f32,
    #[serde(default = "default_jump_hold_frames")]
    jump_hold_frames: u32,
    #[serde(default = "default_half_extent")]
    player_half_width: f32,
    #[serde(default = "default_half_extent")]
    player_half_height: f32,
    #[serde(default = "default_block_gravity")]
    block_gravity: f32,
    #[serde(default = "default_block_max_fall_speed")]
    block_max_fall_speed: f32,
    #[serde(default = "default_push_cooldown")]
    push_cooldown_frames: u32,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
    #[serde(default = "default_stages_dir")]
    stages_dir: String,
    #[serde(default)]
    start_stage: usize,
}

// ── Defaults ──

fn default_block_size() -> f32 { 32.0 }
fn default_gravity() -> f32 { 0.5 }
fn default_max_fall_speed() -> f32 { 12.0 }
fn default_move_speed() -> f32 { 3.2 }
fn default_ground_accel() -> f32 { 0.6 }
fn default_air_accel() -> f32 { 0.3 }
fn default_jump_speed() -> f32 { 7.5 }
fn default_jump_hold_frames() -> u32 { 10 }
fn default_half_extent() -> f32 { 0.45 }
fn default_block_gravity() -> f32 { 0.02 }
fn default_block_max_fall_speed() -> f32 { 0.4 }
fn default_push_cooldown() -> u32 { 12 }
fn default_tick_rate() -> u64 { 16 } // ~60 fps
fn default_stages_dir() -> String { "stages".into() }

impl Default for TomlPhysics {
    fn default() -> Self {
        TomlPhysics {
            block_size: default_block_size(),
            gravity: default_gravity(),
            max_fall_speed: default_max_fall_speed(),
            move_speed: default_move_speed(),
            ground_accel: default_ground_accel(),
            air_accel: default_air_accel(),
            jump_speed: default_jump_speed(),
            jump_hold_frames: default_jump_hold_frames(),
            player_half_width: default_half_extent(),
            player_half_height: default_half_extent(),
            block_gravity: default_block_gravity(),
            block_max_fall_speed: default_block_max_fall_speed(),
            push_cooldown_frames: default_push_cooldown(),
        }
    }
}

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            tick_rate_ms: default_tick_rate(),
            stages_dir: default_stages_dir(),
            start_stage: 0,
        }
    }
}

impl From<TomlPhysics> for PhysicsConfig {
    fn from(t: TomlPhysics) -> Self {
        let block_max_fall_speed = if t.block_max_fall_speed >= 1.0 {
            log::warn!(
                "block_max_fall_speed {} must be below 1 cell/frame, clamping",
                t.block_max_fall_speed
            );
            0.99
        } else {
            t.block_max_fall_speed
        };
        // One frame of falling must not skip over a whole cell.
        let max_fall_speed = if t.max_fall_speed >= t.block_size {
            log::warn!(
                "max_fall_speed {} must be below block_size {}, clamping",
                t.max_fall_speed, t.block_size
            );
            t.block_size * 0.99
        } else {
            t.max_fall_speed
        };
        PhysicsConfig {
            block_size: t.block_size,
            gravity: t.gravity,
            max_fall_speed,
            move_speed: t.move_speed,
            ground_accel: t.ground_accel,
            air_accel: t.air_accel,
            jump_speed: t.jump_speed,
            jump_hold_frames: t.jump_hold_frames,
            player_half_width: t.player_half_width,
            player_half_height: t.player_half_height,
            block_gravity: t.block_gravity,
            block_max_fall_speed,
            push_cooldown_frames: t.push_cooldown_frames,
        }
    }
}

// ── Loading ──

impl GameConfig {
    /// Load config from `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load() -> Self {
        let search_dirs = candidate_dirs();
        let toml_cfg = load_toml(&search_dirs);
        Self::resolve(toml_cfg, &search_dirs)
    }

    fn resolve(toml_cfg: TomlConfig, search_dirs: &[PathBuf]) -> Self {
        let stages_dir_str = &toml_cfg.general.stages_dir;
        let stages_dir = if PathBuf::from(stages_dir_str).is_absolute() {
            PathBuf::from(stages_dir_str)
        } else {
            search_dirs.iter()
                .map(|d| d.join(stages_dir_str))
                .find(|p| p.is_dir())
                .unwrap_or_else(|| PathBuf::from(stages_dir_str))
        };

        GameConfig {
            physics: toml_cfg.physics.into(),
            general: GeneralConfig {
                tick_rate_ms: toml_cfg.general.tick_rate_ms,
                stages_dir,
                start_stage: toml_cfg.general.start_stage,
            },
        }
    }
}

/// Candidate directories to search: exe dir + CWD + XDG data home (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/blockshift");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(text) => return parse_toml(&text),
                Err(e) => log::warn!("could not read {}: {e}", path.display()),
            }
        }
    }
    TomlConfig::default()
}

fn parse_toml(text: &str) -> TomlConfig {
    match toml::from_str::<TomlConfig>(text) {
        Ok(cfg) => cfg,
        Err(e) => {
            log::warn!("config.toml parse error, using default settings: {e}");
            TomlConfig::default()
        }
    }
}
