/// Player kinematics: the single source of truth for body collision.
///
/// ## Units
///
/// Player position is in pixels (centre of the body), y grows downward.
/// Velocities are pixels per frame, `dt` is in frames (1.0 at the nominal
/// tick rate). Cells are `block_size` pixels square.
///
/// ## Step order
///
///   1. Horizontal target velocity (ground vs. air acceleration)
///   2. Jump / jump-hold window / gravity
///   3. Vertical candidate → ceiling and ground checks (inner x edges)
///   4. Horizontal candidate → wall checks (inner y edges, current row)
///   5. Commit position, respawn if below the world
///
/// ## World bounds
///
/// Left and right of the grid are walls. Above and below are open:
/// jumping out of the top is allowed, falling out of the bottom respawns.

use crate::config::PhysicsConfig;
use super::cell::BlockKind;
use super::entity::{Facing, FrameInput, Horizontal, Player};

/// Read-only view of the grid for collision queries.
pub trait BlockQuery {
    /// Block kind at (x, y), None outside the grid.
    fn block_at(&self, x: i32, y: i32) -> Option<BlockKind>;
    fn width(&self) -> usize;
    fn height(&self) -> usize;

    /// Solid for the player. Outside the grid counts as open space.
    fn solid_at(&self, x: i32, y: i32) -> bool {
        self.block_at(x, y).map_or(false, BlockKind::is_solid)
    }

    /// Solid, or beyond the left/right world bound.
    fn wall_at(&self, x: i32, y: i32) -> bool {
        x < 0 || x >= self.width() as i32 || self.solid_at(x, y)
    }
}

/// What happened to the body this frame.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct KinematicsReport {
    pub landed: bool,
    pub hit_ceiling: bool,
    /// Side that was blocked while moving.
    pub wall: Option<Horizontal>,
    pub respawned: bool,
}

/// Body half extents in pixels.
fn half_extents(cfg: &PhysicsConfig) -> (f32, f32) {
    (cfg.player_half_width * cfg.block_size, cfg.player_half_height * cfg.block_size)
}

#[inline]
fn cell_of(px: f32, bs: f32) -> i32 {
    (px / bs).floor() as i32
}

/// Pixel centre of a body standing on the floor of cell `start`.
pub fn spawn_point(start: (usize, usize), cfg: &PhysicsConfig) -> (f32, f32) {
    let (_, hh) = half_extents(cfg);
    let bs = cfg.block_size;
    ((start.0 as f32 + 0.5) * bs, (start.1 as f32 + 1.0) * bs - hh)
}

/// Columns spanned by the body's inner (1 px inset) horizontal edges.
pub fn body_columns(p: &Player, cfg: &PhysicsConfig) -> (i32, i32) {
    let (hw, _) = half_extents(cfg);
    let bs = cfg.block_size;
    (cell_of(p.x - hw + 1.0, bs), cell_of(p.x + hw - 1.0, bs))
}

/// Rows spanned by the body's inner vertical edges.
pub fn body_rows(p: &Player, cfg: &PhysicsConfig) -> (i32, i32) {
    let (_, hh) = half_extents(cfg);
    let bs = cfg.block_size;
    (cell_of(p.y - hh + 1.0, bs), cell_of(p.y + hh - 1.0, bs))
}

/// Cells in the row containing the player's feet.
pub fn feet_cells(p: &Player, cfg: &PhysicsConfig) -> Vec<(i32, i32)> {
    let (cl, cr) = body_columns(p, cfg);
    let (_, row) = body_rows(p, cfg);
    (cl..=cr).map(|x| (x, row)).collect()
}

/// Every cell the body overlaps.
pub fn overlapped_cells(p: &Player, cfg: &PhysicsConfig) -> Vec<(i32, i32)> {
    let (cl, cr) = body_columns(p, cfg);
    let (rt, rb) = body_rows(p, cfg);
    (rt..=rb).flat_map(|y| (cl..=cr).map(move |x| (x, y))).collect()
}

/// The cell centre the body occupies.
pub fn centre_cell(p: &Player, cfg: &PhysicsConfig) -> (i32, i32) {
    (cell_of(p.x, cfg.block_size), cell_of(p.y, cfg.block_size))
}

/// The cell next to the centre cell on side `dir`.
pub fn adjacent_cell(p: &Player, dir: Horizontal, cfg: &PhysicsConfig) -> Option<(i32, i32)> {
    let (cx, cy) = centre_cell(p, cfg);
    match dir {
        Horizontal::Right => Some((cx + 1, cy)),
        Horizontal::Left => Some((cx - 1, cy)),
        Horizontal::None => None,
    }
}

/// Advance the player by one frame.
pub fn step_player<Q: BlockQuery + ?Sized>(
    p: &mut Player,
    input: FrameInput,
    grid: &Q,
    cfg: &PhysicsConfig,
    start: (usize, usize),
    dt: f32,
) -> KinematicsReport {
    let mut report = KinematicsReport::default();
    let bs = cfg.block_size;
    let (hw, hh) = half_extents(cfg);

    // ── 1. Horizontal velocity ──
    match input.horizontal {
        Horizontal::Left => p.facing = Facing::Left,
        Horizontal::Right => p.facing = Facing::Right,
        Horizontal::None => {}
    }
    let target = input.horizontal.sign() * cfg.move_speed;
    let accel = if p.on_ground { cfg.ground_accel } else { cfg.air_accel } * dt;
    p.vx = approach(p.vx, target, accel);

    // ── 2. Jump and gravity ──
    if input.jump && p.on_ground {
        p.vy = -cfg.jump_speed;
        p.jump_frames = cfg.jump_hold_frames;
        p.on_ground = false;
    } else if input.jump && p.jump_frames > 0 {
        p.vy = -cfg.jump_speed;
        p.jump_frames -= 1;
    } else {
        p.jump_frames = 0;
        p.vy = (p.vy + cfg.gravity * dt).min(cfg.max_fall_speed);
    }

    // ── 3. Vertical: ceiling and ground ──
    let was_on_ground = p.on_ground;
    let mut ny = p.y + p.vy * dt;
    let cl = cell_of(p.x - hw + 1.0, bs);
    let cr = cell_of(p.x + hw - 1.0, bs);

    if p.vy < 0.0 {
        p.on_ground = false;
        let row = cell_of(ny - hh, bs);
        if grid.solid_at(cl, row) || grid.solid_at(cr, row) {
            ny = (row + 1) as f32 * bs + hh;
            p.vy = 0.0;
            p.jump_frames = 0;
            report.hit_ceiling = true;
        }
    } else {
        let row = cell_of(ny + hh, bs);
        if grid.solid_at(cl, row) || grid.solid_at(cr, row) {
            ny = row as f32 * bs - hh;
            p.vy = 0.0;
            p.on_ground = true;
            report.landed = !was_on_ground;
        } else {
            p.on_ground = false;
        }
    }

    // ── 4. Horizontal: walls against the current rows ──
    let nx = p.x + p.vx * dt;
    let rt = cell_of(p.y - hh + 1.0, bs);
    let rb = cell_of(p.y + hh - 1.0, bs);
    let col_r = ((nx + hw) / bs).ceil() as i32 - 1;
    let col_l = cell_of(nx - hw, bs);
    let hit_r = grid.wall_at(col_r, rt) || grid.wall_at(col_r, rb);
    let hit_l = grid.wall_at(col_l, rt) || grid.wall_at(col_l, rb);

    let x = match (hit_l, hit_r) {
        (false, false) => nx,
        (false, true) => {
            report.wall = Some(Horizontal::Right);
            p.vx = 0.0;
            col_r as f32 * bs - hw
        }
        (true, false) => {
            report.wall = Some(Horizontal::Left);
            p.vx = 0.0;
            (col_l + 1) as f32 * bs + hw
        }
        (true, true) => {
            p.vx = 0.0;
            p.x
        }
    };

    // ── 5. Commit ──
    p.x = x;
    p.y = ny;

    if p.y - hh > grid.height() as f32 * bs {
        let (sx, sy) = spawn_point(start, cfg);
        log::debug!("player fell out of the world, respawning at ({sx}, {sy})");
        p.x = sx;
        p.y = sy;
        p.vx = 0.0;
        p.vy = 0.0;
        p.on_ground = false;
        p.jump_frames = 0;
        report.respawned = true;
    }

    report
}

#[inline]
fn approach(v: f32, target: f32, step: f32) -> f32 {
    if v < target {
        (v + step).min(target)
    } else {
        (v - step).max(target)
    }
}

// ══════════════════════════════════════════════════════════════
// Unit tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    struct Rows(Vec<Vec<BlockKind>>);

    impl Rows {
        fn parse(rows: &[&str]) -> Self {
            Rows(
                rows.iter()
                    .map(|r| {
                        r.chars()
                            .map(|c| match c {
                                'b' => BlockKind::Solid,
                                'm' => BlockKind::Movable,
                                '#' => BlockKind::SwitchingOn,
                                'w' => BlockKind::SwitchingOff,
                                's' => BlockKind::Switch,
                                _ => BlockKind::Empty,
                            })
                            .collect()
                    })
                    .collect(),
            )
        }
    }

    impl BlockQuery for Rows {
        fn block_at(&self, x: i32, y: i32) -> Option<BlockKind> {
            if x < 0 || y < 0 {
                return None;
            }
            self.0.get(y as usize).and_then(|r| r.get(x as usize)).copied()
        }
        fn width(&self) -> usize {
            self.0[0].len()
        }
        fn height(&self) -> usize {
            self.0.len()
        }
    }

    fn cfg() -> PhysicsConfig {
        PhysicsConfig::default()
    }

    fn right() -> FrameInput {
        FrameInput { horizontal: Horizontal::Right, jump: false }
    }

    fn idle() -> FrameInput {
        FrameInput::default()
    }

    /// Body standing on the floor of cell (cx, cy).
    fn standing_at(cx: usize, cy: usize) -> Player {
        let (x, y) = spawn_point((cx, cy), &cfg());
        let mut p = Player::new(x, y);
        p.on_ground = true;
        p
    }

    fn run(p: &mut Player, input: FrameInput, grid: &Rows, frames: usize) -> KinematicsReport {
        let mut last = KinematicsReport::default();
        for _ in 0..frames {
            last = step_player(p, input, grid, &cfg(), (0, 0), 1.0);
        }
        last
    }

    // ── Walls ──

    #[test]
    fn wall_on_the_right_clamps_to_its_left_edge() {
        let grid = Rows::parse(&[
            "........",
            "...b.b..",
            "bbbbbbbb",
        ]);
        let mut p = standing_at(4, 1);
        let mut hit = false;
        for _ in 0..60 {
            let r = step_player(&mut p, right(), &grid, &cfg(), (0, 0), 1.0);
            hit |= r.wall == Some(Horizontal::Right);
        }
        assert!(hit);
        assert_eq!(p.vx, 0.0);
        assert!((p.x - (5.0 - 0.45) * 32.0).abs() < 1e-3);
    }

    #[test]
    fn wall_on_the_left_clamps_to_its_right_edge() {
        let grid = Rows::parse(&["b.....", "bbbbbb"]);
        let mut p = standing_at(3, 0);
        run(&mut p, FrameInput { horizontal: Horizontal::Left, jump: false }, &grid, 60);
        assert_eq!(p.vx, 0.0);
        assert!((p.x - (1.0 + 0.45) * 32.0).abs() < 1e-3);
    }

    #[test]
    fn world_edge_is_a_wall() {
        let grid = Rows::parse(&["....", "bbbb"]);
        let mut p = standing_at(2, 0);
        run(&mut p, right(), &grid, 60);
        assert!((p.x - (4.0 - 0.45) * 32.0).abs() < 1e-3);
    }

    #[test]
    fn both_sides_blocked_does_not_move() {
        // A body wider than its gap overlaps both walls on the candidate.
        let mut wide = cfg();
        wide.player_half_width = 1.6;
        let grid = Rows::parse(&["b..b", "b..b", "bbbb"]);
        let mut p = standing_at(1, 1);
        let before = p.x;
        p.vx = 2.0;
        let r = step_player(&mut p, idle(), &grid, &wide, (0, 0), 1.0);
        assert_eq!(r.wall, None);
        assert_eq!(p.vx, 0.0);
        assert_eq!(p.x, before);
    }

    // ── Vertical ──

    #[test]
    fn falls_and_lands_on_the_floor() {
        let grid = Rows::parse(&["....", "....", "....", "bbbb"]);
        let mut p = Player::new(48.0, 16.0);
        let mut landed = false;
        for _ in 0..120 {
            landed |= step_player(&mut p, idle(), &grid, &cfg(), (0, 0), 1.0).landed;
        }
        assert!(landed);
        assert!(p.on_ground);
        assert_eq!(p.vy, 0.0);
        assert!((p.y - (3.0 * 32.0 - 0.45 * 32.0)).abs() < 1e-3);
    }

    #[test]
    fn fall_speed_is_capped() {
        let grid = Rows::parse(&["."; 200]);
        let mut p = Player::new(16.0, 16.0);
        let mut last = 0.0;
        for _ in 0..40 {
            step_player(&mut p, idle(), &grid, &cfg(), (0, 0), 1.0);
            assert!(p.vy >= last);
            assert!(p.vy <= cfg().max_fall_speed);
            last = p.vy;
        }
        assert_eq!(p.vy, cfg().max_fall_speed);
    }

    #[test]
    fn ceiling_stops_a_jump() {
        let grid = Rows::parse(&["bbbb", "....", "....", "bbbb"]);
        let mut p = standing_at(1, 2);
        let jump = FrameInput { horizontal: Horizontal::None, jump: true };
        let mut hit = false;
        for _ in 0..20 {
            let r = step_player(&mut p, jump, &grid, &cfg(), (0, 0), 1.0);
            if r.hit_ceiling {
                hit = true;
                assert_eq!(p.vy, 0.0);
                assert!((p.y - (32.0 + 0.45 * 32.0)).abs() < 1e-3);
                break;
            }
        }
        assert!(hit);
    }

    #[test]
    fn holding_jump_goes_higher() {
        let grid = Rows::parse(&[".", ".", ".", ".", ".", ".", ".", ".", "b"]);
        let peak = |hold: usize| {
            let mut p = standing_at(0, 7);
            let mut min_y = p.y;
            for frame in 0..60 {
                let input = FrameInput { horizontal: Horizontal::None, jump: frame < hold };
                step_player(&mut p, input, &grid, &cfg(), (0, 7), 1.0);
                min_y = min_y.min(p.y);
            }
            min_y
        };
        assert!(peak(10) < peak(1));
    }

    #[test]
    fn switching_on_is_floor_and_off_is_not() {
        let on = Rows::parse(&["..", "..", "##"]);
        let off = Rows::parse(&["..", "..", "ww", ".."]);
        let mut a = Player::new(32.0, 16.0);
        let mut b = Player::new(32.0, 16.0);
        run(&mut a, idle(), &on, 60);
        run(&mut b, idle(), &off, 10);
        assert!(a.on_ground);
        assert!(!b.on_ground);
    }

    #[test]
    fn falling_out_respawns_at_start() {
        let grid = Rows::parse(&["..", ".."]);
        let mut p = Player::new(16.0, 16.0);
        p.vx = 1.0;
        let mut respawned = false;
        for _ in 0..60 {
            let r = step_player(&mut p, idle(), &grid, &cfg(), (1, 0), 1.0);
            if r.respawned {
                respawned = true;
                break;
            }
        }
        assert!(respawned);
        assert_eq!((p.x, p.y), spawn_point((1, 0), &cfg()));
        assert_eq!((p.vx, p.vy), (0.0, 0.0));
    }

    // ── Cell helpers ──

    #[test]
    fn standing_body_spans_one_cell() {
        let p = standing_at(3, 2);
        assert_eq!(overlapped_cells(&p, &cfg()), vec![(3, 2)]);
        assert_eq!(feet_cells(&p, &cfg()), vec![(3, 2)]);
        assert_eq!(centre_cell(&p, &cfg()), (3, 2));
        assert_eq!(adjacent_cell(&p, Horizontal::Right, &cfg()), Some((4, 2)));
        assert_eq!(adjacent_cell(&p, Horizontal::Left, &cfg()), Some((2, 2)));
        assert_eq!(adjacent_cell(&p, Horizontal::None, &cfg()), None);
    }
}
