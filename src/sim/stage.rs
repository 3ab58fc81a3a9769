/// Stage preprocessor and stage loader.
///
/// ## Sources (priority order):
///   1. `stages/` directory (`*.txt` files, sorted by file name)
///   2. Built-in embedded stages
///
/// ## Stage file format:
///   ```
///   # Stage Name
///   @ inventory m*
///   <base rows>
///   ~~~
///   <overlay rows>
///   ```
///
/// Several stages may share one file, separated by a line containing only `---`.
/// The overlay (after `~~~`) is optional and must match the base layer's
/// dimensions exactly.
///
/// ## Base alphabet:
///   '.' = Empty          'b' = Solid          'm' = Movable
///   'f' = Fallable       's' = Switch         'S' = Switch base
///   'w', 'W' = Switching block (passable until its group is pressed)
///   '^' = Spike          'g' = Goal           'P' = Player start
///
/// ## Overlay:
///   '0'-'9' assign a group id. On 'm'/'f' the digit is an object id (cells
///   sharing it form one rigid object, and must all be 'm' or all 'f');
///   on 's'/'w'/'W' it is a switch id.
///   '.' or ' ' = no group. A digit used both ways in one stage is an error.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

use crate::domain::cell::{BlockKind, ObjectId, SwitchId};

/// Object ids assigned to ungrouped 'm'/'f' cells start here,
/// above every overlay digit.
const AUTO_OBJECT_ID_BASE: ObjectId = 10;

const OVERLAY_MARKER: &str = "~~~";
const STAGE_SEPARATOR: &str = "---";

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("stage has no rows")]
    Empty,
    #[error("row {row} has length {found}, expected {expected}")]
    RowLength { row: usize, expected: usize, found: usize },
    #[error("overlay has {found} rows, expected {expected}")]
    OverlayHeight { expected: usize, found: usize },
    #[error("overlay row {row} has length {found}, expected {expected}")]
    OverlayRowLength { row: usize, expected: usize, found: usize },
    #[error("unknown character {ch:?} at ({x}, {y})")]
    UnknownChar { ch: char, x: usize, y: usize },
    #[error("unknown overlay character {ch:?} at ({x}, {y})")]
    UnknownOverlayChar { ch: char, x: usize, y: usize },
    #[error("stage has no player start marker 'P'")]
    MissingPlayer,
    #[error("second player start marker at ({x}, {y})")]
    DuplicatePlayer { x: usize, y: usize },
    #[error("stage has no goal 'g'")]
    MissingGoal,
    #[error("group digit {digit} on {ch:?} at ({x}, {y}) cannot be grouped")]
    UngroupableDigit { digit: u32, ch: char, x: usize, y: usize },
    #[error("group digit {digit} is used for both blocks and switches")]
    AmbiguousGroup { digit: u32 },
    #[error("object {object_id} mixes movable and fallable cells")]
    MixedObject { object_id: ObjectId },
    #[error("{ch:?} at ({x}, {y}) needs a switch group digit in the overlay")]
    UngroupedSwitch { ch: char, x: usize, y: usize },
    #[error("unknown inventory kind {0:?}")]
    UnknownInventory(String),
}

/// A stage as authored: base layer plus optional overlay.
#[derive(Clone, Debug, Default)]
pub struct StageTemplate {
    pub name: String,
    pub base: Vec<String>,
    pub overlay: Option<Vec<String>>,
    pub inventory: Option<BlockKind>,
    pub inventory_is_infinite: bool,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BlockGroup {
    pub x: usize,
    pub y: usize,
    pub object_id: ObjectId,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SwitchGroup {
    pub x: usize,
    pub y: usize,
    pub switch_id: SwitchId,
}

/// Normalized, immutable stage. Consumed once by `GridModel::from_stage`.
#[derive(Clone, Debug)]
pub struct StageDefinition {
    pub name: String,
    /// Base rows with the player marker replaced by '.'.
    pub rows: Vec<Vec<char>>,
    pub width: usize,
    pub height: usize,
    pub player_start: (usize, usize),
    pub block_groups: Vec<BlockGroup>,
    pub switch_groups: Vec<SwitchGroup>,
    pub inventory: Option<BlockKind>,
    pub inventory_is_infinite: bool,
}

impl StageDefinition {
    /// Base-layer glyph at (x, y); '.' outside the stage.
    pub fn glyph_at(&self, x: usize, y: usize) -> char {
        self.rows.get(y).and_then(|r| r.get(x)).copied().unwrap_or('.')
    }

    pub fn object_id_at(&self, x: usize, y: usize) -> Option<ObjectId> {
        self.block_groups.iter().find(|g| g.x == x && g.y == y).map(|g| g.object_id)
    }

    pub fn switch_id_at(&self, x: usize, y: usize) -> Option<SwitchId> {
        self.switch_groups.iter().find(|g| g.x == x && g.y == y).map(|g| g.switch_id)
    }
}

/// Map a base-layer character to its block kind. 'P' maps to Empty.
pub fn kind_from_glyph(ch: char) -> Option<BlockKind> {
    let kind = match ch {
        '.' | 'P' => BlockKind::Empty,
        'b' => BlockKind::Solid,
        'm' => BlockKind::Movable,
        'f' => BlockKind::Fallable,
        's' => BlockKind::Switch,
        'S' => BlockKind::SwitchBase,
        'w' | 'W' => BlockKind::SwitchingOff,
        '^' => BlockKind::Spike,
        'g' => BlockKind::Goal,
        _ => return None,
    };
    Some(kind)
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum GroupUse {
    Block,
    Switch,
}

// ══════════════════════════════════════════════════════════════
// Preprocessing
// ══════════════════════════════════════════════════════════════

/// Compile a template into a `StageDefinition`, failing fast on any
/// malformation before a single cell is built.
pub fn compile(template: &StageTemplate) -> Result<StageDefinition, StageError> {
    let rows: Vec<Vec<char>> = template.base.iter().map(|r| r.chars().collect()).collect();
    let height = rows.len();
    let width = rows.first().map(|r| r.len()).ok_or(StageError::Empty)?;
    if width == 0 {
        return Err(StageError::Empty);
    }
    for (y, row) in rows.iter().enumerate() {
        if row.len() != width {
            return Err(StageError::RowLength { row: y, expected: width, found: row.len() });
        }
    }

    let overlay = match &template.overlay {
        Some(lines) => Some(check_overlay(lines, width, height)?),
        None => None,
    };

    let mut player_start = None;
    let mut has_goal = false;
    for (y, row) in rows.iter().enumerate() {
        for (x, &ch) in row.iter().enumerate() {
            if kind_from_glyph(ch).is_none() {
                return Err(StageError::UnknownChar { ch, x, y });
            }
            match ch {
                'P' if player_start.is_some() => return Err(StageError::DuplicatePlayer { x, y }),
                'P' => player_start = Some((x, y)),
                'g' => has_goal = true,
                _ => {}
            }
        }
    }
    let player_start = player_start.ok_or(StageError::MissingPlayer)?;
    if !has_goal {
        return Err(StageError::MissingGoal);
    }

    let mut uses: HashMap<u32, GroupUse> = HashMap::new();
    let mut block_groups = vec![];
    let mut switch_groups = vec![];
    let mut next_auto_id = AUTO_OBJECT_ID_BASE;

    for (y, row) in rows.iter().enumerate() {
        for (x, &ch) in row.iter().enumerate() {
            let digit = match &overlay {
                Some(o) => overlay_digit(o[y][x], x, y)?,
                None => None,
            };
            let group_use = match ch {
                'm' | 'f' => GroupUse::Block,
                's' | 'w' | 'W' => GroupUse::Switch,
                _ => {
                    if let Some(digit) = digit {
                        return Err(StageError::UngroupableDigit { digit, ch, x, y });
                    }
                    continue;
                }
            };

            if let Some(digit) = digit {
                let prior = *uses.entry(digit).or_insert(group_use);
                if prior != group_use {
                    return Err(StageError::AmbiguousGroup { digit });
                }
            }

            match (group_use, digit) {
                (GroupUse::Block, Some(id)) => block_groups.push(BlockGroup { x, y, object_id: id }),
                (GroupUse::Block, None) => {
                    block_groups.push(BlockGroup { x, y, object_id: next_auto_id });
                    next_auto_id += 1;
                }
                (GroupUse::Switch, Some(id)) => switch_groups.push(SwitchGroup { x, y, switch_id: id }),
                (GroupUse::Switch, None) => return Err(StageError::UngroupedSwitch { ch, x, y }),
            }
        }
    }

    check_object_kinds(&rows, &block_groups)?;
    warn_unlinked_switching_blocks(&template.name, &rows, &switch_groups);

    let mut rows = rows;
    rows[player_start.1][player_start.0] = '.';

    log::debug!(
        "compiled stage {:?}: {}x{}, {} block cells, {} switch cells",
        template.name, width, height, block_groups.len(), switch_groups.len()
    );

    Ok(StageDefinition {
        name: template.name.clone(),
        rows,
        width,
        height,
        player_start,
        block_groups,
        switch_groups,
        inventory: template.inventory,
        inventory_is_infinite: template.inventory_is_infinite,
    })
}

fn check_overlay(lines: &[String], width: usize, height: usize) -> Result<Vec<Vec<char>>, StageError> {
    if lines.len() != height {
        return Err(StageError::OverlayHeight { expected: height, found: lines.len() });
    }
    let overlay: Vec<Vec<char>> = lines.iter().map(|l| l.chars().collect()).collect();
    for (y, row) in overlay.iter().enumerate() {
        if row.len() != width {
            return Err(StageError::OverlayRowLength { row: y, expected: width, found: row.len() });
        }
    }
    Ok(overlay)
}

fn overlay_digit(ch: char, x: usize, y: usize) -> Result<Option<u32>, StageError> {
    match ch {
        '.' | ' ' => Ok(None),
        c => c.to_digit(10).map(Some).ok_or(StageError::UnknownOverlayChar { ch, x, y }),
    }
}

/// An object moves as one body, so gravity must apply to all of it or none.
fn check_object_kinds(rows: &[Vec<char>], groups: &[BlockGroup]) -> Result<(), StageError> {
    let mut kinds: HashMap<ObjectId, char> = HashMap::new();
    for g in groups {
        let ch = rows[g.y][g.x];
        if *kinds.entry(g.object_id).or_insert(ch) != ch {
            return Err(StageError::MixedObject { object_id: g.object_id });
        }
    }
    Ok(())
}

/// A switching block whose group has no switch can never toggle.
/// Legal (it is then static), but usually an authoring slip.
fn warn_unlinked_switching_blocks(name: &str, rows: &[Vec<char>], groups: &[SwitchGroup]) {
    for g in groups {
        if !matches!(rows[g.y][g.x], 'w' | 'W') {
            continue;
        }
        let has_switch = groups.iter().any(|o| o.switch_id == g.switch_id && rows[o.y][o.x] == 's');
        if !has_switch {
            log::warn!(
                "stage {name:?}: switching block at ({}, {}) has no switch in group {}",
                g.x, g.y, g.switch_id
            );
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Stage file parsing
// ══════════════════════════════════════════════════════════════

/// Parse a single stage from text content.
pub fn parse_stage_file(content: &str) -> Result<StageTemplate, StageError> {
    let mut template = StageTemplate::default();
    let mut base = vec![];
    let mut overlay: Option<Vec<String>> = None;

    for line in content.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        if let Some(name) = line.strip_prefix('#') {
            if template.name.is_empty() {
                template.name = name.trim().to_string();
            }
        } else if let Some(meta) = line.strip_prefix("@ ") {
            parse_meta(meta, &mut template)?;
        } else if line == OVERLAY_MARKER {
            overlay = Some(vec![]);
        } else if let Some(o) = overlay.as_mut() {
            o.push(line.to_string());
        } else {
            base.push(line.to_string());
        }
    }

    if template.name.is_empty() {
        template.name = "Untitled".to_string();
    }
    template.base = base;
    template.overlay = overlay;
    Ok(template)
}

/// `@ inventory m` or `@ inventory m*` (infinite).
fn parse_meta(meta: &str, template: &mut StageTemplate) -> Result<(), StageError> {
    let mut parts = meta.split_whitespace();
    if parts.next() != Some("inventory") {
        log::debug!("ignoring stage metadata {meta:?}");
        return Ok(());
    }
    let value = parts.next().unwrap_or("");
    let (glyph, infinite) = match value.strip_suffix('*') {
        Some(g) => (g, true),
        None => (value, false),
    };
    let mut chars = glyph.chars();
    let kind = match (chars.next(), chars.next()) {
        (Some(c), None) => kind_from_glyph(c).filter(|k| *k != BlockKind::Empty),
        _ => None,
    };
    template.inventory = Some(kind.ok_or_else(|| StageError::UnknownInventory(value.to_string()))?);
    template.inventory_is_infinite = infinite;
    Ok(())
}

/// Parse every stage in a (possibly multi-stage) file.
pub fn parse_stage_pack(content: &str) -> Vec<Result<StageTemplate, StageError>> {
    let mut sections = vec![];
    let mut current = String::new();
    for line in content.lines() {
        if line.trim() == STAGE_SEPARATOR {
            if !current.trim().is_empty() {
                sections.push(std::mem::take(&mut current));
            }
            current.clear();
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        sections.push(current);
    }
    sections.iter().map(|s| parse_stage_file(s)).collect()
}

// ══════════════════════════════════════════════════════════════
// Loading
// ══════════════════════════════════════════════════════════════

/// Load all stages: the stages directory if it yields any valid stage,
/// otherwise the embedded set. Malformed stages are skipped with a warning.
pub fn load_stages(dir: &Path) -> Vec<StageDefinition> {
    let from_dir = load_from_directory(dir);
    if !from_dir.is_empty() {
        log::info!("loaded {} stages from {}", from_dir.len(), dir.display());
        return from_dir;
    }
    embedded_stages()
}

fn load_from_directory(dir: &Path) -> Vec<StageDefinition> {
    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return vec![],
    };

    let mut paths: Vec<_> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.extension().map_or(false, |e| e == "txt"))
        .collect();
    paths.sort();

    let mut stages = vec![];
    for path in paths {
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                log::warn!("could not read {}: {e}", path.display());
                continue;
            }
        };
        for parsed in parse_stage_pack(&content) {
            match parsed.and_then(|t| compile(&t)) {
                Ok(def) => stages.push(def),
                Err(e) => log::warn!("skipping stage in {}: {e}", path.display()),
            }
        }
    }
    stages
}

// ══════════════════════════════════════════════════════════════
// Embedded fallback stages
// ══════════════════════════════════════════════════════════════

pub fn embedded_stages() -> Vec<StageDefinition> {
    let templates = [
        make_embedded("1 - First Steps", &[
            "bbbbbbbbbbbbbbbb",
            "b..............b",
            "b..............b",
            "b.........f....b",
            "b.P...m...b..g.b",
            "bbbbbbbbbbbbbbbb",
        ], None),
        make_embedded("2 - Pressure Plate", &[
            "bbbbbbbbbbbbbbbbbb",
            "b................b",
            "b................b",
            "b.P..m.....s....gb",
            "bbbbbbbbbbbSbwwbbb",
        ], Some(&[
            "..................",
            "..................",
            "..................",
            "...........1......",
            ".............11...",
        ])),
        make_embedded("3 - Drop Zone", &[
            "bbbbbbbbbbbbbbbbbbbb",
            "b..................b",
            "b..................b",
            "b.P..f............gb",
            "bbbbbbbb.bbbWWbbbbbb",
            "bbbbbbbbsbbb^^bbbbbb",
            "bbbbbbbbSbbbbbbbbbbb",
        ], Some(&[
            "....................",
            "....................",
            "....................",
            "....................",
            ".............11.....",
            "........1...........",
            "....................",
        ])),
    ];

    templates
        .iter()
        .filter_map(|t| match compile(t) {
            Ok(def) => Some(def),
            Err(e) => {
                log::error!("embedded stage {:?} is malformed: {e}", t.name);
                None
            }
        })
        .collect()
}

fn make_embedded(name: &str, base: &[&str], overlay: Option<&[&str]>) -> StageTemplate {
    StageTemplate {
        name: name.to_string(),
        base: base.iter().map(|s| s.to_string()).collect(),
        overlay: overlay.map(|o| o.iter().map(|s| s.to_string()).collect()),
        ..StageTemplate::default()
    }
}
