/// Entry point and game loop.

mod config;
mod domain;
mod sim;
mod ui;

use std::time::{Duration, Instant};

use config::GameConfig;
use sim::event::GameEvent;
use sim::stage::load_stages;
use sim::world::{Phase, World};
use ui::input::{Command, InputState};
use ui::renderer::Renderer;

const FRAME_SLEEP: Duration = Duration::from_millis(5);

fn main() {
    // Logs go to stderr, which the alternate screen hides; redirect to read them.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let config = GameConfig::load();
    let stages = load_stages(&config.general.stages_dir);

    let mut world = match World::new(stages, config.general.start_stage, config.physics.clone()) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Could not start: {e}");
            return;
        }
    };

    let mut renderer = Renderer::new(config.physics.block_size);

    if let Err(e) = renderer.init() {
        eprintln!("Terminal init failed: {e}");
        return;
    }

    let result = game_loop(&mut world, &mut renderer, &config);

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }

    if let Err(e) = result {
        eprintln!("Game error: {e}");
    }

    println!();
    println!("Thanks for playing Blockshift!");
    println!("Reached stage {} of {}", world.stage_index() + 1, world.stage_count());
}

fn game_loop(
    world: &mut World,
    renderer: &mut Renderer,
    config: &GameConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut kb = InputState::new();
    let mut last_tick = Instant::now();
    let tick_rate = Duration::from_millis(config.general.tick_rate_ms);

    loop {
        kb.drain_events();

        if handle_commands(world, kb.commands())? {
            break;
        }

        if last_tick.elapsed() >= tick_rate {
            let events = world.tick(kb.frame_input(), 1.0)?;
            log_events(&events);
            last_tick = Instant::now();
        }

        renderer.render(world)?;
        std::thread::sleep(FRAME_SLEEP);
    }

    Ok(())
}

/// Apply discrete commands. Returns true when the player asked to quit.
fn handle_commands(world: &mut World, commands: &[Command]) -> Result<bool, Box<dyn std::error::Error>> {
    for cmd in commands {
        match cmd {
            Command::Quit => return Ok(true),
            Command::Pause => {
                if matches!(world.phase(), Phase::Playing | Phase::Paused) {
                    world.toggle_pause();
                }
            }
            // Everything else is blocked while paused.
            _ if world.phase() == Phase::Paused => {}
            Command::Undo => world.undo()?,
            Command::Redo => world.redo()?,
            Command::Restart => world.restart()?,
            Command::NextStage => {
                world.next_stage()?;
            }
        }
    }
    Ok(false)
}

fn log_events(events: &[GameEvent]) {
    for event in events {
        match event {
            GameEvent::SwitchPressed { id, x, y } => log::debug!("switch {id} pressed at ({x}, {y})"),
            GameEvent::SwitchReleased { id, x, y } => log::debug!("switch {id} released at ({x}, {y})"),
            GameEvent::BlockLanded { x, y } => log::trace!("object landed at ({x}, {y})"),
            GameEvent::ObjectPushed { object_id, dx } => log::debug!("object {object_id} pushed by {dx}"),
            GameEvent::TransitionRejected { count } => log::warn!("{count} block transitions rejected this frame"),
            GameEvent::Goal | GameEvent::SpikeDeath | GameEvent::Respawned => log::info!("{event:?}"),
        }
    }
}
