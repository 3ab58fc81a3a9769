pub mod event;
pub mod grid;
pub mod history;
pub mod stage;
pub mod state;
pub mod step;
pub mod world;
