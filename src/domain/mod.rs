pub mod cell;
pub mod entity;
pub mod physics;
pub mod rules;
