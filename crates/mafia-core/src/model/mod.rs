pub mod player;
pub mod role;
pub mod roster;
