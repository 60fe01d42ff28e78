pub mod balancing;
pub mod block;
pub mod game;
pub mod sound;
pub mod tetris;
