#![deny(unreachable_pub)]
pub mod bot;
pub mod config;
pub mod grid;
pub mod runner;
