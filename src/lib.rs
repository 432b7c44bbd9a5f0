pub mod access;
pub mod compose;
pub mod config;
pub mod db;
pub mod delivery;
pub mod handlers;
pub mod model;
pub mod telegram;
pub mod ui;
