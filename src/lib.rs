pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod ids;
pub mod model;
pub mod render;
pub mod row;
pub mod server;
pub mod service;
pub mod store;
pub mod ui;
pub mod view;
