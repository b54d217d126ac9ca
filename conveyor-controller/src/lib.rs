#![doc = include_str!("../../doc_include.md")]

pub mod arm_controller;
pub mod arm_driver;
pub mod cell_config;
pub mod error;
pub mod orchestrator;
pub mod pick_and_place;
pub mod port_discovery;
pub mod simulator;
pub mod waypoints;
