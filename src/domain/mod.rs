// Domain layer: run-level data shapes, read/write plans and the ports the core drives.

pub mod model;
pub mod plan;
pub mod ports;
