// Domain layer: request model, checks and the ports the engine drives.

pub mod model;
pub mod ports;
