// Domain layer: transform value types and the geometry service port.

pub mod model;
pub mod ports;
