pub mod clinic;
pub mod model;
pub mod ports;
