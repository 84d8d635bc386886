// Domain layer: the record set, typed source rows and the ports implemented by adapters.

pub mod model;
pub mod ports;
pub mod records;
