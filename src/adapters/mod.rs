// Adapters layer: concrete implementations of the domain ports.

pub mod subprocess;

pub use subprocess::SubprocessTransformService;
