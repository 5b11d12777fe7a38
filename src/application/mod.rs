// Application layer - Use cases over the shopfloor domain
pub mod cutoff;
pub mod evaluator;
pub mod maintenance_service;
pub mod recommendation;
pub mod session;
pub mod shopfloor_provider;
pub mod signal_generator;
pub mod telemetry_cache;
pub mod telemetry_service;
