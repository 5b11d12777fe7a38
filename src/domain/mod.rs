// Domain layer - Plain shopfloor data types
pub mod economics;
pub mod hint;
pub mod machine;
pub mod maintenance;
pub mod oee;
pub mod telemetry;
