pub mod atlas;
pub mod descriptor;
pub mod fixer;
pub mod metrics;
pub mod sweep;
