// Domain layer - Core types and pure rules

pub mod model;
pub mod rules;
