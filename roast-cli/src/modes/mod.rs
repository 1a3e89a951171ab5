pub mod queue;
pub mod series;
