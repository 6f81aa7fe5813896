pub mod alerts;
pub mod deviation;
