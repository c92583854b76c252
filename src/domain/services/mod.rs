pub mod collision;
pub mod delta;
