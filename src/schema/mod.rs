pub mod brief;
pub mod emotion;
