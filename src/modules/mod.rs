pub mod api;
pub mod house;
