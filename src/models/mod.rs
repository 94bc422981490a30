pub mod estimate;
pub mod panel;
pub mod weather;
