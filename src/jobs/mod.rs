pub mod deliver;
pub mod generate;
