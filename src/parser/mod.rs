pub mod date;
pub mod number;
