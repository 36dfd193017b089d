pub mod billing;
pub mod financial;
pub mod sales;
