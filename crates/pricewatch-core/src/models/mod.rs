//! Data models for PriceWatch

mod alert;
mod market;
mod quote;
mod summary;

pub use alert::*;
pub use market::*;
pub use quote::*;
pub use summary::*;
