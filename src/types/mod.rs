pub mod market;
pub mod signals;
pub mod trading;

pub use market::*;
pub use signals::*;
pub use trading::*;
