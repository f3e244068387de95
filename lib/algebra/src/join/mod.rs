mod minus;
mod natural;
mod optional;
mod probe;

pub use minus::*;
pub use natural::*;
pub use optional::*;
