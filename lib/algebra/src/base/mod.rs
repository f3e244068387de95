mod constant;
mod literal;

pub use constant::*;
pub use literal::*;
