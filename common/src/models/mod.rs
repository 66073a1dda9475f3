mod category;
mod priority;
mod status;

pub use self::category::*;
pub use self::priority::*;
pub use self::status::*;
