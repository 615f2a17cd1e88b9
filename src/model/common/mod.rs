pub mod role;
pub mod time;
pub mod unique;
pub mod validation;
