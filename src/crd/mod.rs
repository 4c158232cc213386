mod scaled_object;

pub use scaled_object::*;
