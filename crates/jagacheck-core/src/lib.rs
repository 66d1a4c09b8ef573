pub mod lookup;
pub mod persist;
pub mod record;
