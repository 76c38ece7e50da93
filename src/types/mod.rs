pub mod exchange;
pub mod ids;
pub mod record;
pub mod tick;
pub mod timestamp;
