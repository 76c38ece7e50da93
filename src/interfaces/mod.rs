pub mod record_sink;
pub mod tick_sink;

pub use record_sink::RecordSink;
pub use tick_sink::TickSink;
