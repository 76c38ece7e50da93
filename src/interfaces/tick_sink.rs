use crate::types::tick::Tick;

/// Receives every decoded tick from a Connection, in arrival order per Connection.
pub trait TickSink: Send + Sync {
    fn on_tick(&self, tick: Tick);
}
