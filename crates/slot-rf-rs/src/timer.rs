use embedded_hal::delay::DelayNs;

/// A free-running monotonic time source.
///
/// The original hardware backs this with two 16-bit timers (a 1 µs and a
/// 1 ms tick); any counter of at least 16 bits works. `now_ms()` wraps, so
/// consumers must compare differences rather than absolute values. The one
/// exception is the radio driver's power-on-reset check, which reads the
/// counter before it can have wrapped.
///
/// Busy-wait delays come from the [`DelayNs`] supertrait; the driver only
/// ever asks for tens of microseconds (the CE pulse).
pub trait MonotonicTimer: DelayNs {
    /// Milliseconds since the counter started running.
    fn now_ms(&mut self) -> u32;
}
