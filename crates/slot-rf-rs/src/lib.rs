//! A bidirectional, frequency-hopping, slot-multiplexed RF link over the
//! nRF24L01+ transceiver.
//!
//! One base node (the primary transmitter) sends a 32-byte frame every 20 ms
//! to a remote (the primary receiver); the remote answers by riding payloads
//! on the Enhanced Shockburst auto-acknowledgment. Each direction multiplexes
//! 16 prioritised application *slots* into those frames, and both ends walk a
//! 23-entry pseudo-random channel schedule derived from the link id.
//!
//! The crate is `no_std` and hardware-agnostic: the radio sits behind
//! `embedded-hal` 1.x traits ([`SpiDevice`](embedded_hal::spi::SpiDevice)
//! with the chip select folded in, an `OutputPin` for CE, an `InputPin` for
//! the polled IRQ line) plus a [`MonotonicTimer`] for the millisecond
//! cadence.
//!
//! Everything runs cooperatively from two entry points:
//! [`link::SlotRfManager::poll()`] as often as possible, and
//! [`link::SlotRfManager::poll_millisecond()`] once per millisecond tick.
//! Nothing blocks for longer than the radio's 10 µs CE pulse.

#![no_std]

mod timer;
mod types;

pub use timer::MonotonicTimer;
pub use types::{AddressLength, CrcLength, DataRate, PaLevel};

pub mod link;
pub mod radio;

#[cfg(test)]
mod test {
    extern crate std;
    use crate::radio::{Nrf24l01, RadioConfig};
    use crate::timer::MonotonicTimer;
    use core::cell::Cell;
    use embedded_hal::delay::DelayNs;
    use embedded_hal_mock::eh1::{
        digital::{Mock as PinMock, Transaction as PinTransaction},
        spi::{Mock as SpiMock, Transaction as SpiTransaction},
    };
    use std::rc::Rc;

    /// Takes an indefinite repetition of a tuple of 2 vectors:
    /// `(expected_data, response_data)` and generates an array of
    /// `SpiTransaction`s.
    ///
    /// NOTE: This macro is only used to generate code in unit tests (for this
    /// crate only).
    #[macro_export]
    macro_rules! spi_test_expects {
        ($( ($expected:expr , $response:expr $(,)? ) , ) + ) => {
            [
                $(
                    SpiTransaction::transaction_start(),
                    SpiTransaction::transfer_in_place($expected, $response),
                    SpiTransaction::transaction_end(),
                )*
            ]
        }
    }

    /// A clock the test advances by hand; delays are a no-op.
    pub(crate) struct SimTimer(pub Rc<Cell<u32>>);

    impl DelayNs for SimTimer {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    impl MonotonicTimer for SimTimer {
        fn now_ms(&mut self) -> u32 {
            self.0.get()
        }
    }

    pub(crate) type MockRadio = Nrf24l01<SpiMock<u8>, PinMock, PinMock, SimTimer>;

    /// Builds a driver over mock SPI and pins. The returned mocks are
    /// handles onto the same expectations the driver sees (call `done()` on
    /// them); the `Rc<Cell<u32>>` is the simulated millisecond clock.
    pub(crate) fn mk_radio(
        config: RadioConfig,
        ce_expectations: &[PinTransaction],
        irq_expectations: &[PinTransaction],
        spi_expectations: &[SpiTransaction<u8>],
    ) -> (MockRadio, SpiMock<u8>, PinMock, PinMock, Rc<Cell<u32>>) {
        let spi = SpiMock::new(spi_expectations);
        let ce_pin = PinMock::new(ce_expectations);
        let irq_pin = PinMock::new(irq_expectations);
        let clock = Rc::new(Cell::new(0u32));
        let radio = Nrf24l01::new(
            spi.clone(),
            ce_pin.clone(),
            irq_pin.clone(),
            SimTimer(Rc::clone(&clock)),
            &config,
        );
        (radio, spi, ce_pin, irq_pin, clock)
    }
}
