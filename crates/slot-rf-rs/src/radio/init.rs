use super::{registers, Nrf24Error, Nrf24l01};
use crate::timer::MonotonicTimer;
use embedded_hal::{
    digital::{InputPin, OutputPin},
    spi::SpiDevice,
};

/// Where the radio is along its power-up sequence. Strictly forward; a new
/// configuration needs a new driver instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum ConfigureState {
    PowerOnReset,
    EnteringStandby,
    Standby,
}

impl<SPI, CE, IRQ, TIM, PinE> Nrf24l01<SPI, CE, IRQ, TIM>
where
    SPI: SpiDevice,
    CE: OutputPin<Error = PinE>,
    IRQ: InputPin<Error = PinE>,
    TIM: MonotonicTimer,
{
    /// Advances the power-up sequence one step. Call once per millisecond.
    ///
    /// The transceiver is not usable for the first ~100 ms after power-up;
    /// CONFIG is written once that window has safely passed, and after a
    /// further 2 ms of settling every register is programmed and
    /// read-verified.
    pub fn poll_millisecond(&mut self) -> Result<(), Nrf24Error<SPI::Error, PinE>> {
        self.check_fault()?;
        let now = self.timer.now_ms();
        match self.state {
            ConfigureState::PowerOnReset => {
                // While we are in power on reset, leave CE off.
                self.ce_pin.set_low().map_err(Nrf24Error::Gpo)?;

                // This check can be absolute, because the device only has to
                // do power on reset once.
                if now < 150 {
                    return Ok(());
                }

                self.write_config()?;
                self.state = ConfigureState::EnteringStandby;
                self.entering_standby_ms = now;
            }
            ConfigureState::EnteringStandby => {
                if now.wrapping_sub(self.entering_standby_ms) < 2 {
                    return Ok(());
                }

                self.configure()?;
                self.state = ConfigureState::Standby;
            }
            ConfigureState::Standby => {}
        }
        Ok(())
    }

    /// True once the configure sequence has completed and verified.
    pub fn ready(&self) -> bool {
        self.state == ConfigureState::Standby
    }

    fn write_config(&mut self) -> Result<(), Nrf24Error<SPI::Error, PinE>> {
        // Takes effect after ~1.5 ms more in standby.
        self.spi_write_byte(registers::CONFIG, self.config.config_reg().into_bits())
    }

    fn configure(&mut self) -> Result<(), Nrf24Error<SPI::Error, PinE>> {
        self.verify_register_byte(registers::CONFIG, self.config.config_reg().into_bits())?;
        // auto-acknowledge on pipe 0
        self.verify_register_byte(registers::EN_AA, self.config.en_aa_reg())?;
        // RX on pipe 0 only
        self.verify_register_byte(registers::EN_RXADDR, 0x01)?;
        self.verify_register_byte(
            registers::SETUP_AW,
            self.config.address_length().into_bits(),
        )?;
        self.verify_register_byte(
            registers::SETUP_RETR,
            self.config.setup_retr_reg().into_bits(),
        )?;
        self.select_rf_channel(self.config.channel())?;
        self.verify_register_byte(registers::RF_SETUP, self.config.rf_setup_reg())?;

        let mut address = [0u8; 5];
        let len = self.config.address(&mut address);
        self.verify_register_buf(registers::RX_ADDR_P0, &address[..len])?;
        self.verify_register_buf(registers::TX_ADDR, &address[..len])?;

        self.verify_register_byte(registers::DYNPD, self.config.dynpd_reg())?;
        self.verify_register_byte(registers::FEATURE, self.config.feature_reg().into_bits())?;

        // In the receive role, CE stays high from here on; a PTX strobes it
        // per transmit instead.
        if !self.config.ptx() {
            self.ce_pin.set_high().map_err(Nrf24Error::Gpo)?;
        }
        Ok(())
    }

    pub(super) fn verify_register_byte(
        &mut self,
        register: u8,
        value: u8,
    ) -> Result<(), Nrf24Error<SPI::Error, PinE>> {
        self.spi_write_byte(register, value)?;
        self.spi_read(1, register)?;
        if self.buf[1] != value {
            self.latched_fault = true;
            return Err(Nrf24Error::BinaryCorruption);
        }
        Ok(())
    }

    fn verify_register_buf(
        &mut self,
        register: u8,
        value: &[u8],
    ) -> Result<(), Nrf24Error<SPI::Error, PinE>> {
        self.spi_write_buf(register, value)?;
        self.spi_read(value.len() as u8, register)?;
        if &self.buf[1..=value.len()] != value {
            self.latched_fault = true;
            return Err(Nrf24Error::BinaryCorruption);
        }
        Ok(())
    }
}

/////////////////////////////////////////////////////////////////////////////////
/// unit tests
#[cfg(test)]
mod test {
    extern crate std;
    use crate::radio::{commands, registers, Nrf24Error, RadioConfig};
    use crate::spi_test_expects;
    use crate::test::mk_radio;
    use embedded_hal_mock::eh1::{
        digital::{State as PinState, Transaction as PinTransaction},
        spi::Transaction as SpiTransaction,
    };
    use std::vec;
    use std::vec::Vec;

    fn verify_byte_expects(register: u8, value: u8) -> Vec<SpiTransaction<u8>> {
        spi_test_expects![
            (
                vec![register | commands::W_REGISTER, value],
                vec![0x0Eu8, 0u8],
            ),
            (vec![register, 0u8], vec![0x0Eu8, value]),
        ]
        .to_vec()
    }

    fn verify_buf_expects(register: u8, value: &[u8]) -> Vec<SpiTransaction<u8>> {
        let mut write = vec![register | commands::W_REGISTER];
        write.extend_from_slice(value);
        let mut write_response = vec![0x0Eu8];
        write_response.extend(core::iter::repeat(0u8).take(value.len()));
        let mut read = vec![register];
        read.extend(core::iter::repeat(0u8).take(value.len()));
        let mut read_response = vec![0x0Eu8];
        read_response.extend_from_slice(value);
        spi_test_expects![(write, write_response), (read, read_response),].to_vec()
    }

    /// Everything `configure()` programs for the given config, in order.
    fn configure_expects(config: &RadioConfig, config_reg: u8) -> Vec<SpiTransaction<u8>> {
        let mut expects = vec![];
        expects.extend(verify_byte_expects(registers::CONFIG, config_reg));
        expects.extend(verify_byte_expects(registers::EN_AA, 0x01));
        expects.extend(verify_byte_expects(registers::EN_RXADDR, 0x01));
        expects.extend(verify_byte_expects(registers::SETUP_AW, 0x03));
        expects.extend(verify_byte_expects(registers::SETUP_RETR, 0x40));
        expects.extend(verify_byte_expects(registers::RF_CH, config.channel()));
        expects.extend(verify_byte_expects(registers::RF_SETUP, 0x06));
        // id 0x200F as little-endian address bytes
        let address = [0x0Fu8, 0x20, 0, 0, 0];
        expects.extend(verify_buf_expects(registers::RX_ADDR_P0, &address));
        expects.extend(verify_buf_expects(registers::TX_ADDR, &address));
        expects.extend(verify_byte_expects(registers::DYNPD, 0x01));
        expects.extend(verify_byte_expects(registers::FEATURE, 0x07));
        expects
    }

    #[test]
    fn power_up_sequence_ptx() {
        let config = RadioConfig::default();
        let ce_expectations = [
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::Low),
        ];
        let mut spi_expectations = spi_test_expects![
            // CONFIG written as soon as the power-on-reset window has passed
            (
                vec![registers::CONFIG | commands::W_REGISTER, 0x0Eu8],
                vec![0x0Eu8, 0u8],
            ),
        ]
        .to_vec();
        spi_expectations.extend(configure_expects(&config, 0x0E));

        let mocks = mk_radio(config, &ce_expectations, &[], &spi_expectations);
        let (mut radio, mut spi, mut ce_pin, mut irq_pin, clock) = mocks;

        clock.set(0);
        radio.poll_millisecond().unwrap();
        assert!(!radio.ready());
        clock.set(149);
        radio.poll_millisecond().unwrap();
        assert!(!radio.ready());
        // window passed: CONFIG goes out
        clock.set(150);
        radio.poll_millisecond().unwrap();
        assert!(!radio.ready());
        // 2 ms of settling before the full configure
        clock.set(151);
        radio.poll_millisecond().unwrap();
        assert!(!radio.ready());
        clock.set(152);
        radio.poll_millisecond().unwrap();
        assert!(radio.ready());
        // standby is terminal
        clock.set(153);
        radio.poll_millisecond().unwrap();
        assert!(radio.ready());

        spi.done();
        ce_pin.done();
        irq_pin.done();
    }

    #[test]
    fn power_up_sequence_prx_leaves_ce_high() {
        let config = RadioConfig::default().with_ptx(false);
        let ce_expectations = [
            PinTransaction::set(PinState::Low),
            PinTransaction::set(PinState::High),
        ];
        let mut spi_expectations = spi_test_expects![(
            vec![registers::CONFIG | commands::W_REGISTER, 0x0Fu8],
            vec![0x0Eu8, 0u8],
        ),]
        .to_vec();
        spi_expectations.extend(configure_expects(&config, 0x0F));

        let mocks = mk_radio(config, &ce_expectations, &[], &spi_expectations);
        let (mut radio, mut spi, mut ce_pin, mut irq_pin, clock) = mocks;

        clock.set(200);
        radio.poll_millisecond().unwrap();
        clock.set(202);
        radio.poll_millisecond().unwrap();
        assert!(radio.ready());

        spi.done();
        ce_pin.done();
        irq_pin.done();
    }

    #[test]
    fn verify_mismatch_is_fatal() {
        let config = RadioConfig::default();
        let ce_expectations = [PinTransaction::set(PinState::Low)];
        let mut spi_expectations = spi_test_expects![(
            vec![registers::CONFIG | commands::W_REGISTER, 0x0Eu8],
            vec![0x0Eu8, 0u8],
        ),]
        .to_vec();
        // the read-back disagrees: a missing or miswired radio
        spi_expectations.extend(spi_test_expects![
            (
                vec![registers::CONFIG | commands::W_REGISTER, 0x0Eu8],
                vec![0x0Eu8, 0u8],
            ),
            (vec![registers::CONFIG, 0u8], vec![0x0Eu8, 0xFFu8]),
        ]);

        let mocks = mk_radio(config, &ce_expectations, &[], &spi_expectations);
        let (mut radio, mut spi, mut ce_pin, mut irq_pin, clock) = mocks;

        clock.set(150);
        radio.poll_millisecond().unwrap();
        clock.set(152);
        assert_eq!(radio.poll_millisecond(), Err(Nrf24Error::BinaryCorruption));
        assert!(!radio.ready());
        // latched: no further bus traffic is attempted
        assert_eq!(radio.poll_millisecond(), Err(Nrf24Error::BinaryCorruption));

        spi.done();
        ce_pin.done();
        irq_pin.done();
    }
}
