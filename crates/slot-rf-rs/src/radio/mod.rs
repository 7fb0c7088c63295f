//! The nRF24L01+ driver: SPI command/register access, the non-blocking
//! power-up/configure state machine, and packetised TX/RX with Enhanced
//! Shockburst.

mod bit_fields;
mod config;
pub mod constants;
mod init;

pub use config::RadioConfig;
pub use constants::{commands, mnemonics, registers};

use crate::timer::MonotonicTimer;
use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
    spi::SpiDevice,
};
use init::ConfigureState;

/// [`Nrf24l01::error()`] bit: a frame arrived before the previous one was
/// consumed. The stale frame is lost; the new one is kept.
pub const ERR_RX_OVERFLOW: u32 = 1 << 0;

/// One radio payload: up to 32 bytes on the wire. Addressing and CRC are the
/// transceiver's problem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Packet {
    pub size: u8,
    pub data: [u8; Packet::MAX_SIZE],
}

impl Packet {
    pub const MAX_SIZE: usize = 32;

    /// The occupied prefix of the payload buffer.
    pub fn payload(&self) -> &[u8] {
        &self.data[..(self.size as usize).min(Self::MAX_SIZE)]
    }
}

impl Default for Packet {
    fn default() -> Self {
        Self {
            size: 0,
            data: [0; Self::MAX_SIZE],
        }
    }
}

/// A snapshot of the radio's health, for diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RadioStatus {
    /// The raw STATUS register.
    pub status_reg: u8,
    /// How many times the hardware retransmit budget was exhausted.
    pub retransmit_exceeded: u32,
}

/// An collection of error types to describe hardware malfunctions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Nrf24Error<SPI, GPO> {
    /// Represents a SPI transaction error.
    Spi(SPI),
    /// Represents a DigitalOutput error.
    Gpo(GPO),
    /// Represents a corruption of binary data (as it was transferred over the
    /// SPI bus' MISO), detected by a register read-back mismatch. A missing or
    /// miswired radio shows up here at configure time. The driver latches this
    /// fault and refuses further operations.
    BinaryCorruption,
}

/// The seam between the slot link and whatever carries its packets.
///
/// [`Nrf24l01`] is the hardware implementation; tests substitute their own.
pub trait SlotRadio {
    type Error;

    /// Edge-triggered service of the transceiver's IRQ line. Non-blocking.
    fn poll(&mut self) -> Result<(), Self::Error>;

    /// Advances the configuration state machine. Call once per millisecond.
    fn poll_millisecond(&mut self) -> Result<(), Self::Error>;

    /// True once the radio has been configured and verified.
    fn ready(&self) -> bool;

    /// True while a received payload is waiting in the one-deep buffer.
    fn is_data_ready(&self) -> bool;

    /// Consumes the buffered payload. Returns false (and an empty packet)
    /// when nothing was pending.
    fn read(&mut self, packet: &mut Packet) -> bool;

    /// Enqueues a payload and strobes the transmit. PTX role only.
    fn transmit(&mut self, packet: &Packet) -> Result<(), Self::Error>;

    /// Preloads an ACK payload on pipe 0. PRX role only.
    fn queue_ack(&mut self, packet: &Packet) -> Result<(), Self::Error>;

    /// Programs and read-verifies the RF channel, 0..=124.
    fn select_rf_channel(&mut self, channel: u8) -> Result<(), Self::Error>;

    /// Sticky error bits (`ERR_*`).
    fn error(&self) -> u32;
}

/// The nRF24L01+ transceiver behind an [`SpiDevice`] (CSN folded into the
/// bus), a CE output, the IRQ line polled as a plain GPIO level, and a
/// [`MonotonicTimer`].
///
/// Construction does no I/O; the power-up sequence runs incrementally inside
/// [`Nrf24l01::poll_millisecond()`] and ends in standby with every register
/// write verified by read-back. Reconfiguring requires [`Nrf24l01::release()`]
/// and a fresh instance; the state machine does not run backwards.
pub struct Nrf24l01<SPI, CE, IRQ, TIM> {
    spi: SPI,
    ce_pin: CE,
    irq_pin: IRQ,
    timer: TIM,
    config: RadioConfig,
    state: ConfigureState,
    entering_standby_ms: u32,
    latched_fault: bool,
    buf: [u8; 33],
    rx_packet: Packet,
    data_ready: bool,
    rx_overflow: bool,
    retransmit_exceeded: u32,
}

impl<SPI, CE, IRQ, TIM, PinE> Nrf24l01<SPI, CE, IRQ, TIM>
where
    SPI: SpiDevice,
    CE: OutputPin<Error = PinE>,
    IRQ: InputPin<Error = PinE>,
    TIM: MonotonicTimer,
{
    /// Captures the bus, pins, timer and configuration. Does not touch the
    /// hardware; drive [`Nrf24l01::poll_millisecond()`] until
    /// [`Nrf24l01::ready()`] reports true.
    pub fn new(spi: SPI, ce_pin: CE, irq_pin: IRQ, timer: TIM, config: &RadioConfig) -> Self {
        Self {
            spi,
            ce_pin,
            irq_pin,
            timer,
            config: *config,
            state: ConfigureState::PowerOnReset,
            entering_standby_ms: 0,
            latched_fault: false,
            buf: [0; 33],
            rx_packet: Packet::default(),
            data_ready: false,
            rx_overflow: false,
            retransmit_exceeded: 0,
        }
    }

    /// Gives the bus, pins and timer back so a new instance can be
    /// configured.
    pub fn release(self) -> (SPI, CE, IRQ, TIM) {
        (self.spi, self.ce_pin, self.irq_pin, self.timer)
    }

    /// Services the IRQ line: drains a received payload into the one-deep RX
    /// buffer, counts exhausted retransmit budgets, clears the asserted
    /// STATUS flags.
    pub fn poll(&mut self) -> Result<(), Nrf24Error<SPI::Error, PinE>> {
        self.check_fault()?;
        if self.irq_pin.is_high().map_err(Nrf24Error::Gpo)? {
            return Ok(());
        }

        // Some event to deal with; a NOP write returns STATUS.
        self.spi_read(0, commands::NOP)?;
        let status = self.buf[0];

        // On a PTX with auto-ack, TX_DS means an ACK came back and may carry
        // a payload.
        let ack_payload = self.config.ptx() && self.config.automatic_acknowledgment();
        if status & mnemonics::MASK_RX_DR != 0
            || (status & mnemonics::MASK_TX_DS != 0 && ack_payload)
        {
            self.spi_read(1, commands::R_RX_PL_WID)?;
            let width = self.buf[1].min(Packet::MAX_SIZE as u8);
            self.rx_packet.size = width;
            if width > 0 {
                self.spi_read(width, commands::R_RX_PAYLOAD)?;
                self.rx_packet.data[..width as usize]
                    .copy_from_slice(&self.buf[1..=width as usize]);
            }
            if self.data_ready {
                self.rx_overflow = true;
            }
            self.data_ready = true;
        }

        if status & mnemonics::MASK_MAX_RT != 0 {
            // Retransmit count exceeded!
            self.retransmit_exceeded = self.retransmit_exceeded.wrapping_add(1);
            self.spi_read(0, commands::FLUSH_TX)?;
        }

        let to_clear = status & 0x70;
        if to_clear != 0 {
            self.spi_write_byte(registers::STATUS, to_clear)?;
        }
        Ok(())
    }

    pub fn is_data_ready(&self) -> bool {
        self.data_ready
    }

    /// Moves the buffered payload into `packet` and frees the buffer.
    pub fn read(&mut self, packet: &mut Packet) -> bool {
        if !self.data_ready {
            packet.size = 0;
            return false;
        }
        *packet = self.rx_packet;
        self.data_ready = false;
        true
    }

    /// Writes the payload into the TX FIFO and strobes CE for at least 10 µs.
    /// Zero-length payloads are transmitted too; an empty frame still gives
    /// the receiver its ACK opportunity.
    pub fn transmit(&mut self, packet: &Packet) -> Result<(), Nrf24Error<SPI::Error, PinE>> {
        debug_assert!(self.config.ptx());
        self.check_fault()?;
        let len = (packet.size as usize).min(Packet::MAX_SIZE);
        self.buf[0] = commands::W_TX_PAYLOAD;
        self.buf[1..=len].copy_from_slice(&packet.data[..len]);
        self.spi_transfer(len as u8 + 1)?;
        self.ce_pin.set_high().map_err(Nrf24Error::Gpo)?;
        self.timer.delay_us(10);
        self.ce_pin.set_low().map_err(Nrf24Error::Gpo)
    }

    /// Preloads a payload to ride on the next ACK. Always pipe 0.
    pub fn queue_ack(&mut self, packet: &Packet) -> Result<(), Nrf24Error<SPI::Error, PinE>> {
        debug_assert!(!self.config.ptx());
        self.check_fault()?;
        let len = (packet.size as usize).min(Packet::MAX_SIZE);
        self.buf[0] = commands::W_ACK_PAYLOAD;
        self.buf[1..=len].copy_from_slice(&packet.data[..len]);
        self.spi_transfer(len as u8 + 1)
    }

    /// Programs RF_CH and verifies the write stuck.
    pub fn select_rf_channel(&mut self, channel: u8) -> Result<(), Nrf24Error<SPI::Error, PinE>> {
        self.check_fault()?;
        self.verify_register_byte(registers::RF_CH, channel & 0x7F)
    }

    /// Reads the STATUS register and reports the retransmit-exceeded count.
    pub fn status(&mut self) -> Result<RadioStatus, Nrf24Error<SPI::Error, PinE>> {
        self.check_fault()?;
        self.spi_read(0, commands::NOP)?;
        Ok(RadioStatus {
            status_reg: self.buf[0],
            retransmit_exceeded: self.retransmit_exceeded,
        })
    }

    /// Raw single-byte register read, for diagnostics.
    pub fn read_register(&mut self, register: u8) -> Result<u8, Nrf24Error<SPI::Error, PinE>> {
        self.check_fault()?;
        self.spi_read(1, register)?;
        Ok(self.buf[1])
    }

    /// Sticky error bits.
    pub fn error(&self) -> u32 {
        if self.rx_overflow {
            ERR_RX_OVERFLOW
        } else {
            0
        }
    }

    fn check_fault(&self) -> Result<(), Nrf24Error<SPI::Error, PinE>> {
        if self.latched_fault {
            return Err(Nrf24Error::BinaryCorruption);
        }
        Ok(())
    }

    fn spi_transfer(&mut self, len: u8) -> Result<(), Nrf24Error<SPI::Error, PinE>> {
        self.spi
            .transfer_in_place(&mut self.buf[..len as usize])
            .map_err(Nrf24Error::Spi)
    }

    /// Issues `command`, then clocks `len` further bytes into `buf[1..]`.
    /// `buf[0]` holds STATUS afterwards.
    fn spi_read(&mut self, len: u8, command: u8) -> Result<(), Nrf24Error<SPI::Error, PinE>> {
        self.buf[0] = command;
        for byte in self.buf[1..=len as usize].iter_mut() {
            *byte = 0;
        }
        self.spi_transfer(len + 1)
    }

    fn spi_write_byte(&mut self, register: u8, value: u8) -> Result<(), Nrf24Error<SPI::Error, PinE>> {
        self.buf[0] = commands::W_REGISTER | register;
        self.buf[1] = value;
        self.spi_transfer(2)
    }

    fn spi_write_buf(
        &mut self,
        register: u8,
        data: &[u8],
    ) -> Result<(), Nrf24Error<SPI::Error, PinE>> {
        self.buf[0] = commands::W_REGISTER | register;
        self.buf[1..=data.len()].copy_from_slice(data);
        self.spi_transfer(data.len() as u8 + 1)
    }
}

impl<SPI, CE, IRQ, TIM, PinE> SlotRadio for Nrf24l01<SPI, CE, IRQ, TIM>
where
    SPI: SpiDevice,
    CE: OutputPin<Error = PinE>,
    IRQ: InputPin<Error = PinE>,
    TIM: MonotonicTimer,
{
    type Error = Nrf24Error<SPI::Error, PinE>;

    fn poll(&mut self) -> Result<(), Self::Error> {
        Nrf24l01::poll(self)
    }

    fn poll_millisecond(&mut self) -> Result<(), Self::Error> {
        Nrf24l01::poll_millisecond(self)
    }

    fn ready(&self) -> bool {
        Nrf24l01::ready(self)
    }

    fn is_data_ready(&self) -> bool {
        Nrf24l01::is_data_ready(self)
    }

    fn read(&mut self, packet: &mut Packet) -> bool {
        Nrf24l01::read(self, packet)
    }

    fn transmit(&mut self, packet: &Packet) -> Result<(), Self::Error> {
        Nrf24l01::transmit(self, packet)
    }

    fn queue_ack(&mut self, packet: &Packet) -> Result<(), Self::Error> {
        Nrf24l01::queue_ack(self, packet)
    }

    fn select_rf_channel(&mut self, channel: u8) -> Result<(), Self::Error> {
        Nrf24l01::select_rf_channel(self, channel)
    }

    fn error(&self) -> u32 {
        Nrf24l01::error(self)
    }
}
