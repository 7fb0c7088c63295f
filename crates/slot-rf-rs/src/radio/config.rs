use crate::radio::bit_fields::{Config, Feature, SetupRetry};
use crate::{AddressLength, CrcLength, DataRate, PaLevel};

/// An object to configure the radio.
///
/// This struct follows a builder pattern. Since all fields are private, users
/// should start with [`RadioConfig::default`], then mutate the object
/// accordingly:
/// ```text
/// let config = RadioConfig::default().with_ptx(false).with_channel(42);
/// ```
///
/// The configuration is captured by [`Nrf24l01::new()`](crate::radio::Nrf24l01::new)
/// and programmed into the transceiver by the power-up state machine. Changing
/// it afterwards requires releasing and recreating the driver.
#[derive(Debug, Clone, Copy)]
pub struct RadioConfig {
    ptx: bool,
    id: u64,
    address_length: AddressLength,
    data_rate: DataRate,
    pa_level: PaLevel,
    crc_length: CrcLength,
    auto_retransmit_count: u8,
    auto_retransmit_delay_us: u16,
    automatic_acknowledgment: bool,
    dynamic_payload_length: bool,
    channel: u8,
}

impl Default for RadioConfig {
    /// Instantiate a [`RadioConfig`] with the link's canonical defaults.
    ///
    /// | feature | default value |
    /// |--------:|:--------------|
    /// | [`RadioConfig::ptx()`] | `true` |
    /// | [`RadioConfig::id()`] | `0x200F` |
    /// | [`RadioConfig::address_length()`] | [`AddressLength::Bytes5`] |
    /// | [`RadioConfig::data_rate()`] | [`DataRate::Mbps1`] |
    /// | [`RadioConfig::pa_level()`] | [`PaLevel::Max`] |
    /// | [`RadioConfig::crc_length()`] | [`CrcLength::Bit16`] |
    /// | [`RadioConfig::auto_retransmit_count()`] | `0` |
    /// | [`RadioConfig::auto_retransmit_delay_us()`] | `1000` |
    /// | [`RadioConfig::automatic_acknowledgment()`] | `true` |
    /// | [`RadioConfig::dynamic_payload_length()`] | `true` |
    /// | [`RadioConfig::channel()`] | `2` |
    fn default() -> Self {
        Self {
            ptx: true,
            id: 0x200F,
            address_length: AddressLength::Bytes5,
            data_rate: DataRate::Mbps1,
            pa_level: PaLevel::Max,
            crc_length: CrcLength::Bit16,
            auto_retransmit_count: 0,
            auto_retransmit_delay_us: 1000,
            automatic_acknowledgment: true,
            dynamic_payload_length: true,
            channel: 2,
        }
    }
}

impl RadioConfig {
    /// True for the primary-transmitter role, false for primary-receiver.
    pub const fn ptx(&self) -> bool {
        self.ptx
    }

    pub fn with_ptx(self, ptx: bool) -> Self {
        Self { ptx, ..self }
    }

    /// The link identifier. Its low [`RadioConfig::address_length()`] bytes
    /// (little-endian) become the Shockburst pipe address.
    pub const fn id(&self) -> u64 {
        self.id
    }

    pub fn with_id(self, id: u64) -> Self {
        Self { id, ..self }
    }

    pub const fn address_length(&self) -> AddressLength {
        self.address_length
    }

    pub fn with_address_length(self, address_length: AddressLength) -> Self {
        Self {
            address_length,
            ..self
        }
    }

    pub const fn data_rate(&self) -> DataRate {
        self.data_rate
    }

    pub fn with_data_rate(self, data_rate: DataRate) -> Self {
        Self { data_rate, ..self }
    }

    pub const fn pa_level(&self) -> PaLevel {
        self.pa_level
    }

    pub fn with_pa_level(self, pa_level: PaLevel) -> Self {
        Self { pa_level, ..self }
    }

    pub const fn crc_length(&self) -> CrcLength {
        self.crc_length
    }

    pub fn with_crc_length(self, crc_length: CrcLength) -> Self {
        Self { crc_length, ..self }
    }

    /// The number of hardware retransmits, 0..=15.
    pub const fn auto_retransmit_count(&self) -> u8 {
        self.auto_retransmit_count
    }

    pub fn with_auto_retransmit_count(self, count: u8) -> Self {
        Self {
            auto_retransmit_count: count.min(15),
            ..self
        }
    }

    /// The delay between hardware retransmits in microseconds. The register
    /// granularity is 250 µs; out-of-range values saturate.
    pub const fn auto_retransmit_delay_us(&self) -> u16 {
        self.auto_retransmit_delay_us
    }

    pub fn with_auto_retransmit_delay_us(self, delay_us: u16) -> Self {
        Self {
            auto_retransmit_delay_us: delay_us,
            ..self
        }
    }

    /// Enhanced Shockburst auto-acknowledgment (and, with it, ACK payloads).
    pub const fn automatic_acknowledgment(&self) -> bool {
        self.automatic_acknowledgment
    }

    pub fn with_automatic_acknowledgment(self, enable: bool) -> Self {
        Self {
            automatic_acknowledgment: enable,
            ..self
        }
    }

    pub const fn dynamic_payload_length(&self) -> bool {
        self.dynamic_payload_length
    }

    pub fn with_dynamic_payload_length(self, enable: bool) -> Self {
        Self {
            dynamic_payload_length: enable,
            ..self
        }
    }

    /// The RF channel programmed at configure time, before any hopping.
    pub const fn channel(&self) -> u8 {
        self.channel
    }

    pub fn with_channel(self, channel: u8) -> Self {
        Self {
            channel: channel.min(124),
            ..self
        }
    }

    /// The CONFIG register image: power up, role, CRC, all IRQ events
    /// unmasked.
    pub(crate) fn config_reg(&self) -> Config {
        Config::new()
            .with_crc(self.crc_length)
            .with_pwr_up(true)
            .with_prim_rx(!self.ptx)
    }

    pub(crate) fn setup_retr_reg(&self) -> SetupRetry {
        SetupRetry::from_timing(self.auto_retransmit_delay_us, self.auto_retransmit_count)
    }

    pub(crate) fn rf_setup_reg(&self) -> u8 {
        self.data_rate.into_bits() | self.pa_level.into_bits()
    }

    pub(crate) fn en_aa_reg(&self) -> u8 {
        self.automatic_acknowledgment as u8
    }

    pub(crate) fn dynpd_reg(&self) -> u8 {
        (self.dynamic_payload_length || self.automatic_acknowledgment) as u8
    }

    pub(crate) fn feature_reg(&self) -> Feature {
        Feature::new()
            .with_en_dpl(self.dynamic_payload_length || self.automatic_acknowledgment)
            .with_en_ack_pay(self.automatic_acknowledgment)
            .with_en_dyn_ack(self.automatic_acknowledgment)
    }

    /// Writes the pipe address (the little-endian low bytes of the id) into
    /// `address` and returns the configured width.
    pub(crate) fn address(&self, address: &mut [u8; 5]) -> usize {
        let len = self.address_length.num_bytes();
        address[..len].copy_from_slice(&self.id.to_le_bytes()[..len]);
        len
    }
}
