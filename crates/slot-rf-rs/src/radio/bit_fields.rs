use bitfield_struct::bitfield;

use crate::CrcLength;

#[bitfield(u8, order = Msb)]
pub(crate) struct Config {
    #[bits(1)]
    _padding: u8,

    /// Mask the radio's "RX Data Ready" IRQ event. 0 leaves the event routed
    /// to the IRQ pin; this link keeps all three events enabled.
    #[bits(1, access = None)]
    mask_rx_dr: bool,

    /// Mask the radio's "TX Data Sent" IRQ event.
    #[bits(1, access = None)]
    mask_tx_ds: bool,

    /// Mask the radio's "Max Retransmits" IRQ event.
    #[bits(1, access = None)]
    mask_max_rt: bool,

    #[bits(1, access = WO)]
    pub en_crc: bool,

    /// CRC encoding scheme: 0 = 1 byte, 1 = 2 bytes.
    #[bits(1, access = WO)]
    pub crco: bool,

    #[bits(1, access = WO)]
    pub pwr_up: bool,

    #[bits(1, access = WO)]
    pub prim_rx: bool,
}

impl Config {
    pub fn with_crc(self, length: CrcLength) -> Self {
        self.with_en_crc(!matches!(length, CrcLength::Disabled))
            .with_crco(matches!(length, CrcLength::Bit16))
    }
}

#[bitfield(u8, order = Msb)]
pub(crate) struct SetupRetry {
    /// The auto-retry feature's `delay`, in units of 250 µs.
    #[bits(4, access = WO)]
    pub ard: u8,

    /// The auto-retry feature's `count`.
    #[bits(4, access = WO)]
    pub arc: u8,
}

impl SetupRetry {
    /// Encodes a delay in microseconds and a retry count, each clamped to
    /// the register's 4-bit range.
    pub fn from_timing(delay_us: u16, count: u8) -> Self {
        Self::new()
            .with_ard((delay_us / 250).min(15) as u8)
            .with_arc(count.min(15))
    }
}

#[bitfield(u8, order = Msb)]
pub(crate) struct Feature {
    #[bits(5)]
    _padding: u8,

    /// EN_DPL: dynamic payload length on any pipe.
    #[bits(1, access = WO)]
    pub en_dpl: bool,

    /// EN_ACK_PAY: payloads ride on ACK frames.
    #[bits(1, access = WO)]
    pub en_ack_pay: bool,

    /// EN_DYN_ACK: the W_TX_PAYLOAD_NOACK command.
    #[bits(1, access = WO)]
    pub en_dyn_ack: bool,
}

// unit tests found in crate::radio::config::test
