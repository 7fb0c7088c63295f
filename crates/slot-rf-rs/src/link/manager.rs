use crate::link::protocol::{Options, SlotRfProtocol};
use crate::link::{Slot, NUM_REMOTES, NUM_SLOTS};
use crate::radio::{RadioConfig, SlotRadio};
use crate::{AddressLength, CrcLength, DataRate, PaLevel};

/// The persisted link configuration, as an external collaborator stores and
/// reloads it.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// True → base (primary transmitter); false → remote.
    pub ptx: bool,
    /// Link identifiers; index 0 is the primary remote.
    pub ids: [u32; NUM_REMOTES],
    pub address_length: AddressLength,
    pub data_rate: DataRate,
    pub output_power: PaLevel,
    pub crc_length: CrcLength,
    pub auto_retransmit_count: u8,
    pub auto_retransmit_delay_us: u16,
    pub automatic_acknowledgment: bool,
    pub dynamic_payload_length: bool,
    pub initial_channel: u8,
    /// Surface channel hops through [`LinkEvents::channel_changed`].
    pub print_channels: bool,
    /// Milliseconds without an external slot write before transmission is
    /// muted. 0 disables the timeout.
    pub transmit_timeout_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ptx: true,
            ids: [0x3025_1023, 0],
            address_length: AddressLength::Bytes5,
            data_rate: DataRate::Mbps1,
            output_power: PaLevel::Max,
            crc_length: CrcLength::Bit16,
            auto_retransmit_count: 0,
            auto_retransmit_delay_us: 1000,
            automatic_acknowledgment: true,
            dynamic_payload_length: true,
            initial_channel: 0,
            print_channels: false,
            transmit_timeout_ms: 1000,
        }
    }
}

impl Config {
    /// The link options this configuration implies.
    pub fn link_options(&self) -> Options {
        Options {
            ptx: self.ptx,
            id: self.ids[0] as u64,
            address_length: self.address_length,
            data_rate: self.data_rate,
            output_power: self.output_power,
            crc_length: self.crc_length,
            auto_retransmit_count: self.auto_retransmit_count,
            auto_retransmit_delay_us: self.auto_retransmit_delay_us,
            automatic_acknowledgment: self.automatic_acknowledgment,
            dynamic_payload_length: self.dynamic_payload_length,
            initial_channel: self.initial_channel,
        }
    }

    /// The radio configuration this configuration implies. Use this to build
    /// the radio handed to [`SlotRfManager::new`].
    pub fn radio_config(&self) -> RadioConfig {
        self.link_options().radio_config()
    }
}

/// One-shot notifications out of the link. The implementer formats or
/// forwards them; the manager only decides *when* something is worth
/// reporting.
pub trait LinkEvents {
    /// A slot arrived (or refreshed) since the last poll.
    fn slot_received(&mut self, remote: usize, slot_index: usize, slot: &Slot);

    /// The hop schedule moved to a new channel. Only emitted when
    /// [`Config::print_channels`] is set.
    fn channel_changed(&mut self, channel: u8);
}

/// A sink for callers that do not care about notifications.
impl LinkEvents for () {
    fn slot_received(&mut self, _remote: usize, _slot_index: usize, _slot: &Slot) {}

    fn channel_changed(&mut self, _channel: u8) {}
}

/// The outward face of the link.
///
/// Owns the scheduler, diffs the per-remote change bitfields into
/// [`LinkEvents`] pushes, and enforces the transmit idle timeout: when no
/// external slot write arrives for [`Config::transmit_timeout_ms`], every TX
/// slot's effective priority drops to zero until the next write.
pub struct SlotRfManager<R, E> {
    config: Config,
    link: SlotRfProtocol<R>,
    events: E,
    last_bitfields: [u32; NUM_REMOTES],
    last_channel: u8,
    timeout_remaining: i32,
}

impl<R: SlotRadio, E: LinkEvents> SlotRfManager<R, E> {
    /// Builds the manager around a radio configured from
    /// [`Config::radio_config()`].
    pub fn new(config: Config, radio: R, events: E) -> Self {
        let link = SlotRfProtocol::new(config.link_options(), radio);
        Self {
            config,
            link,
            events,
            last_bitfields: [0; NUM_REMOTES],
            last_channel: 0,
            timeout_remaining: 0,
        }
    }

    /// Services the link and reports what newly arrived.
    pub fn poll(&mut self) -> Result<(), R::Error> {
        self.link.poll()?;

        for remote_index in 0..NUM_REMOTES {
            let current = self.link.remote(remote_index).slot_bitfield();
            let last = self.last_bitfields[remote_index];
            if current == last {
                continue;
            }

            let changed = current ^ last;
            for slot_index in 0..NUM_SLOTS {
                if changed & (0b11 << (slot_index * 2)) == 0 {
                    continue;
                }
                let slot = self.link.remote(remote_index).rx_slot(slot_index);
                self.events.slot_received(remote_index, slot_index, slot);
            }
            self.last_bitfields[remote_index] = current;
        }

        let channel = self.link.channel();
        if self.config.print_channels && channel != self.last_channel {
            self.events.channel_changed(channel);
        }
        self.last_channel = channel;
        Ok(())
    }

    /// Runs the idle timeout, then the link's millisecond tick.
    pub fn poll_millisecond(&mut self) -> Result<(), R::Error> {
        self.timeout_remaining = (self.timeout_remaining - 1).max(0);
        if self.timeout_remaining == 0 && self.config.transmit_timeout_ms != 0 {
            self.link.set_transmit_enabled(false);
        }
        self.link.poll_millisecond()
    }

    /// Atomic full-slot replace; also refills the idle timeout and resumes
    /// transmission.
    pub fn set_tx_slot(&mut self, remote: usize, index: usize, slot: Slot) {
        self.link.remote_mut(remote).set_tx_slot(index, slot);
        self.timeout_remaining = self.config.transmit_timeout_ms as i32;
        self.link.set_transmit_enabled(true);
    }

    pub fn tx_slot(&self, remote: usize, index: usize) -> Slot {
        *self.link.remote(remote).tx_slot(index)
    }

    pub fn rx_slot(&self, remote: usize, index: usize) -> Slot {
        *self.link.remote(remote).rx_slot(index)
    }

    pub fn slot_bitfield(&self, remote: usize) -> u32 {
        self.link.remote(remote).slot_bitfield()
    }

    pub fn channel(&self) -> u8 {
        self.link.channel()
    }

    pub fn error(&self) -> u32 {
        self.link.error()
    }

    pub fn ready(&self) -> bool {
        self.link.ready()
    }

    /// Applies a new configuration by destroying the link and the radio and
    /// rebuilding both. `reinit` receives the released radio plus the radio
    /// configuration the new link implies, and must return the freshly
    /// constructed replacement.
    pub fn apply_config(self, config: Config, reinit: impl FnOnce(R, &RadioConfig) -> R) -> Self {
        let radio_config = config.radio_config();
        let radio = reinit(self.link.release(), &radio_config);
        Self::new(config, radio, self.events)
    }
}
