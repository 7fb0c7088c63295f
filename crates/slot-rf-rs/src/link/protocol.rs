use heapless::Vec;

use crate::link::channel::{ChannelTable, NUM_CHANNELS};
use crate::link::framing::{push_slot, Sublayers};
use crate::link::{Remote, ERR_FRAMING, NUM_REMOTES, NUM_SLOTS, SLOT_PERIOD_MS};
use crate::radio::{Packet, RadioConfig, SlotRadio};
use crate::{AddressLength, CrcLength, DataRate, PaLevel};

/// Priority windows cycle 0..16, one per frame.
const PRIORITY_WINDOWS: u8 = 16;

/// Consecutive missed frames a locked receiver tolerates before it falls
/// back to synchronizing.
const RX_MISS_LIMIT: u32 = 5;

/// Link-level options. The radio configuration is derived from these via
/// [`Options::radio_config()`].
#[derive(Clone, Copy, Debug)]
pub struct Options {
    /// True on the base (primary transmitter), false on a remote.
    pub ptx: bool,
    /// The link identifier: pipe address bytes and hop-schedule seed.
    pub id: u64,
    pub address_length: AddressLength,
    pub data_rate: DataRate,
    pub output_power: PaLevel,
    pub crc_length: CrcLength,
    pub auto_retransmit_count: u8,
    pub auto_retransmit_delay_us: u16,
    pub automatic_acknowledgment: bool,
    pub dynamic_payload_length: bool,
    /// The transmitter's RF channel before its first hop. A receiver ignores
    /// this and waits on the schedule's first entry.
    pub initial_channel: u8,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            ptx: true,
            id: 0x3045,
            address_length: AddressLength::Bytes5,
            data_rate: DataRate::Mbps1,
            output_power: PaLevel::Max,
            crc_length: CrcLength::Bit16,
            auto_retransmit_count: 0,
            auto_retransmit_delay_us: 1000,
            automatic_acknowledgment: true,
            dynamic_payload_length: true,
            initial_channel: 0,
        }
    }
}

impl Options {
    /// The radio configuration this link implies.
    pub fn radio_config(&self) -> RadioConfig {
        let channel = if self.ptx {
            self.initial_channel
        } else {
            ChannelTable::new(self.id as u32).get(0)
        };
        RadioConfig::default()
            .with_ptx(self.ptx)
            .with_id(self.id)
            .with_address_length(self.address_length)
            .with_data_rate(self.data_rate)
            .with_pa_level(self.output_power)
            .with_crc_length(self.crc_length)
            .with_auto_retransmit_count(self.auto_retransmit_count)
            .with_auto_retransmit_delay_us(self.auto_retransmit_delay_us)
            .with_automatic_acknowledgment(self.automatic_acknowledgment)
            .with_dynamic_payload_length(self.dynamic_payload_length)
            .with_channel(channel)
    }
}

/// A receiver's relationship to the transmitter's hop sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiveMode {
    /// Parked on the schedule's first entry, waiting to hear anything.
    Synchronizing,
    /// Phase-aligned; hopping along with the transmitter.
    Locked,
}

/// The slot scheduler.
///
/// Owns the radio and the slot banks, runs the 20 ms frame cadence, and packs
/// priority-window candidates oldest-first into each outbound payload. On a
/// receiver it also tracks synchronization against the transmitter's hops.
///
/// Drive [`SlotRfProtocol::poll()`] from the main loop and
/// [`SlotRfProtocol::poll_millisecond()`] once per millisecond tick.
pub struct SlotRfProtocol<R> {
    options: Options,
    radio: R,
    channels: ChannelTable,
    channel_index: u8,
    slot_timer: i32,
    priority_count: u8,
    receive_mode: ReceiveMode,
    rx_miss_count: u32,
    tx_enabled: bool,
    error: u32,
    remotes: [Remote; NUM_REMOTES],
    rx_packet: Packet,
    tx_packet: Packet,
}

impl<R: SlotRadio> SlotRfProtocol<R> {
    /// Builds the link around an already-constructed radio. The radio must
    /// have been configured from [`Options::radio_config()`] so both sides
    /// agree on the schedule's starting channel.
    pub fn new(options: Options, radio: R) -> Self {
        let channels = ChannelTable::new(options.id as u32);
        Self {
            options,
            radio,
            channels,
            channel_index: 0,
            slot_timer: SLOT_PERIOD_MS,
            priority_count: 0,
            receive_mode: ReceiveMode::Synchronizing,
            rx_miss_count: 0,
            tx_enabled: true,
            error: 0,
            remotes: Default::default(),
            rx_packet: Packet::default(),
            tx_packet: Packet::default(),
        }
    }

    /// Services the radio and ingests anything it received.
    pub fn poll(&mut self) -> Result<(), R::Error> {
        self.radio.poll()?;

        if !self.radio.is_data_ready() {
            return Ok(());
        }
        if !self.radio.read(&mut self.rx_packet) {
            return Ok(());
        }

        // A receiver is locked (or re-locked) by any reception, and the
        // reception itself re-phases its frame timer to the transmitter's.
        if !self.options.ptx {
            self.receive_mode = ReceiveMode::Locked;
            self.slot_timer = SLOT_PERIOD_MS;
            self.rx_miss_count = 0;
        }

        self.remotes[0].age_rx_slots();
        self.parse_packet();
        Ok(())
    }

    /// Advances the frame timer; runs hops, transmits and ACK preloads at
    /// their scheduled phases.
    pub fn poll_millisecond(&mut self) -> Result<(), R::Error> {
        self.radio.poll_millisecond()?;

        self.slot_timer -= 1;

        if self.options.ptx {
            if self.slot_timer == 0 {
                // The frame goes out whether or not it carries anything;
                // an empty frame still gives the receiver its chance to
                // reply.
                self.prepare_tx_packet();
                self.radio.transmit(&self.tx_packet)?;
                self.slot_timer = SLOT_PERIOD_MS;
            } else if self.slot_timer == 2 {
                // Hop two milliseconds ahead of the transmit so the PLL has
                // settled on the new channel.
                self.advance_channel()?;
            }
        } else if self.slot_timer == SLOT_PERIOD_MS / 2
            && self.receive_mode == ReceiveMode::Locked
        {
            // Mid-frame both ends have finished with the current channel;
            // follow the transmitter's hop and preload the reply that rides
            // on the next ACK.
            self.advance_channel()?;
            self.prepare_tx_packet();
            self.radio.queue_ack(&self.tx_packet)?;
        } else if self.slot_timer == 0 {
            self.slot_timer = SLOT_PERIOD_MS;
            self.rx_miss_count += 1;

            if self.receive_mode == ReceiveMode::Locked && self.rx_miss_count > RX_MISS_LIMIT {
                // Lost the transmitter; go wait for it on the schedule's
                // first entry again.
                self.receive_mode = ReceiveMode::Synchronizing;
                self.rx_miss_count = 0;
                self.channel_index = 0;
                let channel = self.channels.get(0);
                self.radio.select_rf_channel(channel)?;
            }
        }
        Ok(())
    }

    /// The slot bank for a remote. Out-of-range indices saturate.
    pub fn remote(&self, index: usize) -> &Remote {
        &self.remotes[index.min(NUM_REMOTES - 1)]
    }

    pub fn remote_mut(&mut self, index: usize) -> &mut Remote {
        &mut self.remotes[index.min(NUM_REMOTES - 1)]
    }

    /// The channel number at the current hop position.
    pub fn channel(&self) -> u8 {
        self.channels.get(self.channel_index as usize)
    }

    /// Sticky error bits, this layer's and the radio's.
    pub fn error(&self) -> u32 {
        self.error | self.radio.error()
    }

    pub fn receive_mode(&self) -> ReceiveMode {
        self.receive_mode
    }

    pub fn ready(&self) -> bool {
        self.radio.ready()
    }

    /// Gates every slot's effective priority; false stops all transmission
    /// without disturbing the stored priorities.
    pub fn set_transmit_enabled(&mut self, enabled: bool) {
        self.tx_enabled = enabled;
    }

    /// Gives the radio back, ending the link.
    pub fn release(self) -> R {
        self.radio
    }

    fn advance_channel(&mut self) -> Result<(), R::Error> {
        self.channel_index = (self.channel_index + 1) % NUM_CHANNELS as u8;
        let channel = self.channels.get(self.channel_index as usize);
        self.radio.select_rf_channel(channel)
    }

    /// The per-frame pack: age everything, gather this window's candidates,
    /// and fill the payload oldest-first.
    fn prepare_tx_packet(&mut self) {
        let remote = &mut self.remotes[0];
        remote.age_tx_slots();

        let mask = 1u32 << self.priority_count;
        let mut candidates: Vec<u8, NUM_SLOTS> = Vec::new();
        if self.tx_enabled {
            for (index, slot) in remote.tx_slots.iter().enumerate() {
                if slot.priority & mask != 0 {
                    let _ = candidates.push(index as u8);
                }
            }
        }

        // Oldest first; equal ages keep slot order.
        candidates.sort_unstable_by(|&a, &b| {
            remote.tx_slots[b as usize]
                .age
                .cmp(&remote.tx_slots[a as usize].age)
                .then(a.cmp(&b))
        });

        self.tx_packet.size = 0;
        for &index in candidates.iter() {
            let index = index as usize;
            // An oversize candidate is skipped so a smaller, younger one
            // behind it can still fit.
            if push_slot(
                &mut self.tx_packet,
                index as u8,
                remote.tx_slots[index].payload(),
            ) {
                remote.tx_slots[index].age = 0;
            }
        }

        self.priority_count = (self.priority_count + 1) % PRIORITY_WINDOWS;
    }

    fn parse_packet(&mut self) {
        let size = (self.rx_packet.size as usize).min(Packet::MAX_SIZE);
        let payload = &self.rx_packet.data[..size];
        let remote = &mut self.remotes[0];

        for sublayer in Sublayers::new(payload) {
            match sublayer {
                Ok((index, data)) => remote.record_rx(index as usize, data),
                Err(_) => {
                    self.error |= ERR_FRAMING;
                    break;
                }
            }
        }
    }
}
