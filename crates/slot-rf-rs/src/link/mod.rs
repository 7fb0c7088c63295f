//! The slot link: prioritised application payloads multiplexed into 20 ms
//! frames over a frequency-hopping Enhanced Shockburst pipe.

pub mod channel;
pub mod framing;
mod manager;
mod protocol;

pub use channel::{ChannelTable, NUM_CHANNELS};
pub use framing::{push_slot, FramingError, Sublayers, MAX_SLOT_PAYLOAD};
pub use manager::{Config, LinkEvents, SlotRfManager};
pub use protocol::{Options, ReceiveMode, SlotRfProtocol};

/// Application slots per direction.
pub const NUM_SLOTS: usize = 16;

/// Slot banks a node keeps; bank 0 belongs to the primary remote.
pub const NUM_REMOTES: usize = 2;

/// One frame (one transmit opportunity) every 20 ms.
pub const SLOT_PERIOD_MS: i32 = 20;

/// Capacity of a slot's payload buffer. One byte more than the wire can
/// carry in a single sublayer ([`MAX_SLOT_PAYLOAD`]).
pub const MAX_SLOT_DATA: usize = 16;

/// [`SlotRfProtocol::error()`] bit: a received payload held a sublayer whose
/// declared size overran the packet.
pub const ERR_FRAMING: u32 = 1 << 1;

/// One application payload buffer.
///
/// `priority` selects which of the 16 per-frame windows may carry this slot:
/// bit `k` set makes the slot a candidate in window `k`. `0` disables the
/// slot, `0xFFFF_FFFF` makes it eligible every frame. `age` counts frames
/// since the slot last moved; the scheduler resets it on transmission (TX
/// side) or reception (RX side).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot {
    pub priority: u32,
    pub size: u8,
    pub age: u32,
    pub data: [u8; MAX_SLOT_DATA],
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            priority: 0,
            size: 0,
            age: 0,
            data: [0; MAX_SLOT_DATA],
        }
    }
}

impl Slot {
    /// A fresh slot holding `data`, truncated to the wire maximum.
    pub fn new(priority: u32, data: &[u8]) -> Self {
        let len = data.len().min(MAX_SLOT_PAYLOAD);
        let mut slot = Slot {
            priority,
            size: len as u8,
            age: 0,
            data: [0; MAX_SLOT_DATA],
        };
        slot.data[..len].copy_from_slice(&data[..len]);
        slot
    }

    /// The occupied prefix of the payload buffer.
    pub fn payload(&self) -> &[u8] {
        &self.data[..(self.size as usize).min(MAX_SLOT_DATA)]
    }
}

/// One remote's slot banks: what we are sending it, what it has sent us, and
/// the change bitfield over the receive bank.
///
/// The bitfield keeps two bits per slot. A slot's pair reads `0b00` until its
/// first delivery, becomes `0b11` then, and toggles between `0b11` and `0b01`
/// on every refresh, so XOR against a snapshot detects any update whether or
/// not the payload bytes changed.
#[derive(Clone, Debug, Default)]
pub struct Remote {
    tx_slots: [Slot; NUM_SLOTS],
    rx_slots: [Slot; NUM_SLOTS],
    bitfield: u32,
}

impl Remote {
    pub fn tx_slot(&self, index: usize) -> &Slot {
        &self.tx_slots[index.min(NUM_SLOTS - 1)]
    }

    /// Full-slot replace. The index saturates at the last slot and the size
    /// is clamped to what one sublayer can carry.
    pub fn set_tx_slot(&mut self, index: usize, mut slot: Slot) {
        slot.size = slot.size.min(MAX_SLOT_PAYLOAD as u8);
        self.tx_slots[index.min(NUM_SLOTS - 1)] = slot;
    }

    pub fn rx_slot(&self, index: usize) -> &Slot {
        &self.rx_slots[index.min(NUM_SLOTS - 1)]
    }

    /// Two bits per slot; see the type-level docs.
    pub fn slot_bitfield(&self) -> u32 {
        self.bitfield
    }

    fn age_tx_slots(&mut self) {
        for slot in self.tx_slots.iter_mut() {
            slot.age = slot.age.wrapping_add(1);
        }
    }

    fn age_rx_slots(&mut self) {
        for slot in self.rx_slots.iter_mut() {
            slot.age = slot.age.wrapping_add(1);
        }
    }

    /// Stores a freshly received sublayer and advances its bitfield pair.
    /// `index` comes from a 4-bit field and `data` from a 4-bit size, so both
    /// are in range by construction.
    fn record_rx(&mut self, index: usize, data: &[u8]) {
        let slot = &mut self.rx_slots[index];
        slot.age = 0;
        slot.size = data.len() as u8;
        slot.data[..data.len()].copy_from_slice(data);

        let shift = index * 2;
        let pair = (self.bitfield >> shift) & 0b11;
        let next = if pair == 0 { 0b11 } else { pair ^ 0b10 };
        self.bitfield = (self.bitfield & !(0b11 << shift)) | (next << shift);
    }
}
