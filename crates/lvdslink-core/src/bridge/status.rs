//! Status word decoding

use serde::{Deserialize, Serialize};

const RX_EMPTY: u32 = 0x01;
const RX_FULL: u32 = 0x02;
const TX_EMPTY: u32 = 0x04;
const TX_FULL: u32 = 0x08;
const RX_BUSY: u32 = 0x10;
const TX_BUSY: u32 = 0x20;

/// Snapshot of the emulated UART's FIFO and shifter flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UartStatus {
    pub rx_empty: bool,
    pub rx_full: bool,
    pub tx_empty: bool,
    pub tx_full: bool,
    pub rx_busy: bool,
    pub tx_busy: bool,
}

impl UartStatus {
    /// Decode the driver's status word
    pub fn from_word(word: u32) -> Self {
        Self {
            rx_empty: word & RX_EMPTY != 0,
            rx_full: word & RX_FULL != 0,
            tx_empty: word & TX_EMPTY != 0,
            tx_full: word & TX_FULL != 0,
            rx_busy: word & RX_BUSY != 0,
            tx_busy: word & TX_BUSY != 0,
        }
    }

    /// Re-encode into the driver's bit layout
    pub fn to_word(self) -> u32 {
        [
            (self.rx_empty, RX_EMPTY),
            (self.rx_full, RX_FULL),
            (self.tx_empty, TX_EMPTY),
            (self.tx_full, TX_FULL),
            (self.rx_busy, RX_BUSY),
            (self.tx_busy, TX_BUSY),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .fold(0, |word, (_, bit)| word | bit)
    }

    /// Nothing queued in either direction and both shifters idle
    pub fn is_idle(&self) -> bool {
        self.rx_empty && self.tx_empty && !self.rx_busy && !self.tx_busy
    }
}

/// LVDS receiver lock state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LvdsStatus {
    pub bw_ready: bool,
    pub word_lock: bool,
    pub bit_lock: bool,
    pub gddr_ready: bool,
    pub pll_lock: bool,
}

impl LvdsStatus {
    pub fn from_word(word: u32) -> Self {
        Self {
            bw_ready: word & 0x01 != 0,
            word_lock: word & 0x02 != 0,
            bit_lock: word & 0x04 != 0,
            gddr_ready: word & 0x08 != 0,
            pll_lock: word & 0x10 != 0,
        }
    }

    /// True once every stage of the receiver has locked onto the camera
    pub fn is_locked(&self) -> bool {
        self.bw_ready && self.word_lock && self.bit_lock && self.gddr_ready && self.pll_lock
    }
}
