use alloc::vec::Vec;
use serde::{Serialize, Deserialize};

/// Raw vision sensor output: packed RGB bytes, rows ordered bottom-up.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SensorImage {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl SensorImage {
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    pub fn is_complete(&self) -> bool {
        self.data.len() == self.expected_len()
    }
}
