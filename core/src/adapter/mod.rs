//! Adapter abstraction: a uniform transactional contract over swappable
//! hardware/simulation backends (§4.F).

pub mod factory;
pub mod serial;
pub mod simulator;
pub mod vendor;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterType {
    Mock,
    Pico,
    /// Not implemented by any backend; `create` returns an error for it.
    Ft2232h,
    JLink,
}

impl AdapterType {
    pub fn to_str(self) -> &'static str {
        match self {
            AdapterType::Mock => "mock",
            AdapterType::Pico => "pico",
            AdapterType::Ft2232h => "ft2232h",
            AdapterType::JLink => "jlink",
        }
    }

    pub fn from_str_ci(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mock" | "sim" | "simulator" => Some(AdapterType::Mock),
            "pico" | "serial" => Some(AdapterType::Pico),
            "ft2232h" => Some(AdapterType::Ft2232h),
            "jlink" | "vendor" => Some(AdapterType::JLink),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterDescriptor {
    pub adapter_type: AdapterType,
    pub name: String,
    pub serial_number: Option<String>,
}

/// Uniform contract every backend implements. High-level methods
/// (`scan_ir`, `scan_dr`, `read_idcode`) must leave the TAP in
/// `RUN_TEST_IDLE` on success; the engine relies on this.
pub trait JtagAdapter: Send {
    fn open(&mut self) -> Result<(), String>;
    fn close(&mut self) -> Result<(), String>;
    fn is_connected(&self) -> bool;
    fn name(&self) -> &str;

    fn get_clock_speed(&self) -> u32;
    fn set_clock_speed(&mut self, hz: u32) -> Result<(), String>;

    fn write_tms(&mut self, tms_bits: &[bool]) -> Result<(), String>;
    fn shift_data(
        &mut self,
        tdi: &[u8],
        num_bits: usize,
        exit_shift: bool,
    ) -> Result<Vec<u8>, String>;
    fn reset_tap(&mut self) -> Result<(), String>;

    fn scan_ir(&mut self, ir_length: usize, data_in: &[u8], data_out: &mut [u8]) -> Result<(), String>;
    fn scan_dr(&mut self, dr_length: usize, data_in: &[u8], data_out: &mut [u8]) -> Result<(), String>;
    fn read_idcode(&mut self) -> Result<u32, String>;
}
