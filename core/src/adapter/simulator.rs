//! Deterministic in-memory simulator backend.
//!
//! Grounded directly in `MockAdapter.cpp`: a fixed IDCODE, and scan data
//! synthesized from a monotonically increasing counter so the UI shows
//! plausible activity without real hardware attached.

use super::JtagAdapter;

const FIXED_IDCODE: u32 = 0x1234_5678;

pub struct SimulatorAdapter {
    connected: bool,
    clock_hz: u32,
    counter: u64,
}

impl SimulatorAdapter {
    pub fn new() -> Self {
        SimulatorAdapter {
            connected: false,
            clock_hz: 1_000_000,
            counter: 0,
        }
    }
}

impl Default for SimulatorAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl JtagAdapter for SimulatorAdapter {
    fn open(&mut self) -> Result<(), String> {
        self.connected = true;
        self.counter = 0;
        log::info!("simulator adapter open: fixed IDCODE {:#010x}", FIXED_IDCODE);
        Ok(())
    }

    fn close(&mut self) -> Result<(), String> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn name(&self) -> &str {
        "simulator"
    }

    fn get_clock_speed(&self) -> u32 {
        self.clock_hz
    }

    fn set_clock_speed(&mut self, hz: u32) -> Result<(), String> {
        self.clock_hz = hz;
        Ok(())
    }

    fn write_tms(&mut self, _tms_bits: &[bool]) -> Result<(), String> {
        Ok(())
    }

    fn shift_data(
        &mut self,
        tdi: &[u8],
        num_bits: usize,
        _exit_shift: bool,
    ) -> Result<Vec<u8>, String> {
        if !self.connected {
            return Err("simulator adapter not open".into());
        }
        let len = (num_bits + 7) / 8;
        if num_bits == 32 {
            return Ok(FIXED_IDCODE.to_le_bytes().to_vec());
        }
        self.counter = self.counter.wrapping_add(1);
        let pattern: Vec<u8> = (0..len)
            .map(|i| tdi.get(i).copied().unwrap_or(0) ^ ((self.counter as u8).wrapping_add(0xAA)))
            .collect();
        Ok(pattern)
    }

    fn reset_tap(&mut self) -> Result<(), String> {
        Ok(())
    }

    fn scan_ir(&mut self, ir_length: usize, data_in: &[u8], data_out: &mut [u8]) -> Result<(), String> {
        if !self.connected {
            return Err("simulator adapter not open".into());
        }
        let len = (ir_length + 7) / 8;
        for i in 0..len.min(data_out.len()) {
            data_out[i] = data_in.get(i).copied().unwrap_or(0);
        }
        Ok(())
    }

    fn scan_dr(&mut self, dr_length: usize, data_in: &[u8], data_out: &mut [u8]) -> Result<(), String> {
        if !self.connected {
            return Err("simulator adapter not open".into());
        }
        self.counter = self.counter.wrapping_add(1);
        let len = (dr_length + 7) / 8;
        let third = (len / 3).max(1);
        for i in 0..len.min(data_out.len()) {
            data_out[i] = if i < third {
                // counter-seeded low bytes
                data_in.get(i).copied().unwrap_or(0) ^ (self.counter as u8)
            } else if i < 2 * third {
                // walking-ones middle bytes
                1u8.rotate_left((self.counter.wrapping_add(i as u64) % 8) as u32)
            } else {
                // alternating high bytes
                if (self.counter + i as u64) % 2 == 0 { 0xAA } else { 0x55 }
            };
        }
        Ok(())
    }

    fn read_idcode(&mut self) -> Result<u32, String> {
        if !self.connected {
            return Err("simulator adapter not open".into());
        }
        Ok(FIXED_IDCODE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_idcode_is_fixed() {
        let mut a = SimulatorAdapter::new();
        a.open().unwrap();
        assert_eq!(a.read_idcode().unwrap(), FIXED_IDCODE);
    }

    #[test]
    fn shift_data_32_bits_returns_idcode_bytes() {
        let mut a = SimulatorAdapter::new();
        a.open().unwrap();
        let out = a.shift_data(&[0; 4], 32, true).unwrap();
        assert_eq!(out, FIXED_IDCODE.to_le_bytes().to_vec());
    }

    #[test]
    fn scan_dr_is_deterministic_given_same_counter_state() {
        let mut a = SimulatorAdapter::new();
        a.open().unwrap();
        let mut out1 = vec![0u8; 32];
        a.scan_dr(256, &vec![0u8; 32], &mut out1).unwrap();
        let mut b = SimulatorAdapter::new();
        b.open().unwrap();
        let mut out2 = vec![0u8; 32];
        b.scan_dr(256, &vec![0u8; 32], &mut out2).unwrap();
        assert_eq!(out1, out2);
    }

    #[test]
    fn not_connected_rejects_transactions() {
        let mut a = SimulatorAdapter::new();
        assert!(a.read_idcode().is_err());
    }
}
