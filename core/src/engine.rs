//! Boundary scan engine: dual-buffer BSR management and TAP navigation on
//! top of an adapter (§4.D).

use crate::adapter::JtagAdapter;
use crate::error::{JtagError, JtagResult};
use crate::tap::{next_state, path, TapState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinLevel {
    Low,
    High,
    HighZ,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum OperationMode {
    Sample = 0,
    Extest = 1,
    Intest = 2,
    Bypass = 3,
}

impl OperationMode {
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => OperationMode::Extest,
            2 => OperationMode::Intest,
            3 => OperationMode::Bypass,
            _ => OperationMode::Sample,
        }
    }
}

pub struct BoundaryScanEngine {
    adapter: Box<dyn JtagAdapter>,
    state: TapState,
    bsr_length: usize,
    /// Desired (TDI-side) values, driven into the chain.
    bsr: Vec<u8>,
    /// Last captured (TDO-side) values.
    bsr_capture: Vec<u8>,
    pub operation_mode: OperationMode,
}

fn byte_len(bits: usize) -> usize {
    (bits + 7) / 8
}

impl BoundaryScanEngine {
    pub fn new(adapter: Box<dyn JtagAdapter>, bsr_length: usize) -> Self {
        let len = byte_len(bsr_length);
        BoundaryScanEngine {
            adapter,
            state: TapState::TestLogicReset,
            bsr_length,
            bsr: vec![0u8; len],
            bsr_capture: vec![0u8; len],
            operation_mode: OperationMode::Sample,
        }
    }

    pub fn set_bsr_length(&mut self, bsr_length: usize) {
        let len = byte_len(bsr_length);
        self.bsr_length = bsr_length;
        self.bsr = vec![0u8; len];
        self.bsr_capture = vec![0u8; len];
    }

    pub fn bsr_length(&self) -> usize {
        self.bsr_length
    }

    pub fn state(&self) -> TapState {
        self.state
    }

    pub fn reset(&mut self) -> JtagResult<()> {
        self.adapter
            .reset_tap()
            .map_err(|reason| JtagError::TransactionFailed {
                operation: "resetTAP".into(),
                reason,
            })?;
        self.state = TapState::TestLogicReset;
        Ok(())
    }

    /// Drives 5x TMS=1 then 1x TMS=0: guarantees RUN_TEST_IDLE regardless of
    /// prior state, even if it is unknown.
    pub fn reset_jtag_state_machine(&mut self) -> JtagResult<()> {
        let bits = [true, true, true, true, true, false];
        self.adapter
            .write_tms(&bits)
            .map_err(|reason| JtagError::TransactionFailed {
                operation: "writeTMS".into(),
                reason,
            })?;
        self.state = TapState::RunTestIdle;
        Ok(())
    }

    pub fn goto_state(&mut self, target: TapState) -> JtagResult<()> {
        if self.state == target {
            return Ok(());
        }
        let bits = path(self.state, target);
        self.adapter
            .write_tms(&bits)
            .map_err(|reason| JtagError::TransactionFailed {
                operation: "writeTMS".into(),
                reason,
            })?;
        self.state = target;
        Ok(())
    }

    pub fn load_instruction(&mut self, opcode: u32, ir_length: usize) -> JtagResult<()> {
        let opcode_bytes = opcode.to_le_bytes();
        let mut data_in = vec![0u8; byte_len(ir_length)];
        let copy_len = data_in.len().min(opcode_bytes.len());
        data_in[..copy_len].copy_from_slice(&opcode_bytes[..copy_len]);
        let mut data_out = vec![0u8; byte_len(ir_length)];
        self.adapter
            .scan_ir(ir_length, &data_in, &mut data_out)
            .map_err(|reason| JtagError::TransactionFailed {
                operation: "scanIR".into(),
                reason,
            })?;
        self.state = TapState::RunTestIdle;
        Ok(())
    }

    pub fn read_idcode(&mut self) -> JtagResult<u32> {
        let code = self
            .adapter
            .read_idcode()
            .map_err(|reason| JtagError::TransactionFailed {
                operation: "readIDCODE".into(),
                reason,
            })?;
        self.state = TapState::RunTestIdle;
        Ok(code)
    }

    pub fn run_test_cycles(&mut self, n: usize) -> JtagResult<()> {
        self.goto_state(TapState::RunTestIdle)?;
        if n == 0 {
            return Ok(());
        }
        let bits = vec![false; n];
        self.adapter
            .write_tms(&bits)
            .map_err(|reason| JtagError::TransactionFailed {
                operation: "writeTMS".into(),
                reason,
            })?;
        Ok(())
    }

    fn check_cell(&self, cell: usize) -> JtagResult<()> {
        if cell >= self.bsr_length {
            return Err(JtagError::OutOfRangeCell {
                cell,
                bsr_length: self.bsr_length,
            });
        }
        Ok(())
    }

    pub fn set_pin(&mut self, cell: usize, level: PinLevel) -> JtagResult<()> {
        self.check_cell(cell)?;
        set_bit(&mut self.bsr, cell, level == PinLevel::High);
        Ok(())
    }

    pub fn get_pin(&self, cell: usize) -> JtagResult<PinLevel> {
        self.check_cell(cell)?;
        Ok(get_bit_level(&self.bsr, cell))
    }

    pub fn get_pin_readback(&self, cell: usize) -> JtagResult<PinLevel> {
        self.check_cell(cell)?;
        Ok(get_bit_level(&self.bsr_capture, cell))
    }

    /// Scans DR with `bsr` as TDI; stores TDO in `bsr_capture`. `bsr` is
    /// never overwritten.
    pub fn apply_changes(&mut self) -> JtagResult<()> {
        let data_in = self.bsr.clone();
        let mut data_out = vec![0u8; self.bsr.len()];
        self.adapter
            .scan_dr(self.bsr_length, &data_in, &mut data_out)
            .map_err(|reason| JtagError::TransactionFailed {
                operation: "scanDR".into(),
                reason,
            })?;
        self.bsr_capture = data_out;
        self.state = TapState::RunTestIdle;
        Ok(())
    }

    /// Scans DR, always stores TDO in `bsr_capture`; also overwrites `bsr`
    /// when the current operation mode is read-only (SAMPLE or BYPASS) so
    /// user edits made in EXTEST/INTEST survive sampling.
    pub fn sample_pins(&mut self) -> JtagResult<()> {
        let data_in = self.bsr.clone();
        let mut data_out = vec![0u8; self.bsr.len()];
        self.adapter
            .scan_dr(self.bsr_length, &data_in, &mut data_out)
            .map_err(|reason| JtagError::TransactionFailed {
                operation: "scanDR".into(),
                reason,
            })?;
        self.bsr_capture = data_out.clone();
        if matches!(self.operation_mode, OperationMode::Sample | OperationMode::Bypass) {
            self.bsr = data_out;
        }
        self.state = TapState::RunTestIdle;
        Ok(())
    }

    /// Scans DR to prime the update latch without disturbing `bsr` (used
    /// during the SAMPLE/PRELOAD step of the safe EXTEST entry sequence).
    pub fn preload_bsr(&mut self) -> JtagResult<()> {
        let data_in = self.bsr.clone();
        let mut data_out = vec![0u8; self.bsr.len()];
        self.adapter
            .scan_dr(self.bsr_length, &data_in, &mut data_out)
            .map_err(|reason| JtagError::TransactionFailed {
                operation: "scanDR".into(),
                reason,
            })?;
        self.bsr_capture = data_out;
        self.state = TapState::RunTestIdle;
        Ok(())
    }

    pub fn set_bsr(&mut self, bytes: &[u8]) -> JtagResult<()> {
        if bytes.len() != self.bsr.len() {
            return Err(JtagError::TransactionFailed {
                operation: "setBSR".into(),
                reason: format!(
                    "expected {} bytes, got {}",
                    self.bsr.len(),
                    bytes.len()
                ),
            });
        }
        self.bsr.copy_from_slice(bytes);
        Ok(())
    }

    pub fn is_no_target_detected(&self) -> bool {
        !self.bsr.is_empty() && self.bsr.iter().all(|b| *b == 0xFF)
    }
}

fn set_bit(buf: &mut [u8], cell: usize, high: bool) {
    let byte = cell / 8;
    let bit = cell % 8;
    if high {
        buf[byte] |= 1 << bit;
    } else {
        buf[byte] &= !(1 << bit);
    }
}

fn get_bit_level(buf: &[u8], cell: usize) -> PinLevel {
    let byte = cell / 8;
    let bit = cell % 8;
    if (buf[byte] >> bit) & 1 == 1 {
        PinLevel::High
    } else {
        PinLevel::Low
    }
}

// `next_state` is re-exported for callers that step the TAP manually
// (e.g. the worker's idle-cycle bookkeeping).
pub use crate::tap::TapState as EngineTapState;
pub fn step(state: TapState, tms: bool) -> TapState {
    next_state(state, tms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::simulator::SimulatorAdapter;

    fn engine(bsr_length: usize) -> BoundaryScanEngine {
        let adapter = Box::new(SimulatorAdapter::new());
        BoundaryScanEngine::new(adapter, bsr_length)
    }

    #[test]
    fn set_and_get_pin_roundtrip() {
        let mut e = engine(16);
        e.set_pin(3, PinLevel::High).unwrap();
        assert_eq!(e.get_pin(3).unwrap(), PinLevel::High);
        e.set_pin(3, PinLevel::Low).unwrap();
        assert_eq!(e.get_pin(3).unwrap(), PinLevel::Low);
    }

    #[test]
    fn set_pin_does_not_disturb_other_cells() {
        let mut e = engine(16);
        e.set_pin(1, PinLevel::High).unwrap();
        e.set_pin(2, PinLevel::High).unwrap();
        assert_eq!(e.get_pin(1).unwrap(), PinLevel::High);
        e.set_pin(1, PinLevel::Low).unwrap();
        assert_eq!(e.get_pin(2).unwrap(), PinLevel::High);
    }

    #[test]
    fn extest_preserves_bsr_on_sample() {
        let mut e = engine(256);
        e.adapter.open().unwrap();
        e.operation_mode = OperationMode::Extest;
        e.set_pin(4, PinLevel::High).unwrap();
        e.apply_changes().unwrap();
        e.sample_pins().unwrap();
        assert_eq!(e.get_pin(4).unwrap(), PinLevel::High);
    }

    #[test]
    fn sample_mode_fuses_capture_into_bsr() {
        let mut e = engine(256);
        e.adapter.open().unwrap();
        e.operation_mode = OperationMode::Sample;
        e.sample_pins().unwrap();
        for cell in 0..256 {
            assert_eq!(e.get_pin(cell).unwrap(), e.get_pin_readback(cell).unwrap());
        }
    }

    #[test]
    fn no_target_detection() {
        let mut e = engine(8);
        assert!(!e.is_no_target_detected());
        e.set_bsr(&[0xFF]).unwrap();
        assert!(e.is_no_target_detected());
        e.set_bsr(&[0xFE]).unwrap();
        assert!(!e.is_no_target_detected());
    }

    #[test]
    fn out_of_range_cell_is_rejected() {
        let mut e = engine(8);
        assert!(matches!(
            e.set_pin(100, PinLevel::High),
            Err(JtagError::OutOfRangeCell { .. })
        ));
    }
}
