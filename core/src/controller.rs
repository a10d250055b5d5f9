//! Controller façade (§4.G): the single entry point a UI (or the CLI demo
//! harness) uses to drive a device. Grounded in `ScanController.{h,cpp}` for
//! the operation sequence, and in `core/src/scripting.rs`'s `OpenFlash`
//! struct for the Rust-idiom facade shape (an `Option`-held connection plus
//! `connect`/`connect_with_config`-style entry points).

use crate::adapter::{factory, AdapterDescriptor, AdapterType};
use crate::bsdl;
use crate::device_model::DeviceModel;
use crate::engine::{BoundaryScanEngine, OperationMode, PinLevel};
use crate::error::{JtagError, JtagResult};
use crate::worker::{ScanWorkerHandle, WorkerEvent};
use std::path::Path;
use std::sync::Arc;

/// A mock device model auto-provisioned when connecting to the simulator
/// backend without a BSDL file, matching `ScanController::createMockDeviceModel`.
fn mock_device_model() -> DeviceModel {
    let mut data = bsdl::BsdlData {
        entity_name: "MOCK_DEVICE".to_string(),
        bsr_length: 256,
        ir_length: 8,
        ..Default::default()
    };
    for i in 0..32 {
        data.ports.push(bsdl::Port {
            name: format!("P{}", i),
            direction: bsdl::PortDirection::InOut,
        });
    }
    data.instructions.insert(
        "SAMPLE".to_string(),
        bsdl::Instruction {
            name: "SAMPLE".to_string(),
            opcodes: vec!["00000001".to_string()],
        },
    );
    data.instructions.insert(
        "EXTEST".to_string(),
        bsdl::Instruction {
            name: "EXTEST".to_string(),
            opcodes: vec!["00000000".to_string()],
        },
    );
    data.instructions.insert(
        "BYPASS".to_string(),
        bsdl::Instruction {
            name: "BYPASS".to_string(),
            opcodes: vec!["11111111".to_string()],
        },
    );
    DeviceModel::from_bsdl(&data)
}

pub struct JtagController {
    adapter_type: Option<AdapterType>,
    device_model: Option<Arc<DeviceModel>>,
    engine: Option<BoundaryScanEngine>,
    worker: Option<ScanWorkerHandle>,
}

impl JtagController {
    pub fn new() -> Self {
        JtagController {
            adapter_type: None,
            device_model: None,
            engine: None,
            worker: None,
        }
    }

    pub fn available_adapters() -> Vec<AdapterDescriptor> {
        factory::get_available_adapters()
    }

    /// Opens the given backend; for `Mock`, also auto-provisions a device
    /// model so the UI has something to show before a BSDL is loaded.
    pub fn connect_adapter(&mut self, adapter_type: AdapterType) -> JtagResult<()> {
        self.connect_adapter_with_id(adapter_type, None)
    }

    /// Like [`Self::connect_adapter`], but forwards `device_id` to the
    /// factory (a serial port path for `Pico`, a USB serial number for
    /// `JLink`).
    pub fn connect_adapter_with_id(
        &mut self,
        adapter_type: AdapterType,
        device_id: Option<&str>,
    ) -> JtagResult<()> {
        let mut adapter = match device_id {
            Some(id) => factory::create_with_device_id(adapter_type, id)?,
            None => factory::create(adapter_type)?,
        };
        adapter.open().map_err(|reason| JtagError::AdapterUnavailable {
            adapter: adapter_type.to_str().to_string(),
            reason,
        })?;
        self.adapter_type = Some(adapter_type);

        let model = if adapter_type == AdapterType::Mock {
            Arc::new(mock_device_model())
        } else {
            self.device_model.clone().unwrap_or_else(|| Arc::new(mock_device_model()))
        };
        self.engine = Some(BoundaryScanEngine::new(adapter, model.bsr_length));
        self.device_model = Some(model);
        Ok(())
    }

    pub fn load_bsdl(&mut self, path: &Path) -> JtagResult<()> {
        let data = bsdl::parse_file(path)?;
        let model = Arc::new(DeviceModel::from_bsdl(&data));
        if let Some(engine) = &mut self.engine {
            engine.set_bsr_length(model.bsr_length);
        }
        self.device_model = Some(model);
        Ok(())
    }

    fn engine_mut(&mut self) -> JtagResult<&mut BoundaryScanEngine> {
        self.engine.as_mut().ok_or_else(|| JtagError::AdapterUnavailable {
            adapter: "none".to_string(),
            reason: "no adapter connected".to_string(),
        })
    }

    fn device_model(&self) -> JtagResult<&DeviceModel> {
        self.device_model
            .as_deref()
            .ok_or_else(|| JtagError::AdapterUnavailable {
                adapter: "none".to_string(),
                reason: "no device model loaded".to_string(),
            })
    }

    /// The safe EXTEST entry sequence: SAMPLE/PRELOAD (falling back to
    /// SAMPLE) -> samplePins -> preloadBSR -> EXTEST, then construct and
    /// start the worker (not yet polling in any particular mode until the
    /// caller picks one).
    pub fn initialize(&mut self) -> JtagResult<()> {
        self.engine_mut()?.reset()?;
        self.enter_sample()?;
        {
            let engine = self.engine_mut()?;
            engine.sample_pins()?;
            engine.preload_bsr()?;
        }
        self.enter_extest()?;

        let engine = self.engine.take().ok_or_else(|| JtagError::AdapterUnavailable {
            adapter: "none".to_string(),
            reason: "engine missing during worker spawn".to_string(),
        })?;
        let model = self.device_model.clone().ok_or_else(|| JtagError::AdapterUnavailable {
            adapter: "none".to_string(),
            reason: "device model missing during worker spawn".to_string(),
        })?;
        self.worker = Some(ScanWorkerHandle::spawn(engine, model));
        Ok(())
    }

    fn load_and_set_mode(&mut self, instruction: &str, fallback: Option<&str>, mode: OperationMode) -> JtagResult<()> {
        let dm = self.device_model()?;
        let mut opcode = dm.instruction(instruction);
        if opcode == crate::device_model::UNKNOWN_INSTRUCTION {
            if let Some(fb) = fallback {
                opcode = dm.instruction(fb);
            }
        }
        if opcode == crate::device_model::UNKNOWN_INSTRUCTION {
            return Err(JtagError::UnknownPin {
                name: instruction.to_string(),
            });
        }
        let ir_length = dm.ir_length;
        let engine = self.engine_mut()?;
        engine.load_instruction(opcode, ir_length)?;
        engine.operation_mode = mode;
        Ok(())
    }

    pub fn enter_sample(&mut self) -> JtagResult<()> {
        self.load_and_set_mode("SAMPLE", Some("SAMPLE/PRELOAD"), OperationMode::Sample)
    }

    pub fn enter_extest(&mut self) -> JtagResult<()> {
        self.load_and_set_mode("EXTEST", None, OperationMode::Extest)
    }

    pub fn enter_intest(&mut self) -> JtagResult<()> {
        self.load_and_set_mode("INTEST", None, OperationMode::Intest)
    }

    pub fn enter_bypass(&mut self) -> JtagResult<()> {
        self.load_and_set_mode("BYPASS", None, OperationMode::Bypass)
    }

    fn resolve_pin(&self, name: &str) -> JtagResult<crate::device_model::PinInfo> {
        self.device_model()?
            .pin(name)
            .cloned()
            .ok_or_else(|| JtagError::UnknownPin { name: name.to_string() })
    }

    /// Direct (synchronous) pin read/write, used before the worker is
    /// running. Reads the input cell from the capture buffer if present,
    /// else the output cell from the desired buffer.
    pub fn get_pin(&mut self, name: &str) -> JtagResult<PinLevel> {
        let pin = self.resolve_pin(name)?;
        let engine = self.engine_mut()?;
        if let Some(cell) = pin.input_cell {
            engine.get_pin_readback(cell)
        } else if let Some(cell) = pin.output_cell {
            engine.get_pin(cell)
        } else {
            Err(JtagError::UnknownPin { name: name.to_string() })
        }
    }

    pub fn set_pin(&mut self, name: &str, level: PinLevel) -> JtagResult<()> {
        let pin = self.resolve_pin(name)?;
        let Some(cell) = pin.output_cell else {
            return Err(JtagError::UnknownPin { name: name.to_string() });
        };
        self.engine_mut()?.set_pin(cell, level)
    }

    /// Queue a pin write for the worker to apply on its next tick
    /// (thread-safe; requires the worker to be running).
    pub fn set_pin_async(&self, name: &str, level: PinLevel) -> JtagResult<()> {
        let pin = self.resolve_pin(name)?;
        let Some(cell) = pin.output_cell else {
            return Err(JtagError::UnknownPin { name: name.to_string() });
        };
        let worker = self.worker.as_ref().ok_or_else(|| JtagError::AdapterUnavailable {
            adapter: "none".to_string(),
            reason: "worker not running".to_string(),
        })?;
        worker.set_pin_async(cell, level);
        Ok(())
    }

    /// Writes `value` across `pin_names`, treating `pin_names[0]` as the
    /// least-significant bit, then applies all of them in one transaction.
    pub fn write_bus(&mut self, pin_names: &[&str], value: u64) -> JtagResult<()> {
        for (i, name) in pin_names.iter().enumerate() {
            let bit = (value >> i) & 1 == 1;
            self.set_pin(name, if bit { PinLevel::High } else { PinLevel::Low })?;
        }
        self.engine_mut()?.apply_changes()
    }

    pub fn is_no_target_detected(&self) -> bool {
        self.engine.as_ref().map(|e| e.is_no_target_detected()).unwrap_or(true)
    }

    pub fn set_scan_mode(&self, mode: OperationMode) {
        if let Some(w) = &self.worker {
            w.set_scan_mode(mode);
        }
    }

    pub fn set_poll_interval_ms(&self, ms: u64) {
        if let Some(w) = &self.worker {
            w.set_poll_interval(ms);
        }
    }

    pub fn try_recv_event(&self) -> Option<WorkerEvent> {
        self.worker.as_ref().and_then(|w| w.try_recv_event())
    }

    pub fn stop_polling(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop();
        }
    }
}

impl Default for JtagController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_mock_auto_provisions_device_model() {
        let mut ctrl = JtagController::new();
        ctrl.connect_adapter(AdapterType::Mock).unwrap();
        assert!(ctrl.device_model.is_some());
        assert_eq!(ctrl.device_model.as_ref().unwrap().bsr_length, 256);
    }

    #[test]
    fn initialize_starts_worker_in_extest() {
        let mut ctrl = JtagController::new();
        ctrl.connect_adapter(AdapterType::Mock).unwrap();
        ctrl.initialize().unwrap();
        assert!(ctrl.worker.is_some());
        ctrl.stop_polling();
    }

    #[test]
    fn write_bus_decomposes_lsb_first() {
        let mut ctrl = JtagController::new();
        ctrl.connect_adapter(AdapterType::Mock).unwrap();
        let pins = ["P0", "P1", "P2", "P3"];
        ctrl.write_bus(&pins, 0b1010).unwrap();
        assert_eq!(ctrl.get_pin("P0").unwrap(), PinLevel::Low);
        assert_eq!(ctrl.get_pin("P1").unwrap(), PinLevel::High);
        assert_eq!(ctrl.get_pin("P2").unwrap(), PinLevel::Low);
        assert_eq!(ctrl.get_pin("P3").unwrap(), PinLevel::High);
    }
}
