//! The scan worker: a cooperative polling loop that owns the engine at
//! runtime and publishes pin snapshots (§4.E).
//!
//! Grounded in `ScanWorker.{h,cpp}`, with one deliberate fix: the original
//! hard-codes the SAMPLE/EXTEST opcodes it switches to (`0x00`/`0x01`, with
//! a `// TODO: obtener opcode desde DeviceModel` comment). This port always
//! resolves them from the device model, the way `ScanController.cpp`'s
//! `enterEXTEST`/`enterSAMPLE` already do correctly (SPEC_FULL §9, Open
//! Question 2).

use crate::device_model::{DeviceModel, UNKNOWN_INSTRUCTION};
use crate::engine::{BoundaryScanEngine, OperationMode, PinLevel};
use crate::error::JtagError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum WorkerEvent {
    PinsUpdated(Vec<PinLevel>),
    Error(JtagError),
    Stopped,
}

const DEFAULT_POLL_MS: u64 = 100;

/// Shared handle the controller holds. The worker thread exclusively owns
/// the engine; the controller only ever touches these atomics/queues and
/// drains the event channel — it never reaches into the engine directly.
pub struct ScanWorkerHandle {
    dirty: Arc<Mutex<HashMap<usize, PinLevel>>>,
    running: Arc<AtomicBool>,
    poll_interval_ms: Arc<AtomicU64>,
    current_mode: Arc<AtomicU8>,
    /// Holds the newest snapshot that couldn't fit in `events` because the
    /// channel was full; a later snapshot simply overwrites it, so the
    /// consumer always ends up with the latest pin state instead of a
    /// stale one.
    pending_snapshot: Arc<Mutex<Option<Vec<PinLevel>>>>,
    events: Receiver<WorkerEvent>,
    thread: Option<JoinHandle<()>>,
}

impl ScanWorkerHandle {
    pub fn spawn(mut engine: BoundaryScanEngine, device_model: Arc<DeviceModel>) -> Self {
        let dirty = Arc::new(Mutex::new(HashMap::new()));
        let running = Arc::new(AtomicBool::new(true));
        let poll_interval_ms = Arc::new(AtomicU64::new(DEFAULT_POLL_MS));
        let current_mode = Arc::new(AtomicU8::new(OperationMode::Sample as u8));
        let pending_snapshot = Arc::new(Mutex::new(None));
        let (tx, rx) = sync_channel::<WorkerEvent>(8);

        let dirty_t = dirty.clone();
        let running_t = running.clone();
        let poll_t = poll_interval_ms.clone();
        let mode_t = current_mode.clone();
        let snapshot_t = pending_snapshot.clone();

        let thread = std::thread::spawn(move || {
            let mut in_extest_mode = false;
            while running_t.load(Ordering::Acquire) {
                tick(
                    &mut engine,
                    &device_model,
                    &dirty_t,
                    &mode_t,
                    &mut in_extest_mode,
                    &tx,
                    &snapshot_t,
                );
                let ms = poll_t.load(Ordering::Relaxed);
                std::thread::sleep(Duration::from_millis(ms));
            }
            let _ = tx.send(WorkerEvent::Stopped);
        });

        ScanWorkerHandle {
            dirty,
            running,
            poll_interval_ms,
            current_mode,
            pending_snapshot,
            events: rx,
            thread: Some(thread),
        }
    }

    pub fn set_pin_async(&self, cell: usize, level: PinLevel) {
        self.dirty.lock().unwrap().insert(cell, level);
    }

    pub fn set_scan_mode(&self, mode: OperationMode) {
        self.current_mode.store(mode as u8, Ordering::Relaxed);
    }

    pub fn set_poll_interval(&self, ms: u64) {
        self.poll_interval_ms.store(ms, Ordering::Relaxed);
    }

    pub fn try_recv_event(&self) -> Option<WorkerEvent> {
        if let Ok(ev) = self.events.try_recv() {
            return Some(ev);
        }
        self.pending_snapshot
            .lock()
            .unwrap()
            .take()
            .map(WorkerEvent::PinsUpdated)
    }

    pub fn stop(mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

fn resolve_opcode(device_model: &DeviceModel, primary: &str, fallback: Option<&str>) -> Option<u32> {
    let op = device_model.instruction(primary);
    if op != UNKNOWN_INSTRUCTION {
        return Some(op);
    }
    fallback.map(|name| device_model.instruction(name)).filter(|op| *op != UNKNOWN_INSTRUCTION)
}

/// Sends an `Error`/`Stopped` event, retrying on a full channel rather than
/// dropping it (per SPEC_FULL §5 / §9's design note on the event channel).
fn emit(tx: &SyncSender<WorkerEvent>, event: WorkerEvent) {
    let mut ev = event;
    loop {
        match tx.try_send(ev) {
            Ok(()) => break,
            Err(TrySendError::Full(back)) => {
                ev = back;
                std::thread::yield_now();
            }
            Err(TrySendError::Disconnected(_)) => break,
        }
    }
}

/// Sends a `PinsUpdated` snapshot. When the channel is full, the snapshot
/// replaces whatever is sitting in `pending_snapshot` instead of being
/// dropped — the consumer always observes the newest pin state.
fn emit_snapshot(
    tx: &SyncSender<WorkerEvent>,
    pending_snapshot: &Arc<Mutex<Option<Vec<PinLevel>>>>,
    snapshot: Vec<PinLevel>,
) {
    match tx.try_send(WorkerEvent::PinsUpdated(snapshot)) {
        Ok(()) => {}
        Err(TrySendError::Full(WorkerEvent::PinsUpdated(snap))) => {
            *pending_snapshot.lock().unwrap() = Some(snap);
        }
        Err(TrySendError::Full(_)) => unreachable!("only PinsUpdated is ever passed here"),
        Err(TrySendError::Disconnected(_)) => {}
    }
}

/// Runs the full safe EXTEST-entry sequence (§4.D): load SAMPLE/PRELOAD
/// (falling back to SAMPLE), sample the chain, preload the BSR update
/// latch, then load EXTEST and switch the operation mode. Mirrors
/// `controller.rs`'s `initialize()`/`enter_extest()` so the worker's own
/// re-entry path gets the same protection at runtime.
fn enter_extest_safely(
    engine: &mut BoundaryScanEngine,
    device_model: &DeviceModel,
    tx: &SyncSender<WorkerEvent>,
) {
    if let Some(opcode) = resolve_opcode(device_model, "SAMPLE", Some("SAMPLE/PRELOAD")) {
        if let Err(e) = engine.load_instruction(opcode, device_model.ir_length) {
            emit(tx, WorkerEvent::Error(e));
        }
        engine.operation_mode = OperationMode::Sample;
    }
    if let Err(e) = engine.sample_pins() {
        emit(tx, WorkerEvent::Error(e));
    }
    if let Err(e) = engine.preload_bsr() {
        emit(tx, WorkerEvent::Error(e));
    }
    if let Some(opcode) = resolve_opcode(device_model, "EXTEST", None) {
        if let Err(e) = engine.load_instruction(opcode, device_model.ir_length) {
            emit(tx, WorkerEvent::Error(e));
        }
        engine.operation_mode = OperationMode::Extest;
    }
}

fn tick(
    engine: &mut BoundaryScanEngine,
    device_model: &DeviceModel,
    dirty: &Arc<Mutex<HashMap<usize, PinLevel>>>,
    mode: &Arc<AtomicU8>,
    in_extest_mode: &mut bool,
    tx: &SyncSender<WorkerEvent>,
    pending_snapshot: &Arc<Mutex<Option<Vec<PinLevel>>>>,
) {
    let current_mode = OperationMode::from_u8(mode.load(Ordering::Relaxed));

    let pending: HashMap<usize, PinLevel> = {
        let mut guard = dirty.lock().unwrap();
        std::mem::take(&mut *guard)
    };

    if !pending.is_empty() {
        if !*in_extest_mode {
            enter_extest_safely(engine, device_model, tx);
            *in_extest_mode = true;
        }
        for (cell, level) in pending {
            if let Err(e) = engine.set_pin(cell, level) {
                emit(tx, WorkerEvent::Error(e));
            }
        }
        if let Err(e) = engine.apply_changes() {
            emit(tx, WorkerEvent::Error(e));
        }
    } else if *in_extest_mode && current_mode == OperationMode::Sample {
        if let Some(opcode) = resolve_opcode(device_model, "SAMPLE", Some("SAMPLE/PRELOAD")) {
            if let Err(e) = engine.load_instruction(opcode, device_model.ir_length) {
                emit(tx, WorkerEvent::Error(e));
            }
            engine.operation_mode = OperationMode::Sample;
            *in_extest_mode = false;
        }
    }

    if let Err(e) = engine.sample_pins() {
        emit(tx, WorkerEvent::Error(e));
        std::thread::sleep(Duration::from_secs(1));
        return;
    }

    let snapshot: Vec<PinLevel> = (0..engine.bsr_length())
        .map(|cell| engine.get_pin(cell).unwrap_or(PinLevel::HighZ))
        .collect();
    emit_snapshot(tx, pending_snapshot, snapshot);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::simulator::SimulatorAdapter;
    use crate::bsdl::BsdlData;
    use std::collections::HashMap as Map;

    fn test_device_model() -> DeviceModel {
        let mut data = BsdlData::default();
        data.bsr_length = 32;
        data.ir_length = 8;
        let mut instr = Map::new();
        instr.insert(
            "SAMPLE".to_string(),
            crate::bsdl::Instruction {
                name: "SAMPLE".to_string(),
                opcodes: vec!["00000001".to_string()],
            },
        );
        instr.insert(
            "EXTEST".to_string(),
            crate::bsdl::Instruction {
                name: "EXTEST".to_string(),
                opcodes: vec!["00000000".to_string()],
            },
        );
        data.instructions = instr;
        DeviceModel::from_bsdl(&data)
    }

    #[test]
    fn worker_tick_produces_a_snapshot() {
        let mut adapter = SimulatorAdapter::new();
        adapter.open().unwrap();
        let mut engine = BoundaryScanEngine::new(Box::new(adapter), 32);
        let model = test_device_model();
        let dirty = Arc::new(Mutex::new(HashMap::new()));
        let mode = Arc::new(AtomicU8::new(OperationMode::Sample as u8));
        let (tx, rx) = sync_channel(8);
        let pending_snapshot = Arc::new(Mutex::new(None));
        let mut in_extest = false;

        tick(&mut engine, &model, &dirty, &mode, &mut in_extest, &tx, &pending_snapshot);

        match rx.try_recv() {
            Ok(WorkerEvent::PinsUpdated(snapshot)) => assert_eq!(snapshot.len(), 32),
            other => panic!("expected PinsUpdated, got {:?}", other),
        }
    }

    #[test]
    fn dirty_pins_trigger_extest_entry() {
        let mut adapter = SimulatorAdapter::new();
        adapter.open().unwrap();
        let mut engine = BoundaryScanEngine::new(Box::new(adapter), 32);
        let model = test_device_model();
        let dirty = Arc::new(Mutex::new(HashMap::new()));
        dirty.lock().unwrap().insert(0, PinLevel::High);
        let mode = Arc::new(AtomicU8::new(OperationMode::Sample as u8));
        let (tx, _rx) = sync_channel(8);
        let pending_snapshot = Arc::new(Mutex::new(None));
        let mut in_extest = false;

        tick(&mut engine, &model, &dirty, &mode, &mut in_extest, &tx, &pending_snapshot);

        assert!(in_extest);
        assert_eq!(engine.operation_mode, OperationMode::Extest);
    }

    #[test]
    fn full_channel_overflows_into_pending_snapshot_slot() {
        let (tx, rx) = sync_channel(1);
        let pending_snapshot = Arc::new(Mutex::new(None));

        // Fill the channel's one slot.
        tx.try_send(WorkerEvent::Stopped).unwrap();

        emit_snapshot(&tx, &pending_snapshot, vec![PinLevel::Low; 4]);
        emit_snapshot(&tx, &pending_snapshot, vec![PinLevel::High; 4]);

        assert!(matches!(rx.try_recv(), Ok(WorkerEvent::Stopped)));
        assert_eq!(
            pending_snapshot.lock().unwrap().clone(),
            Some(vec![PinLevel::High; 4])
        );
    }
}
