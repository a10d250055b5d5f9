pub mod adapter;
pub mod bsdl;
pub mod controller;
pub mod device_model;
pub mod engine;
pub mod error;
pub mod tap;
pub mod worker;

pub use controller::JtagController;
pub use device_model::{DeviceModel, PinInfo};
pub use engine::{BoundaryScanEngine, OperationMode, PinLevel};
pub use error::{JtagError, JtagResult};
pub use tap::TapState;
pub use worker::{ScanWorkerHandle, WorkerEvent};
