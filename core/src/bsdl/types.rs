//! Data types produced by the BSDL parser.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    In,
    Out,
    InOut,
    Buffer,
    Linkage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    pub name: String,
    pub direction: PortDirection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instruction {
    pub name: String,
    pub opcodes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellFunction {
    Input,
    Clock,
    Output2,
    Output3,
    Bidir,
    Control,
    Internal,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafeBit {
    Low,
    High,
    DontCare,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryCell {
    pub cell_number: usize,
    pub cell_type: String,
    pub port_name: String,
    pub function: CellFunction,
    pub safe_value: SafeBit,
    /// Index of the cell that enables this one, or `None` if `*`.
    pub control_cell: Option<usize>,
    pub disable_value: SafeBit,
}

/// TAP signal port names extracted from the `TAP_SCAN_*` attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TapSignals {
    pub tck: Option<String>,
    pub tms: Option<String>,
    pub tdi: Option<String>,
    pub tdo: Option<String>,
    pub trst: Option<String>,
}

/// Parsed BSDL content. Produced once by [`crate::bsdl::parse`] and owned by
/// the caller until it is consumed by [`crate::device_model::DeviceModel::from_bsdl`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BsdlData {
    pub entity_name: String,
    pub package_name: String,
    pub id_code: u32,
    pub ir_length: usize,
    pub bsr_length: usize,
    pub ports: Vec<Port>,
    /// Logical port name -> one or more physical pad identifiers.
    pub pin_maps: HashMap<String, Vec<String>>,
    /// Instruction name -> its declared opcode strings (first one wins ties).
    pub instructions: HashMap<String, Instruction>,
    pub boundary_cells: Vec<BoundaryCell>,
    pub tap: TapSignals,
}

impl Default for PortDirection {
    fn default() -> Self {
        PortDirection::In
    }
}
