//! The device model: per-pin BSR cell bookkeeping and instruction opcodes
//! built from parsed BSDL data.

use crate::bsdl::{BsdlData, CellFunction, PortDirection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sentinel returned by [`DeviceModel::instruction`] for a name with no
/// matching opcode, mirroring the original's missing-instruction return.
pub const UNKNOWN_INSTRUCTION: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinInfo {
    pub name: String,
    pub port: String,
    /// Normalized port type: "input" | "output" | "inout" | "linkage" | "unknown".
    pub pin_type: String,
    pub pin_number: Option<String>,
    pub input_cell: Option<usize>,
    pub output_cell: Option<usize>,
    pub control_cell: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceModel {
    pub device_name: String,
    pub id_code: u32,
    pub bsr_length: usize,
    pub ir_length: usize,
    pub package_info: String,
    pub pins: Vec<PinInfo>,
    instructions: HashMap<String, u32>,
}

fn normalize_type(direction: PortDirection) -> &'static str {
    match direction {
        PortDirection::Linkage => "linkage",
        PortDirection::In => "input",
        PortDirection::Out | PortDirection::Buffer => "output",
        PortDirection::InOut => "inout",
    }
}

impl DeviceModel {
    /// Build a device model from parsed BSDL data (§4.B).
    pub fn from_bsdl(data: &BsdlData) -> Self {
        let mut instructions = HashMap::new();
        for (name, instr) in &data.instructions {
            let Some(raw) = instr.opcodes.first() else {
                continue;
            };
            let binary: String = raw.chars().map(|c| if c == 'X' { '0' } else { c }).collect();
            if let Ok(value) = u32::from_str_radix(&binary, 2) {
                instructions.insert(name.clone(), value);
            }
        }

        let mut pins: HashMap<String, PinInfo> = HashMap::new();
        for port in &data.ports {
            let pin_number = data
                .pin_maps
                .get(&port.name)
                .and_then(|v| v.first().cloned());
            pins.insert(
                port.name.clone(),
                PinInfo {
                    name: port.name.clone(),
                    port: port.name.clone(),
                    pin_type: normalize_type(port.direction).to_string(),
                    pin_number,
                    input_cell: None,
                    output_cell: None,
                    control_cell: None,
                },
            );
        }

        for cell in &data.boundary_cells {
            if cell.port_name == "*" {
                continue;
            }
            let Some(pin) = pins.get_mut(&cell.port_name) else {
                continue;
            };
            match cell.function {
                CellFunction::Input | CellFunction::Clock => {
                    pin.input_cell = Some(cell.cell_number);
                }
                CellFunction::Output2 | CellFunction::Output3 => {
                    pin.output_cell = Some(cell.cell_number);
                    if let Some(ctrl) = cell.control_cell {
                        pin.control_cell = Some(ctrl);
                    }
                }
                CellFunction::Bidir => {
                    if pin.input_cell.is_none() {
                        pin.input_cell = Some(cell.cell_number);
                    } else {
                        pin.output_cell = Some(cell.cell_number);
                    }
                    if let Some(ctrl) = cell.control_cell {
                        pin.control_cell = Some(ctrl);
                    }
                }
                CellFunction::Control | CellFunction::Internal | CellFunction::Unknown => {}
            }
        }

        let mut pin_list: Vec<PinInfo> = pins.into_values().collect();
        pin_list.sort_by(|a, b| compare_pins(a, b));

        log::debug!(
            "device model '{}' built: {} pins, {} bsr cells",
            data.entity_name,
            pin_list.len(),
            data.bsr_length
        );

        DeviceModel {
            device_name: data.entity_name.clone(),
            id_code: data.id_code,
            bsr_length: data.bsr_length,
            ir_length: data.ir_length,
            package_info: data.package_name.clone(),
            pins: pin_list,
            instructions,
        }
    }

    /// Opcode for `name`, or [`UNKNOWN_INSTRUCTION`] if absent.
    pub fn instruction(&self, name: &str) -> u32 {
        self.instructions.get(name).copied().unwrap_or(UNKNOWN_INSTRUCTION)
    }

    pub fn has_instruction(&self, name: &str) -> bool {
        self.instructions.contains_key(name)
    }

    pub fn pin(&self, name: &str) -> Option<&PinInfo> {
        self.pins.iter().find(|p| p.name == name)
    }
}

fn compare_pins(a: &PinInfo, b: &PinInfo) -> std::cmp::Ordering {
    match (&a.pin_number, &b.pin_number) {
        (Some(x), Some(y)) => alphanumeric_compare(x, y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a.name.cmp(&b.name),
    }
}

/// Single-pass alphanumeric comparator: one leading alphabetic run compared
/// lexicographically, then one following numeric run compared as an
/// integer. Falls back to plain lexicographic ordering when either side has
/// no parseable leading alpha/digit run (see SPEC_FULL §9, Open Question 3 —
/// the original's multi-segment regex loop is deliberately not reproduced).
pub fn alphanumeric_compare(a: &str, b: &str) -> std::cmp::Ordering {
    let (a_alpha, a_rest) = split_leading_alpha(a);
    let (b_alpha, b_rest) = split_leading_alpha(b);

    if a_alpha.is_empty() || b_alpha.is_empty() {
        return a.cmp(b);
    }

    match a_alpha.cmp(b_alpha) {
        std::cmp::Ordering::Equal => {}
        other => return other,
    }

    let a_num = leading_digits(a_rest);
    let b_num = leading_digits(b_rest);
    match (a_num, b_num) {
        (Some(x), Some(y)) => x.cmp(&y).then_with(|| a_rest.cmp(b_rest)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => a_rest.cmp(b_rest),
    }
}

fn split_leading_alpha(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_alphabetic()).unwrap_or(s.len());
    (&s[..end], &s[end..])
}

fn leading_digits(s: &str) -> Option<u64> {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        None
    } else {
        s[..end].parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alphanumeric_orders_by_numeric_suffix() {
        let mut v = vec!["A10", "A2", "A1", "B1", "A11"];
        v.sort_by(|a, b| alphanumeric_compare(a, b));
        assert_eq!(v, vec!["A1", "A2", "A10", "A11", "B1"]);
    }

    #[test]
    fn alphanumeric_prefers_alpha_prefix() {
        assert_eq!(alphanumeric_compare("AA1", "B1"), std::cmp::Ordering::Less);
    }

    #[test]
    fn bidir_port_fills_input_then_output() {
        use crate::bsdl::{BoundaryCell, Port, SafeBit};
        let mut data = BsdlData::default();
        data.ports.push(Port {
            name: "IO0".to_string(),
            direction: PortDirection::InOut,
        });
        data.boundary_cells.push(BoundaryCell {
            cell_number: 0,
            cell_type: "BC_1".to_string(),
            port_name: "IO0".to_string(),
            function: CellFunction::Bidir,
            safe_value: SafeBit::DontCare,
            control_cell: None,
            disable_value: SafeBit::DontCare,
        });
        data.boundary_cells.push(BoundaryCell {
            cell_number: 1,
            cell_type: "BC_1".to_string(),
            port_name: "IO0".to_string(),
            function: CellFunction::Bidir,
            safe_value: SafeBit::DontCare,
            control_cell: Some(2),
            disable_value: SafeBit::DontCare,
        });
        let model = DeviceModel::from_bsdl(&data);
        let pin = model.pin("IO0").unwrap();
        assert_eq!(pin.input_cell, Some(0));
        assert_eq!(pin.output_cell, Some(1));
        assert_eq!(pin.control_cell, Some(2));
    }

    #[test]
    fn missing_instruction_returns_sentinel() {
        let data = BsdlData::default();
        let model = DeviceModel::from_bsdl(&data);
        assert_eq!(model.instruction("EXTEST"), UNKNOWN_INSTRUCTION);
    }
}
