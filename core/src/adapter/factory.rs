//! Adapter factory: construct a backend by type, and probe for available
//! hardware (§4.F), grounded in `AdapterFactory.{h,cpp}`.

use super::{vendor, AdapterDescriptor, AdapterType, JtagAdapter};
use crate::error::JtagError;

pub fn create(adapter_type: AdapterType) -> Result<Box<dyn JtagAdapter>, JtagError> {
    match adapter_type {
        AdapterType::Mock => Ok(Box::new(super::simulator::SimulatorAdapter::new())),
        AdapterType::Pico => Ok(Box::new(super::serial::SerialAdapter::new("", 115_200))),
        AdapterType::JLink => Ok(Box::new(super::vendor::VendorAdapter::new())),
        AdapterType::Ft2232h => Err(JtagError::AdapterUnavailable {
            adapter: adapter_type.to_str().to_string(),
            reason: "FT2232H backend not implemented".to_string(),
        }),
    }
}

/// Construct an adapter and, for J-Link, parse a `"JLINK_12345678"`-style
/// device id into a target serial number before returning it.
pub fn create_with_device_id(
    adapter_type: AdapterType,
    device_id: &str,
) -> Result<Box<dyn JtagAdapter>, JtagError> {
    if adapter_type == AdapterType::Pico {
        return Ok(Box::new(super::serial::SerialAdapter::new(device_id, 115_200)));
    }
    if adapter_type == AdapterType::JLink {
        let mut adapter = super::vendor::VendorAdapter::new();
        if let Some(serial) = vendor::parse_device_id(device_id) {
            if let Ok(parsed) = serial.parse::<u32>() {
                adapter.set_target_serial_number(parsed);
            }
        }
        return Ok(Box::new(adapter));
    }
    create(adapter_type)
}

pub fn create_from_string(s: &str) -> Result<Box<dyn JtagAdapter>, JtagError> {
    let adapter_type = AdapterType::from_str_ci(s).ok_or_else(|| JtagError::AdapterUnavailable {
        adapter: s.to_string(),
        reason: "unrecognized adapter type".to_string(),
    })?;
    create(adapter_type)
}

pub fn type_to_string(adapter_type: AdapterType) -> &'static str {
    adapter_type.to_str()
}

pub fn string_to_type(s: &str) -> Option<AdapterType> {
    AdapterType::from_str_ci(s)
}

pub fn is_supported(adapter_type: AdapterType) -> bool {
    !matches!(adapter_type, AdapterType::Ft2232h)
}

pub fn get_supported_adapters() -> Vec<AdapterType> {
    vec![AdapterType::Mock, AdapterType::Pico, AdapterType::JLink]
}

/// Probe each backend for attached/available devices. The simulator is
/// always reported in debug builds only, matching the source's behavior of
/// hiding the mock adapter from release probes.
pub fn get_available_adapters() -> Vec<AdapterDescriptor> {
    let mut found = Vec::new();

    #[cfg(debug_assertions)]
    found.push(AdapterDescriptor {
        adapter_type: AdapterType::Mock,
        name: "Simulator".to_string(),
        serial_number: None,
    });

    for info in serialport::available_ports().unwrap_or_default() {
        found.push(AdapterDescriptor {
            adapter_type: AdapterType::Pico,
            name: info.port_name.clone(),
            serial_number: None,
        });
    }

    for device in vendor::enumerate_usb_devices() {
        found.push(AdapterDescriptor {
            adapter_type: AdapterType::JLink,
            name: device.product_name,
            serial_number: Some(device.serial_number),
        });
    }

    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_type_strings() {
        assert_eq!(string_to_type("jlink"), Some(AdapterType::JLink));
        assert_eq!(type_to_string(AdapterType::Mock), "mock");
    }

    #[test]
    fn ft2232h_is_unsupported() {
        assert!(!is_supported(AdapterType::Ft2232h));
        assert!(create(AdapterType::Ft2232h).is_err());
    }

    #[test]
    fn mock_adapter_constructs() {
        let adapter = create(AdapterType::Mock).unwrap();
        assert_eq!(adapter.name(), "simulator");
    }
}
