//! BSDL section extraction.
//!
//! The parser works on the normalized buffer produced by
//! [`crate::bsdl::lexer::normalize`]. Each attribute is located by substring
//! search and its payload parsed independently; a malformed or absent
//! section yields a default value rather than aborting the whole parse —
//! only a file that can't be read at all is a hard error.

use super::lexer::normalize;
use super::types::{
    BoundaryCell, BsdlData, CellFunction, Instruction, Port, PortDirection, SafeBit, TapSignals,
};
use crate::error::{JtagError, JtagResult};
use std::collections::HashMap;
use std::path::Path;

/// Read a BSDL file from disk and parse it.
pub fn parse_file(path: &Path) -> JtagResult<BsdlData> {
    let source = std::fs::read_to_string(path).map_err(|e| JtagError::BsdlIoError {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(parse(&source))
}

/// Parse already-loaded BSDL text. Never fails: malformed sections are left
/// at their default value.
pub fn parse(source: &str) -> BsdlData {
    let norm = normalize(source);

    let mut data = BsdlData {
        entity_name: extract_entity_name(&norm),
        package_name: extract_package_name(&norm),
        bsr_length: extract_usize_attr(&norm, "BOUNDARY_LENGTH").unwrap_or(0),
        ir_length: extract_usize_attr(&norm, "INSTRUCTION_LENGTH").unwrap_or(0),
        id_code: extract_idcode(&norm),
        ports: extract_ports(&norm),
        pin_maps: extract_pin_maps(&norm),
        instructions: extract_instructions(&norm),
        boundary_cells: Vec::new(),
        tap: extract_tap_signals(&norm),
    };
    data.boundary_cells = extract_boundary_cells(&norm, data.bsr_length);
    data
}

/// Slice of `norm` from `keyword`'s first occurrence to the next `;`
/// (inclusive), scoping every later extraction to one statement instead of
/// the whole remaining file.
fn statement_span<'a>(norm: &'a str, keyword: &str) -> Option<&'a str> {
    let start = norm.find(keyword)?;
    let rest = &norm[start..];
    let end = rest.find(';').map(|i| i + 1).unwrap_or(rest.len());
    Some(&rest[..end])
}

/// Content strictly between the first and last `"` within `span`.
fn quoted_content(span: &str) -> Option<&str> {
    let first = span.find('"')?;
    let last = span.rfind('"')?;
    if last <= first {
        return None;
    }
    Some(&span[first + 1..last])
}

fn extract_usize_attr(norm: &str, keyword: &str) -> Option<usize> {
    let span = statement_span(norm, keyword)?;
    let is_pos = span.find(" IS ")?;
    let tail = span[is_pos + 4..].trim_end_matches(|c| c == ';' || c == ' ');
    tail.trim().parse().ok()
}

fn extract_entity_name(norm: &str) -> String {
    let Some(pos) = norm.find("ENTITY") else {
        return String::new();
    };
    let rest = &norm[pos + "ENTITY".len()..];
    let Some(is_pos) = rest.find(" IS") else {
        return String::new();
    };
    rest[..is_pos].trim().to_string()
}

fn extract_package_name(norm: &str) -> String {
    let Some(span) = statement_span(norm, "GENERIC") else {
        return String::new();
    };
    quoted_content(span).unwrap_or("").trim().to_string()
}

fn extract_idcode(norm: &str) -> u32 {
    let Some(span) = statement_span(norm, "IDCODE_REGISTER") else {
        return 0;
    };
    let Some(content) = quoted_content(span) else {
        return 0;
    };
    let bits: String = content.chars().filter(|c| *c == '0' || *c == '1').collect();
    if bits.is_empty() {
        0
    } else {
        u32::from_str_radix(&bits, 2).unwrap_or(0)
    }
}

fn extract_tap_signals(norm: &str) -> TapSignals {
    let lookup = |keyword: &str| -> Option<String> {
        let span = statement_span(norm, keyword)?;
        let is_pos = span.find(" IS")?;
        let tail = &span[is_pos + 3..];
        let cleaned: String = tail
            .chars()
            .filter(|c| !matches!(c, '"' | ';'))
            .collect();
        let name = cleaned.trim();
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    };
    TapSignals {
        tck: lookup("TAP_SCAN_CLOCK"),
        tms: lookup("TAP_SCAN_MODE"),
        tdi: lookup("TAP_SCAN_IN"),
        tdo: lookup("TAP_SCAN_OUT"),
        trst: lookup("TAP_SCAN_RESET"),
    }
}

/// Split `s` on `sep` only at paren-nesting depth 0.
fn split_top_level(s: &str, sep: char) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut cur = String::new();
    for ch in s.chars() {
        match ch {
            '(' => {
                depth += 1;
                cur.push(ch);
            }
            ')' => {
                depth -= 1;
                cur.push(ch);
            }
            c if c == sep && depth == 0 => {
                out.push(std::mem::take(&mut cur));
            }
            c => cur.push(c),
        }
    }
    if !cur.trim().is_empty() {
        out.push(cur);
    }
    out
}

fn parse_vhdl_range(type_part: &str) -> Option<(i64, i64, bool)> {
    let open = type_part.find('(')?;
    let close = type_part.rfind(')')?;
    if close <= open {
        return None;
    }
    let inner = &type_part[open + 1..close];
    if let Some(pos) = inner.find("DOWNTO") {
        let hi: i64 = inner[..pos].trim().parse().ok()?;
        let lo: i64 = inner[pos + "DOWNTO".len()..].trim().parse().ok()?;
        Some((hi, lo, true))
    } else if let Some(pos) = inner.find(" TO ") {
        let lo: i64 = inner[..pos].trim().parse().ok()?;
        let hi: i64 = inner[pos + " TO ".len()..].trim().parse().ok()?;
        Some((lo, hi, false))
    } else {
        None
    }
}

fn direction_of(type_part: &str) -> PortDirection {
    if type_part.contains("INOUT") {
        PortDirection::InOut
    } else if type_part.contains("OUT") {
        PortDirection::Out
    } else if type_part.contains("BUFFER") {
        PortDirection::Buffer
    } else if type_part.contains("LINKAGE") {
        PortDirection::Linkage
    } else {
        PortDirection::In
    }
}

fn extract_ports(norm: &str) -> Vec<Port> {
    let Some(kw_pos) = norm.find("PORT") else {
        return Vec::new();
    };
    let rest = &norm[kw_pos + "PORT".len()..];
    let Some(open_rel) = rest.find('(') else {
        return Vec::new();
    };
    let mut depth = 0i32;
    let mut close_rel = None;
    for (i, ch) in rest[open_rel..].char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    close_rel = Some(open_rel + i);
                    break;
                }
            }
            _ => {}
        }
    }
    let Some(close_rel) = close_rel else {
        return Vec::new();
    };
    let body = &rest[open_rel + 1..close_rel];

    let mut ports = Vec::new();
    for decl in body.split(';') {
        let decl = decl.trim();
        if decl.is_empty() {
            continue;
        }
        let Some(colon) = decl.find(':') else {
            continue;
        };
        let names_part = &decl[..colon];
        let type_part = &decl[colon + 1..];
        let direction = direction_of(type_part);
        let is_vector = type_part.contains("VECTOR");
        let range = if is_vector { parse_vhdl_range(type_part) } else { None };

        for name in names_part.split(',') {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            match range {
                Some((first, second, downto)) => {
                    if downto {
                        let mut i = first;
                        while i >= second {
                            ports.push(Port {
                                name: format!("{}({})", name, i),
                                direction,
                            });
                            i -= 1;
                        }
                    } else {
                        let mut i = first;
                        while i <= second {
                            ports.push(Port {
                                name: format!("{}({})", name, i),
                                direction,
                            });
                            i += 1;
                        }
                    }
                }
                None => ports.push(Port {
                    name: name.to_string(),
                    direction,
                }),
            }
        }
    }
    ports
}

fn extract_instructions(norm: &str) -> HashMap<String, Instruction> {
    let mut map = HashMap::new();
    let Some(span) = statement_span(norm, "INSTRUCTION_OPCODE") else {
        return map;
    };
    let Some(content) = quoted_content(span) else {
        return map;
    };
    for entry in split_top_level(content, ',') {
        let entry = entry.trim();
        let Some(open) = entry.find('(') else {
            continue;
        };
        let name = entry[..open].trim();
        if name.is_empty() {
            continue;
        }
        let close = entry.rfind(')').unwrap_or(entry.len());
        let code: String = entry[open + 1..close]
            .chars()
            .filter(|c| matches!(c, '0' | '1' | 'X'))
            .collect();
        if code.is_empty() {
            continue;
        }
        map.insert(
            name.to_string(),
            Instruction {
                name: name.to_string(),
                opcodes: vec![code],
            },
        );
    }
    map
}

fn extract_pin_maps(norm: &str) -> HashMap<String, Vec<String>> {
    let mut map = HashMap::new();
    let Some(span) = statement_span(norm, "PIN_MAP_STRING") else {
        return map;
    };
    let Some(content) = quoted_content(span) else {
        return map;
    };
    let cleaned: String = content.chars().filter(|c| *c != '"' && *c != '&').collect();
    for pair in split_top_level(&cleaned, ',') {
        let pair = pair.trim();
        let Some(colon) = pair.find(':') else {
            continue;
        };
        let logical = pair[..colon].trim();
        let physical = pair[colon + 1..].trim();
        if logical.is_empty() {
            continue;
        }
        let pins: Vec<String> = if physical.starts_with('(') && physical.ends_with(')') {
            physical[1..physical.len() - 1]
                .split(',')
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect()
        } else if !physical.is_empty() {
            vec![physical.to_string()]
        } else {
            Vec::new()
        };
        map.entry(logical.to_string()).or_insert(Vec::new()).extend(pins);
    }
    map
}

fn function_of(tok: &str) -> CellFunction {
    match tok.trim() {
        "INPUT" => CellFunction::Input,
        "CLOCK" => CellFunction::Clock,
        "OUTPUT2" => CellFunction::Output2,
        "OUTPUT3" => CellFunction::Output3,
        "BIDIR" => CellFunction::Bidir,
        "CONTROL" => CellFunction::Control,
        "INTERNAL" => CellFunction::Internal,
        _ => CellFunction::Unknown,
    }
}

fn safe_bit_of(tok: &str) -> SafeBit {
    match tok.trim() {
        "0" => SafeBit::Low,
        "1" => SafeBit::High,
        _ => SafeBit::DontCare,
    }
}

fn extract_boundary_cells(norm: &str, bsr_length: usize) -> Vec<BoundaryCell> {
    let Some(span) = statement_span(norm, "BOUNDARY_REGISTER") else {
        return Vec::new();
    };
    let Some(content) = quoted_content(span) else {
        return Vec::new();
    };

    let mut cells = Vec::with_capacity(bsr_length);
    let bytes: Vec<char> = content.chars().collect();
    let mut i = 0usize;
    let n = bytes.len();

    while i < n {
        while i < n && !bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i >= n {
            break;
        }
        let num_start = i;
        while i < n && bytes[i].is_ascii_digit() {
            i += 1;
        }
        let cell_number: usize = bytes[num_start..i].iter().collect::<String>().parse().unwrap_or(0);

        while i < n && bytes[i] != '(' {
            i += 1;
        }
        if i >= n {
            break;
        }
        let field_start = i + 1;
        let mut depth = 1i32;
        i += 1;
        while i < n && depth > 0 {
            match bytes[i] {
                '(' => depth += 1,
                ')' => depth -= 1,
                _ => {}
            }
            if depth > 0 {
                i += 1;
            }
        }
        let field_end = i;
        i += 1; // past closing paren

        let fields: Vec<String> = bytes[field_start..field_end]
            .iter()
            .collect::<String>()
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let cell_type = fields.get(0).cloned().unwrap_or_default();
        let port_name = fields.get(1).cloned().unwrap_or_default();
        let function = fields.get(2).map(|s| function_of(s)).unwrap_or(CellFunction::Unknown);
        let safe_value = fields.get(3).map(|s| safe_bit_of(s)).unwrap_or(SafeBit::DontCare);
        let control_cell = fields.get(4).and_then(|s| {
            let s = s.trim();
            if s == "*" || s.is_empty() {
                None
            } else {
                s.parse::<usize>().ok()
            }
        });
        let disable_value = fields.get(5).map(|s| safe_bit_of(s)).unwrap_or(SafeBit::DontCare);

        cells.push(BoundaryCell {
            cell_number,
            cell_type,
            port_name,
            function,
            safe_value,
            control_cell,
            disable_value,
        });
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNIPPET: &str = r#"
        entity FOO is
          generic (PHYSICAL_PIN_MAP : string := "PQFP100");
          port (
            TCK : in bit;
            TMS : in bit;
            TDI : in bit;
            TDO : out bit;
            DATA : inout bit_vector(3 downto 0)
          );
          attribute BOUNDARY_LENGTH of FOO : entity is 8;
          attribute INSTRUCTION_LENGTH of FOO : entity is 4;
          attribute INSTRUCTION_OPCODE of FOO : entity is
            "BYPASS (1111),
             SAMPLE (0010),
             EXTEST (0000)";
          attribute IDCODE_REGISTER of FOO : entity is
            "00010010001101000101011001111000";
          attribute PIN_MAP_STRING of FOO : entity is
            "TCK:1, TMS:2, TDI:3, TDO:4, DATA(0):(5,6), DATA(1):7, DATA(2):8, DATA(3):9";
          attribute BOUNDARY_REGISTER of FOO : entity is
            "0 (BC_1, TDO, OUTPUT2, X, 1, 0),
             1 (BC_1, *, CONTROL, 1, *, *),
             2 (BC_1, DATA(0), BIDIR, X),
             3 (BC_1, DATA(1), BIDIR, X)";
        end FOO;
    "#;

    #[test]
    fn parses_entity_name() {
        let data = parse(SNIPPET);
        assert_eq!(data.entity_name, "FOO");
    }

    #[test]
    fn parses_lengths() {
        let data = parse(SNIPPET);
        assert_eq!(data.bsr_length, 8);
        assert_eq!(data.ir_length, 4);
    }

    #[test]
    fn parses_idcode() {
        let data = parse(SNIPPET);
        assert_eq!(data.id_code, 0x12345678);
    }

    #[test]
    fn expands_vector_ports() {
        let data = parse(SNIPPET);
        let names: Vec<&str> = data.ports.iter().map(|p| p.name.as_str()).collect();
        assert!(names.contains(&"DATA(3)"));
        assert!(names.contains(&"DATA(0)"));
        assert!(names.contains(&"TCK"));
    }

    #[test]
    fn parses_instructions() {
        let data = parse(SNIPPET);
        assert_eq!(data.instructions.get("SAMPLE").unwrap().opcodes[0], "0010");
        assert_eq!(data.instructions.get("EXTEST").unwrap().opcodes[0], "0000");
    }

    #[test]
    fn parses_grouped_pin_map() {
        let data = parse(SNIPPET);
        assert_eq!(
            data.pin_maps.get("DATA(0)").unwrap(),
            &vec!["5".to_string(), "6".to_string()]
        );
    }

    #[test]
    fn parses_boundary_cells() {
        let data = parse(SNIPPET);
        assert_eq!(data.boundary_cells.len(), 4);
        assert_eq!(data.boundary_cells[1].port_name, "*");
        assert_eq!(data.boundary_cells[0].function, CellFunction::Output2);
    }
}
