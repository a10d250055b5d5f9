//! End-to-end exit-code contract of §6: a valid BSDL file exits 0, a
//! missing/invalid one exits 1.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

const MOCK_BSDL: &str = r#"
entity MOCK_DEVICE is
  generic (PHYSICAL_PIN_MAP : string := "DEFAULT");
  port (
    TCK : in bit;
    TMS : in bit;
    TDI : in bit;
    TDO : out bit;
    P0 : inout bit;
    P1 : inout bit
  );
  attribute BOUNDARY_LENGTH of MOCK_DEVICE : entity is 2;
  attribute INSTRUCTION_LENGTH of MOCK_DEVICE : entity is 8;
  attribute INSTRUCTION_OPCODE of MOCK_DEVICE : entity is
    "BYPASS (11111111),
     SAMPLE (00000001),
     EXTEST (00000000)";
  attribute IDCODE_REGISTER of MOCK_DEVICE : entity is
    "00010010001101000101011001111000";
  attribute PIN_MAP_STRING of MOCK_DEVICE : entity is
    "TCK:1, TMS:2, TDI:3, TDO:4, P0:5, P1:6";
  attribute BOUNDARY_REGISTER of MOCK_DEVICE : entity is
    "0 (BC_1, P0, OUTPUT2, X, 0, CONTROL, 1),
     1 (BC_1, P1, OUTPUT2, X, 0, CONTROL, 1)";
end MOCK_DEVICE;
"#;

fn write_fixture() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(MOCK_BSDL.as_bytes()).unwrap();
    file
}

#[test]
fn valid_bsdl_exits_success() {
    let fixture = write_fixture();
    Command::cargo_bin("jtagscan")
        .unwrap()
        .arg(fixture.path())
        .arg("--poll-ms")
        .arg("1")
        .assert()
        .success()
        .stdout(predicate::str::contains("Loaded"));
}

#[test]
fn missing_bsdl_file_exits_failure() {
    Command::cargo_bin("jtagscan")
        .unwrap()
        .arg("/no/such/file.bsdl")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Error:"));
}
