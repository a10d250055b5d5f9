//! The 16-state IEEE 1149.1 TAP controller and its precomputed shortest-path
//! table (§4.C). The table is generated offline (verified by BFS in the test
//! module below) so navigation between any two states is a single lookup
//! rather than a per-call search.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TapState {
    TestLogicReset = 0,
    RunTestIdle = 1,
    SelectDrScan = 2,
    CaptureDr = 3,
    ShiftDr = 4,
    Exit1Dr = 5,
    PauseDr = 6,
    Exit2Dr = 7,
    UpdateDr = 8,
    SelectIrScan = 9,
    CaptureIr = 10,
    ShiftIr = 11,
    Exit1Ir = 12,
    PauseIr = 13,
    Exit2Ir = 14,
    UpdateIr = 15,
}

impl TapState {
    pub fn from_u8(v: u8) -> Option<Self> {
        use TapState::*;
        const ALL: [TapState; 16] = [
            TestLogicReset, RunTestIdle, SelectDrScan, CaptureDr, ShiftDr, Exit1Dr, PauseDr,
            Exit2Dr, UpdateDr, SelectIrScan, CaptureIr, ShiftIr, Exit1Ir, PauseIr, Exit2Ir,
            UpdateIr,
        ];
        ALL.get(v as usize).copied()
    }
}

/// Single-cycle transition per the IEEE 1149.1 state diagram.
pub fn next_state(state: TapState, tms: bool) -> TapState {
    use TapState::*;
    match state {
        TestLogicReset => if tms { TestLogicReset } else { RunTestIdle },
        RunTestIdle => if tms { SelectDrScan } else { RunTestIdle },
        SelectDrScan => if tms { SelectIrScan } else { CaptureDr },
        CaptureDr => if tms { Exit1Dr } else { ShiftDr },
        ShiftDr => if tms { Exit1Dr } else { ShiftDr },
        Exit1Dr => if tms { UpdateDr } else { PauseDr },
        PauseDr => if tms { Exit2Dr } else { PauseDr },
        Exit2Dr => if tms { UpdateDr } else { ShiftDr },
        UpdateDr => if tms { SelectDrScan } else { RunTestIdle },
        SelectIrScan => if tms { TestLogicReset } else { CaptureIr },
        CaptureIr => if tms { Exit1Ir } else { ShiftIr },
        ShiftIr => if tms { Exit1Ir } else { ShiftIr },
        Exit1Ir => if tms { UpdateIr } else { PauseIr },
        PauseIr => if tms { Exit2Ir } else { PauseIr },
        Exit2Ir => if tms { UpdateIr } else { ShiftIr },
        UpdateIr => if tms { SelectDrScan } else { RunTestIdle },
    }
}

/// `TABLE[from][to] = (tmsBits, bitCount)`. `tmsBits` holds the TMS sequence
/// LSB-first: bit 0 is the first value driven.
#[rustfmt::skip]
const TABLE: [[(u8, u8); 16]; 16] = [
    [(0x00, 0), (0x00, 1), (0x02, 2), (0x02, 3), (0x02, 4), (0x0a, 4), (0x0a, 5), (0x2a, 6), (0x1a, 5), (0x06, 3), (0x06, 4), (0x06, 5), (0x16, 5), (0x16, 6), (0x56, 7), (0x36, 6)],
    [(0x07, 3), (0x00, 0), (0x01, 1), (0x01, 2), (0x01, 3), (0x05, 3), (0x05, 4), (0x15, 5), (0x0d, 4), (0x03, 2), (0x03, 3), (0x03, 4), (0x0b, 4), (0x0b, 5), (0x2b, 6), (0x1b, 5)],
    [(0x03, 2), (0x03, 3), (0x00, 0), (0x00, 1), (0x00, 2), (0x02, 2), (0x02, 3), (0x0a, 4), (0x06, 3), (0x01, 1), (0x01, 2), (0x01, 3), (0x05, 3), (0x05, 4), (0x15, 5), (0x0d, 4)],
    [(0x1f, 5), (0x03, 3), (0x07, 3), (0x00, 0), (0x00, 1), (0x01, 1), (0x01, 2), (0x05, 3), (0x03, 2), (0x0f, 4), (0x0f, 5), (0x0f, 6), (0x2f, 6), (0x2f, 7), (0xaf, 8), (0x6f, 7)],
    [(0x1f, 5), (0x03, 3), (0x07, 3), (0x07, 4), (0x00, 0), (0x01, 1), (0x01, 2), (0x05, 3), (0x03, 2), (0x0f, 4), (0x0f, 5), (0x0f, 6), (0x2f, 6), (0x2f, 7), (0xaf, 8), (0x6f, 7)],
    [(0x0f, 4), (0x01, 2), (0x03, 2), (0x03, 3), (0x02, 3), (0x00, 0), (0x00, 1), (0x02, 2), (0x01, 1), (0x07, 3), (0x07, 4), (0x07, 5), (0x17, 5), (0x17, 6), (0x57, 7), (0x37, 6)],
    [(0x1f, 5), (0x03, 3), (0x07, 3), (0x07, 4), (0x01, 2), (0x05, 3), (0x00, 0), (0x01, 1), (0x03, 2), (0x0f, 4), (0x0f, 5), (0x0f, 6), (0x2f, 6), (0x2f, 7), (0xaf, 8), (0x6f, 7)],
    [(0x0f, 4), (0x01, 2), (0x03, 2), (0x03, 3), (0x00, 1), (0x02, 2), (0x02, 3), (0x00, 0), (0x01, 1), (0x07, 3), (0x07, 4), (0x07, 5), (0x17, 5), (0x17, 6), (0x57, 7), (0x37, 6)],
    [(0x07, 3), (0x00, 1), (0x01, 1), (0x01, 2), (0x01, 3), (0x05, 3), (0x05, 4), (0x15, 5), (0x00, 0), (0x03, 2), (0x03, 3), (0x03, 4), (0x0b, 4), (0x0b, 5), (0x2b, 6), (0x1b, 5)],
    [(0x01, 1), (0x01, 2), (0x05, 3), (0x05, 4), (0x05, 5), (0x15, 5), (0x15, 6), (0x55, 7), (0x35, 6), (0x00, 0), (0x00, 1), (0x00, 2), (0x02, 2), (0x02, 3), (0x0a, 4), (0x06, 3)],
    [(0x1f, 5), (0x03, 3), (0x07, 3), (0x07, 4), (0x07, 5), (0x17, 5), (0x17, 6), (0x57, 7), (0x37, 6), (0x0f, 4), (0x00, 0), (0x00, 1), (0x01, 1), (0x01, 2), (0x05, 3), (0x03, 2)],
    [(0x1f, 5), (0x03, 3), (0x07, 3), (0x07, 4), (0x07, 5), (0x17, 5), (0x17, 6), (0x57, 7), (0x37, 6), (0x0f, 4), (0x0f, 5), (0x00, 0), (0x01, 1), (0x01, 2), (0x05, 3), (0x03, 2)],
    [(0x0f, 4), (0x01, 2), (0x03, 2), (0x03, 3), (0x03, 4), (0x0b, 4), (0x0b, 5), (0x2b, 6), (0x1b, 5), (0x07, 3), (0x07, 4), (0x02, 3), (0x00, 0), (0x00, 1), (0x02, 2), (0x01, 1)],
    [(0x1f, 5), (0x03, 3), (0x07, 3), (0x07, 4), (0x07, 5), (0x17, 5), (0x17, 6), (0x57, 7), (0x37, 6), (0x0f, 4), (0x0f, 5), (0x01, 2), (0x05, 3), (0x00, 0), (0x01, 1), (0x03, 2)],
    [(0x0f, 4), (0x01, 2), (0x03, 2), (0x03, 3), (0x03, 4), (0x0b, 4), (0x0b, 5), (0x2b, 6), (0x1b, 5), (0x07, 3), (0x07, 4), (0x00, 1), (0x02, 2), (0x02, 3), (0x00, 0), (0x01, 1)],
    [(0x07, 3), (0x00, 1), (0x01, 1), (0x01, 2), (0x01, 3), (0x05, 3), (0x05, 4), (0x15, 5), (0x0d, 4), (0x03, 2), (0x03, 3), (0x03, 4), (0x0b, 4), (0x0b, 5), (0x2b, 6), (0x00, 0)],
];

/// Shortest TMS sequence from `from` to `to`. Bit 0 of the returned vector is
/// the first TMS value driven. Empty when `from == to`.
pub fn path(from: TapState, to: TapState) -> Vec<bool> {
    let (bits, count) = TABLE[from as usize][to as usize];
    (0..count).map(|i| (bits >> i) & 1 == 1).collect()
}

pub fn path_len(from: TapState, to: TapState) -> u8 {
    TABLE[from as usize][to as usize].1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    const ALL_STATES: [TapState; 16] = {
        use TapState::*;
        [
            TestLogicReset, RunTestIdle, SelectDrScan, CaptureDr, ShiftDr, Exit1Dr, PauseDr,
            Exit2Dr, UpdateDr, SelectIrScan, CaptureIr, ShiftIr, Exit1Ir, PauseIr, Exit2Ir,
            UpdateIr,
        ]
    };

    fn bfs_len(from: TapState, to: TapState) -> u8 {
        if from == to {
            return 0;
        }
        let mut dist = [None; 16];
        dist[from as usize] = Some(0u8);
        let mut q = VecDeque::new();
        q.push_back(from);
        while let Some(cur) = q.pop_front() {
            let d = dist[cur as usize].unwrap();
            for tms in [false, true] {
                let nxt = next_state(cur, tms);
                if dist[nxt as usize].is_none() {
                    dist[nxt as usize] = Some(d + 1);
                    q.push_back(nxt);
                }
            }
        }
        dist[to as usize].unwrap()
    }

    #[test]
    fn table_paths_reach_target_state() {
        for &from in &ALL_STATES {
            for &to in &ALL_STATES {
                let bits = path(from, to);
                let mut cur = from;
                for b in &bits {
                    cur = next_state(cur, *b);
                }
                assert_eq!(cur, to, "path {:?} -> {:?} landed on {:?}", from, to, cur);
                assert_eq!(bits.len() as u8, path_len(from, to));
            }
        }
    }

    #[test]
    fn table_paths_are_shortest() {
        for &from in &ALL_STATES {
            for &to in &ALL_STATES {
                assert_eq!(path_len(from, to), bfs_len(from, to));
            }
        }
    }

    #[test]
    fn shift_ir_to_shift_dr_matches_known_sequence() {
        let bits = path(TapState::ShiftIr, TapState::ShiftDr);
        assert_eq!(bits, vec![true, true, true, false, false]);
    }

    #[test]
    fn select_ir_scan_tms_high_returns_to_reset() {
        assert_eq!(
            next_state(TapState::SelectIrScan, true),
            TapState::TestLogicReset
        );
    }
}
