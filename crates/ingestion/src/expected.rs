//! Expected thunder ensemble size by forecast hour.
//!
//! Several members stop short of the full 48 hours, so late forecast hours
//! proceed with fewer files. Each table maps a starting forecast hour to
//! the count that applies from there on.

use calib_common::Cycle;
use chrono::NaiveDate;

use crate::members::HireswCore;

/// First cycle with the current HiResW membership.
pub fn membership_switch() -> Cycle {
    Cycle {
        date: NaiveDate::from_ymd_opt(2020, 12, 3).unwrap_or_default(),
        hour: 0,
    }
}

const MEMBERS: &[(u32, usize)] = &[(1, 10), (41, 7), (47, 6)];

const FILES_FV3: &[(u32, usize)] = &[
    (1, 20),
    (4, 50),
    (37, 48),
    (38, 46),
    (39, 44),
    (40, 42),
    (41, 40),
    (43, 39),
    (44, 38),
    (45, 37),
    (46, 36),
    (47, 35),
];

const FILES_NMMB: &[(u32, usize)] = &[
    (1, 20),
    (4, 50),
    (37, 47),
    (38, 44),
    (39, 41),
    (40, 38),
    (41, 35),
    (43, 34),
    (44, 33),
    (45, 32),
    (46, 31),
    (47, 30),
];

const MEMBERS_LEGACY: &[(u32, usize)] = &[(1, 10), (35, 9), (41, 5)];

const FILES_LEGACY: &[(u32, usize)] = &[
    (1, 20),
    (4, 50),
    (31, 49),
    (32, 48),
    (33, 47),
    (34, 46),
    (35, 45),
    (37, 41),
    (38, 37),
    (39, 33),
    (40, 29),
    (41, 25),
    (49, 5),
];

/// Step tables of expected members and member files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedCounts {
    members: &'static [(u32, usize)],
    files: &'static [(u32, usize)],
}

impl ExpectedCounts {
    /// Tables for a cycle, given which HiResW core is running.
    pub fn for_cycle(cycle: &Cycle, core: HireswCore) -> Self {
        if cycle.reference_time() < membership_switch().reference_time() {
            return Self {
                members: MEMBERS_LEGACY,
                files: FILES_LEGACY,
            };
        }
        match core {
            HireswCore::Fv3 => Self {
                members: MEMBERS,
                files: FILES_FV3,
            },
            HireswCore::Nmmb => Self {
                members: MEMBERS,
                files: FILES_NMMB,
            },
        }
    }

    /// Members expected at `fhour`.
    pub fn members(&self, fhour: u32) -> usize {
        step_lookup(self.members, fhour)
    }

    /// Member files expected for the job at `fhour`.
    pub fn files(&self, fhour: u32) -> usize {
        step_lookup(self.files, fhour)
    }
}

/// Value of the entry with the largest key not above `fhour`; 0 before the
/// first key.
fn step_lookup(table: &[(u32, usize)], fhour: u32) -> usize {
    table
        .iter()
        .take_while(|(start, _)| *start <= fhour)
        .last()
        .map_or(0, |(_, count)| *count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cycle(compact: &str) -> Cycle {
        Cycle::parse_compact(compact).unwrap()
    }

    #[test]
    fn test_fv3_tables() {
        let counts = ExpectedCounts::for_cycle(&cycle("2024050100"), HireswCore::Fv3);
        assert_eq!(counts.files(1), 20);
        assert_eq!(counts.files(3), 20);
        assert_eq!(counts.files(4), 50);
        assert_eq!(counts.files(36), 50);
        assert_eq!(counts.files(37), 48);
        assert_eq!(counts.files(42), 40);
        assert_eq!(counts.files(48), 35);
        assert_eq!(counts.members(40), 10);
        assert_eq!(counts.members(41), 7);
        assert_eq!(counts.members(48), 6);
    }

    #[test]
    fn test_nmmb_drops_faster() {
        let counts = ExpectedCounts::for_cycle(&cycle("2024050112"), HireswCore::Nmmb);
        assert_eq!(counts.files(37), 47);
        assert_eq!(counts.files(47), 30);
    }

    #[test]
    fn test_legacy_before_switch() {
        let before = ExpectedCounts::for_cycle(&cycle("2020120212"), HireswCore::Fv3);
        assert_eq!(before.files(31), 49);
        assert_eq!(before.files(36), 45);
        assert_eq!(before.files(49), 5);
        assert_eq!(before.members(35), 9);

        let after = ExpectedCounts::for_cycle(&cycle("2020120300"), HireswCore::Fv3);
        assert_eq!(after.files(31), 50);
    }

    #[test]
    fn test_before_first_key() {
        let counts = ExpectedCounts::for_cycle(&cycle("2024050100"), HireswCore::Fv3);
        assert_eq!(counts.files(0), 0);
    }
}
