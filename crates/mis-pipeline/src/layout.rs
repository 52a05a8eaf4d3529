//! Fixed-width record layouts
//!
//! Every record type is a contiguous list of byte ranges. The first three
//! fields are shared by all types and carry the artifact key:
//!
//! | Field | Bytes |
//! |---|---|
//! | `GI90_RECORD_CODE` | `[0, 2)` |
//! | `GI01_DISTRICT_COLLEGE_ID` | `[2, 5)` |
//! | `GI03_TERM_ID` | `[5, 8)` |
//!
//! The registry also owns the compound grouping rule: `XB` leads a group with
//! `XE` and `XF`, and the three are versioned, merged and stripped as a unit.

use crate::error::{PipelineError, Result};
use std::collections::BTreeMap;

/// One named byte range of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub start: usize,
    pub end: usize,
}

impl FieldSpec {
    pub fn width(&self) -> usize {
        self.end - self.start
    }
}

/// Layout of one record type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    code: &'static str,
    fields: Vec<FieldSpec>,
}

impl RecordLayout {
    /// Build a layout and check that its ranges partition `[0, total)`
    pub fn new(code: &'static str, fields: &[(&'static str, usize, usize)]) -> Result<Self> {
        let fields: Vec<FieldSpec> = fields
            .iter()
            .map(|&(name, start, end)| FieldSpec { name, start, end })
            .collect();

        if fields.is_empty() {
            return Err(PipelineError::invalid_layout(code, "layout has no fields"));
        }

        let mut expected_start = 0;
        let mut seen = std::collections::HashSet::new();
        for field in &fields {
            if field.start != expected_start {
                return Err(PipelineError::invalid_layout(
                    code,
                    format!(
                        "{} starts at {} but the previous field ends at {}",
                        field.name, field.start, expected_start
                    ),
                ));
            }
            if field.end <= field.start {
                return Err(PipelineError::invalid_layout(
                    code,
                    format!("{} has an empty range", field.name),
                ));
            }
            if !seen.insert(field.name) {
                return Err(PipelineError::invalid_layout(
                    code,
                    format!("{} is defined twice", field.name),
                ));
            }
            expected_start = field.end;
        }

        Ok(Self { code, fields })
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Total record length in bytes
    pub fn total_length(&self) -> usize {
        self.fields.last().map(|f| f.end).unwrap_or(0)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// Split a record into trimmed field values
    ///
    /// Fields past the end of a short record come back blank.
    pub fn parse(&self, record: &[u8]) -> Vec<String> {
        self.fields
            .iter()
            .map(|field| {
                if field.start >= record.len() {
                    return String::new();
                }
                let end = field.end.min(record.len());
                String::from_utf8_lossy(&record[field.start..end]).trim().to_string()
            })
            .collect()
    }
}

const HEADER: [(&str, usize, usize); 3] = [
    ("GI90_RECORD_CODE", 0, 2),
    ("GI01_DISTRICT_COLLEGE_ID", 2, 5),
    ("GI03_TERM_ID", 5, 8),
];

const CB: &[(&str, usize, usize)] = &[
    ("CB00_CONTROL_NUMBER", 8, 20),
    ("CB01_DEPARTMENT_NUMBER", 20, 32),
    ("CB02_TITLE", 32, 100),
    ("CB03_TOP_CODE", 100, 106),
    ("CB04_CREDIT_STATUS", 106, 107),
    ("CB05_TRANSFER_STATUS", 107, 108),
    ("CB06_UNITS_MAXIMUM", 108, 112),
    ("CB07_UNITS_MINIMUM", 112, 116),
    ("CB08_BASIC_SKILLS_STATUS", 116, 117),
    ("CB09_SAM_PRIORITY_CODE", 117, 118),
    ("CB10_COOP_ED_STATUS", 118, 119),
    ("CB11_CLASSIFICATION_CODE", 119, 120),
    ("CB13_SPECIAL_CLASS_STATUS", 120, 121),
    ("CB14_CAN_CODE", 121, 127),
    ("CB15_CAN_SEQ_CODE", 127, 135),
    ("CB21_PRIOR_TO_COLLEGE_LEVEL", 135, 136),
    ("CB22_NONCREDIT_CATEGORY", 136, 137),
    ("CB23_FUNDING_AGENCY_CATEGORY", 137, 138),
    ("CB24_PROGRAM_STATUS", 138, 139),
    ("CB25_GENERAL_EDUCATION_STATUS", 139, 140),
    ("CB26_SUPPORT_COURSE_STATUS", 140, 141),
    ("CB27_UPPER_DIVISION_COURSE", 141, 142),
    ("FILLER", 142, 220),
];

const SB: &[(&str, usize, usize)] = &[
    ("FILLER_1", 8, 10),
    ("SB00_STUDENT_ID", 10, 20),
    ("SB01_STUDENT_BIRTH_DATE", 20, 28),
    ("SB03_GENDER", 28, 29),
    ("SB04_CITIZENSHIP", 29, 30),
    ("SB08_RESIDENCE_CODE", 30, 35),
    ("SB09_ZIP_CODE", 35, 44),
    ("SB11_EDUCATION_STATUS", 44, 49),
    ("SB14_ENROLLMENT_STATUS", 49, 50),
    ("SB15_ACADEMIC_STANDING", 50, 51),
    ("SB21_DSPS_STATUS", 51, 52),
    ("SB22_ACADEMIC_LEVEL", 52, 53),
    ("FILLER_2", 53, 100),
];

const SX: &[(&str, usize, usize)] = &[
    ("SB00_STUDENT_ID", 8, 18),
    ("XB00_SECTION_ID", 18, 30),
    ("SX01_ENROLLMENT_DATE", 30, 36),
    ("SX03_UNITS_EARNED", 36, 40),
    ("SX04_ENROLLMENT_OUTCOME", 40, 42),
    ("SX05_POSITIVE_ATTENDANCE_HOURS", 42, 47),
    ("FILLER", 47, 60),
];

const SY: &[(&str, usize, usize)] = &[
    ("SB00_STUDENT_ID", 8, 18),
    ("SY01_PROBATION_STATUS", 18, 19),
    ("SY02_DISMISSAL_STATUS", 19, 20),
    ("FILLER", 20, 40),
];

const PP: &[(&str, usize, usize)] = &[
    ("SB00_STUDENT_ID", 8, 18),
    ("PP01_PROGRAM_STATUS", 18, 20),
    ("PP02_SERVICE_DATE", 20, 28),
    ("FILLER", 28, 40),
];

const XB: &[(&str, usize, usize)] = &[
    ("CB00_CONTROL_NUMBER", 8, 20),
    ("XB00_SECTION_ID", 20, 32),
    ("XB01_ACCOUNTING_METHOD", 32, 33),
    ("XB02_DATE_FIRST_CENSUS", 33, 39),
    ("XB03_DAY_EVENING_CODE", 39, 40),
    ("XB05_UNITS_MAXIMUM", 40, 44),
    ("XB06_UNITS_MINIMUM", 44, 48),
    ("XB08_SPECIAL_POPULATION", 48, 49),
    ("XB09_WORK_BASED_LEARNING", 49, 50),
    ("FILLER", 50, 80),
];

const XE: &[(&str, usize, usize)] = &[
    ("XB00_SECTION_ID", 8, 20),
    ("XE01_SESSION_ID", 20, 22),
    ("EB00_EMPLOYEE_ID", 22, 31),
    ("XE02_ASSIGNMENT_TYPE", 31, 32),
    ("XE03_FTE", 32, 37),
    ("FILLER", 37, 60),
];

const XF: &[(&str, usize, usize)] = &[
    ("XB00_SECTION_ID", 8, 20),
    ("XF00_SESSION_ID", 20, 22),
    ("XF01_INSTRUCTION_METHOD", 22, 24),
    ("XF02_DATE_BEGIN", 24, 30),
    ("XF03_DATE_END", 30, 36),
    ("XF04_DAYS", 36, 43),
    ("XF05_TIME_BEGIN", 43, 47),
    ("XF06_TIME_END", 47, 51),
    ("XF07_TOTAL_HOURS", 51, 56),
    ("FILLER", 56, 80),
];

const EB: &[(&str, usize, usize)] = &[
    ("EB00_EMPLOYEE_ID", 8, 17),
    ("EB01_BIRTH_YEAR", 17, 21),
    ("EB02_GENDER", 21, 22),
    ("EB03_ETHNICITY", 22, 43),
    ("EB04_EMPLOYMENT_STATUS", 43, 44),
    ("EB05_HIGHEST_DEGREE", 44, 45),
    ("FILLER", 45, 60),
];

/// Record types shipped with the registry
const BUILTIN: &[(&str, &[(&str, usize, usize)])] = &[
    ("CB", CB),
    ("EB", EB),
    ("PP", PP),
    ("SB", SB),
    ("SX", SX),
    ("SY", SY),
    ("XB", XB),
    ("XE", XE),
    ("XF", XF),
];

/// Compound groups: leader first, then members in concatenation order
const GROUPS: &[&[&str]] = &[&["XB", "XE", "XF"]];

/// All record layouts known to the process
#[derive(Debug, Clone)]
pub struct LayoutRegistry {
    layouts: BTreeMap<&'static str, RecordLayout>,
    groups: Vec<Vec<&'static str>>,
}

impl LayoutRegistry {
    /// Load and validate the built-in layouts
    ///
    /// A validation failure is fatal for the process.
    pub fn builtin() -> Result<Self> {
        let mut layouts = Vec::with_capacity(BUILTIN.len());
        for &(code, body) in BUILTIN {
            let mut fields: Vec<(&'static str, usize, usize)> = HEADER.to_vec();
            fields.extend_from_slice(body);
            layouts.push(RecordLayout::new(code, &fields)?);
        }
        let groups = GROUPS.iter().map(|g| g.to_vec()).collect();
        Self::from_layouts(layouts, groups)
    }

    /// Build a registry from explicit layouts and groups
    pub fn from_layouts(
        layouts: Vec<RecordLayout>,
        groups: Vec<Vec<&'static str>>,
    ) -> Result<Self> {
        let mut map = BTreeMap::new();
        for layout in layouts {
            if layout.code.len() != 2 || !layout.code.bytes().all(|b| b.is_ascii_uppercase()) {
                return Err(PipelineError::invalid_layout(
                    layout.code,
                    "type codes are two uppercase letters",
                ));
            }
            if map.insert(layout.code, layout).is_some() {
                return Err(PipelineError::invalid_layout("registry", "duplicate type code"));
            }
        }
        for group in &groups {
            if group.is_empty() {
                return Err(PipelineError::invalid_layout("registry", "empty compound group"));
            }
            if let Some(missing) = group.iter().find(|code| !map.contains_key(*code)) {
                return Err(PipelineError::invalid_layout(
                    *missing,
                    "compound group member has no layout",
                ));
            }
        }
        Ok(Self {
            layouts: map,
            groups,
        })
    }

    /// Layout for a type code
    pub fn layout(&self, code: &str) -> Result<&RecordLayout> {
        self.layouts
            .get(code)
            .ok_or_else(|| PipelineError::UnknownType(code.to_string()))
    }

    /// Ordered field specs for a type code
    pub fn fields(&self, code: &str) -> Result<&[FieldSpec]> {
        self.layout(code).map(RecordLayout::fields)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.layouts.contains_key(code)
    }

    pub fn codes(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.layouts.keys().copied()
    }

    /// Leader of the group a type belongs to (the type itself when ungrouped)
    pub fn group_leader<'a>(&self, code: &'a str) -> &'a str {
        self.groups
            .iter()
            .find(|g| g.iter().any(|c| *c == code))
            .and_then(|g| g.first().copied())
            .unwrap_or(code)
    }

    /// Types replaced together when `code` is merged, leader first
    pub fn group_members(&self, code: &str) -> Vec<String> {
        let leader = self.group_leader(code);
        match self.groups.iter().find(|g| g.first().is_some_and(|c| *c == leader)) {
            Some(group) => group.iter().map(|c| c.to_string()).collect(),
            None => vec![code.to_string()],
        }
    }

    pub fn is_compound(&self, code: &str) -> bool {
        self.group_members(code).len() > 1
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_layouts_partition_records() {
        let registry = LayoutRegistry::builtin().unwrap();
        for code in registry.codes() {
            let fields = registry.fields(code).unwrap();
            let mut cursor = 0;
            for field in fields {
                assert_eq!(field.start, cursor, "{code}:{}", field.name);
                cursor = field.end;
            }
            assert_eq!(cursor, registry.layout(code).unwrap().total_length());
        }
        assert_eq!(registry.layout("CB").unwrap().total_length(), 220);
    }

    #[test]
    fn test_unknown_type() {
        let registry = LayoutRegistry::builtin().unwrap();
        assert!(matches!(registry.fields("ZZ"), Err(PipelineError::UnknownType(code)) if code == "ZZ"));
    }

    #[test]
    fn test_gap_is_rejected() {
        let err = RecordLayout::new("AA", &[("A", 0, 2), ("B", 3, 5)]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidLayout { .. }));
    }

    #[test]
    fn test_overlap_is_rejected() {
        assert!(RecordLayout::new("AA", &[("A", 0, 4), ("B", 2, 6)]).is_err());
        assert!(RecordLayout::new("AA", &[("A", 0, 2), ("A", 2, 4)]).is_err());
        assert!(RecordLayout::new("AA", &[]).is_err());
    }

    #[test]
    fn test_group_rules() {
        let registry = LayoutRegistry::builtin().unwrap();
        assert_eq!(registry.group_leader("XE"), "XB");
        assert_eq!(registry.group_leader("CB"), "CB");
        assert_eq!(registry.group_members("XF"), vec!["XB", "XE", "XF"]);
        assert_eq!(registry.group_members("SB"), vec!["SB"]);
        assert!(registry.is_compound("XB"));
    }

    #[test]
    fn test_group_member_without_layout() {
        let layout = RecordLayout::new("AA", &[("A", 0, 8)]).unwrap();
        let err = LayoutRegistry::from_layouts(vec![layout], vec![vec!["AA", "AB"]]).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidLayout { code, .. } if code == "AB"));
    }

    #[test]
    fn test_parse_short_record_blank_fills() {
        let registry = LayoutRegistry::builtin().unwrap();
        let layout = registry.layout("SY").unwrap();
        let values = layout.parse(b"SY861253  12345");
        assert_eq!(values[0], "SY");
        assert_eq!(values[1], "861");
        assert_eq!(values[2], "253");
        assert_eq!(values[3], "12345");
        assert!(values[4..].iter().all(String::is_empty));
    }
}
