//! Unit lists from the command line or a participants TSV.
use crate::identity::UnitIdentity;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::path::Path;

const PARTICIPANT_COLUMN: &str = "participant_id";
const SESSION_COLUMN: &str = "session_id";
const LONG_COLUMN: &str = "long_id";

/// Parse `participant,session,long` from a `--unit` value.
pub fn parse_unit_arg(value: &str) -> Result<UnitIdentity> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    let [participant, session, long] = parts.as_slice() else {
        return Err(anyhow!(
            "expected PARTICIPANT,SESSION,LONG (got {value:?})"
        ));
    };
    UnitIdentity::new(*participant, *session, *long).with_context(|| format!("unit {value:?}"))
}

pub fn read_units_tsv(path: &Path) -> Result<Vec<UnitIdentity>> {
    let text = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    parse_units_tsv(&text).with_context(|| format!("parse {}", path.display()))
}

/// Parse a TSV with `participant_id`, `session_id`, `long_id` columns.
pub fn parse_units_tsv(text: &str) -> Result<Vec<UnitIdentity>> {
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty());
    let (_, header) = lines.next().ok_or_else(|| anyhow!("empty units file"))?;
    let columns: Vec<&str> = header.split('\t').map(str::trim).collect();
    let column = |name: &str| {
        columns
            .iter()
            .position(|col| *col == name)
            .ok_or_else(|| anyhow!("missing column {name}"))
    };
    let participant_col = column(PARTICIPANT_COLUMN)?;
    let session_col = column(SESSION_COLUMN)?;
    let long_col = column(LONG_COLUMN)?;

    let mut units = Vec::new();
    for (index, line) in lines {
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        let field = |col: usize| {
            fields
                .get(col)
                .copied()
                .ok_or_else(|| anyhow!("line {}: too few columns", index + 1))
        };
        let unit = UnitIdentity::new(field(participant_col)?, field(session_col)?, field(long_col)?)
            .with_context(|| format!("line {}", index + 1))?;
        if !units.contains(&unit) {
            units.push(unit);
        }
    }
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unit_argument() {
        let unit = parse_unit_arg("sub-01, ses-M00,long-M00M18").unwrap();
        assert_eq!(unit, UnitIdentity::new("sub-01", "ses-M00", "long-M00M18").unwrap());
        assert!(parse_unit_arg("sub-01,ses-M00").is_err());
        assert!(parse_unit_arg("sub_01,ses-M00,long-M00").is_err());
    }

    #[test]
    fn parses_tsv_by_column_name() {
        let text = "session_id\tparticipant_id\tlong_id\n\
                    ses-M00\tsub-01\tlong-M00M18\n\
                    \n\
                    ses-M18\tsub-01\tlong-M00M18\n\
                    ses-M18\tsub-01\tlong-M00M18\n";
        let units = parse_units_tsv(text).unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(units[1].session_id, "ses-M18");
        assert_eq!(units[1].participant_id, "sub-01");
    }

    #[test]
    fn tsv_errors_name_the_line() {
        let err = parse_units_tsv("participant_id\tsession_id\tlong_id\nsub-01\tses-M00\n")
            .unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
        assert!(parse_units_tsv("participant_id\tsession_id\n").is_err());
        assert!(parse_units_tsv("").is_err());
    }
}
