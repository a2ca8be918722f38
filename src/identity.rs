//! Unit identity and the compound names derived from it.
//!
//! `corrected_id` follows the naming recon-all uses for longitudinal output
//! directories, so it must be reproduced exactly for archive lookups to work.
use crate::error::{PipelineError, PipelineResult};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

/// Separator used inside every compound name.
pub const SEPARATOR: char = '_';

/// Marker recon-all inserts between the timepoint and template ids.
pub const LONG_MARKER: &str = ".long.";

/// One timepoint of one participant inside one longitudinal group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct UnitIdentity {
    pub participant_id: String,
    pub session_id: String,
    pub long_id: String,
}

impl UnitIdentity {
    pub fn new(
        participant_id: impl Into<String>,
        session_id: impl Into<String>,
        long_id: impl Into<String>,
    ) -> PipelineResult<Self> {
        let identity = Self {
            participant_id: participant_id.into(),
            session_id: session_id.into(),
            long_id: long_id.into(),
        };
        check_component("participant_id", &identity.participant_id)?;
        check_component("session_id", &identity.session_id)?;
        check_component("long_id", &identity.long_id)?;
        Ok(identity)
    }

    /// `{participant}_{session}_{long}`: workspace directory name.
    pub fn image_id(&self) -> String {
        format!(
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            self.participant_id, self.session_id, self.long_id
        )
    }

    /// `{participant}_{session}`: cross-sectional subject id.
    pub fn timepoint_id(&self) -> String {
        format!("{}{SEPARATOR}{}", self.participant_id, self.session_id)
    }

    /// `{participant}_{long}`: unbiased template subject id.
    pub fn template_id(&self) -> String {
        format!("{}{SEPARATOR}{}", self.participant_id, self.long_id)
    }

    /// Output directory name recon-all assigns to the corrected timepoint.
    pub fn corrected_id(&self) -> String {
        format!("{}{LONG_MARKER}{}", self.timepoint_id(), self.template_id())
    }
}

impl fmt::Display for UnitIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} | {}",
            self.participant_id, self.session_id, self.long_id
        )
    }
}

fn check_component(field: &'static str, value: &str) -> PipelineResult<()> {
    let reason = if value.is_empty() {
        "must be non-empty"
    } else if value.contains(SEPARATOR) {
        "must not contain '_'"
    } else if value.contains(LONG_MARKER) {
        "must not contain '.long.'"
    } else {
        return Ok(());
    };
    Err(PipelineError::InvalidIdentity {
        field,
        value: value.to_string(),
        reason,
    })
}

/// Compose the workspace name for a unit.
pub fn build_image_id(
    participant_id: &str,
    session_id: &str,
    long_id: &str,
) -> PipelineResult<String> {
    Ok(UnitIdentity::new(participant_id, session_id, long_id)?.image_id())
}

fn corrected_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([^_]+)_([^_]+)_([^_]+)$").expect("valid corrected id regex")
    })
}

/// Recover the unit identity from a recon-all longitudinal directory name.
///
/// Components never contain `_`, so the name splits into exactly three fields:
/// `{p}`, `{s}.long.{p}` and `{l}`. The middle field is split by stripping the
/// known participant suffix, since sessions and participants may both contain
/// `long.` fragments.
pub fn parse_corrected_id(corrected_id: &str) -> PipelineResult<UnitIdentity> {
    let malformed = || PipelineError::MalformedIdentity(corrected_id.to_string());
    let captures = corrected_id_pattern()
        .captures(corrected_id)
        .ok_or_else(malformed)?;
    let participant = &captures[1];
    let session = captures[2]
        .strip_suffix(participant)
        .and_then(|head| head.strip_suffix(LONG_MARKER))
        .ok_or_else(malformed)?;
    UnitIdentity::new(participant, session, &captures[3]).map_err(|_| malformed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_names_follow_recon_all_convention() {
        let identity = UnitIdentity::new("sub-01", "ses-M00", "long-M00M18").unwrap();
        assert_eq!(identity.image_id(), "sub-01_ses-M00_long-M00M18");
        assert_eq!(identity.timepoint_id(), "sub-01_ses-M00");
        assert_eq!(identity.template_id(), "sub-01_long-M00M18");
        assert_eq!(
            identity.corrected_id(),
            "sub-01_ses-M00.long.sub-01_long-M00M18"
        );
    }

    #[test]
    fn corrected_id_round_trips() {
        for (p, s, l) in [
            ("sub-01", "ses-M00", "long-M00M18"),
            ("sub-CLNC01", "ses-M18", "long-M00M18M36"),
            ("a", "b", "c"),
            ("sub.x", "ses.y", "long.z"),
            ("long.q", "y", "z"),
            ("long.q", "y.long", "long"),
            ("p", "long.p", "long.p"),
        ] {
            let identity = UnitIdentity::new(p, s, l).unwrap();
            let parsed = parse_corrected_id(&identity.corrected_id()).unwrap();
            assert_eq!(parsed, identity);
        }
    }

    #[test]
    fn build_image_id_rejects_empty_components() {
        let err = build_image_id("sub-01", "", "long-M00").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidIdentity {
                field: "session_id",
                ..
            }
        ));
        assert!(build_image_id("", "ses-M00", "long-M00").is_err());
        assert!(build_image_id("sub-01", "ses-M00", "").is_err());
    }

    #[test]
    fn build_image_id_rejects_separator_in_component() {
        let err = build_image_id("sub_01", "ses-M00", "long-M00").unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidIdentity {
                field: "participant_id",
                ..
            }
        ));
    }

    #[test]
    fn parse_rejects_foreign_names() {
        for name in [
            "sub-01_ses-M00",
            "sub-01_ses-M00_long-M00M18",
            "sub-01_ses-M00.long.sub-02_long-M00M18",
            "sub-01_ses-M00.long.sub-01",
            ".long.",
            "sub-01_ses_M00.long.sub-01_long-M00M18",
            "sub-01_.long.sub-01_long-M00M18",
            "sub-01_ses-M00.long.x.long.sub-01_long-M00M18",
            "",
        ] {
            let err = parse_corrected_id(name).unwrap_err();
            assert!(
                matches!(err, PipelineError::MalformedIdentity(ref value) if value == name),
                "expected malformed for {name:?}, got {err}"
            );
        }
    }
}
