//! Semver subset parsing and pick-highest matching
//!
//! The registry speaks a deliberately small version language:
//!
//! - versions are plain `MAJOR.MINOR.PATCH` triples (no pre-release or
//!   build metadata)
//! - specs are `^X[.Y[.Z]]` (caret, missing parts normalized to 0),
//!   `=X.Y.Z` (exact), or a bare `X[.Y[.Z]]` (also exact)
//!
//! Caret follows Cargo/npm semantics: the upper bound bumps the left-most
//! non-zero component, so `^1.2` admits `[1.2.0, 2.0.0)` while `^0.3`
//! admits `[0.3.0, 0.4.0)`.

use semver::Version;

use crate::core::BotpackError;

/// Parse a 3-segment version, rejecting pre-release and build metadata.
pub fn parse_version(version: &str) -> Result<Version, BotpackError> {
    let v = Version::parse(version.trim())
        .map_err(|_| BotpackError::InvalidVersionSpec { spec: version.to_string() })?;
    if !v.pre.is_empty() || !v.build.is_empty() {
        return Err(BotpackError::InvalidVersionSpec { spec: version.to_string() });
    }
    Ok(v)
}

/// Normalize a spec version shorthand (`1`, `1.2`) to a full triple.
fn normalize_spec_version(v: &str) -> Result<Version, BotpackError> {
    let v = v.trim();
    let segments = v.split('.').count();
    let full = match segments {
        1 => format!("{v}.0.0"),
        2 => format!("{v}.0"),
        3 => v.to_string(),
        _ => return Err(BotpackError::InvalidVersionSpec { spec: v.to_string() }),
    };
    parse_version(&full)
}

/// Caret upper bound: bump the left-most non-zero component.
fn caret_upper(v: &Version) -> Version {
    if v.major != 0 {
        Version::new(v.major + 1, 0, 0)
    } else if v.minor != 0 {
        Version::new(0, v.minor + 1, 0)
    } else {
        Version::new(0, 0, v.patch + 1)
    }
}

/// Does `version` satisfy `spec`?
pub fn satisfies(version: &Version, spec: &str) -> Result<bool, BotpackError> {
    let s = spec.trim();
    if s.is_empty() {
        return Err(BotpackError::InvalidVersionSpec { spec: spec.to_string() });
    }

    if let Some(rest) = s.strip_prefix('^') {
        let base = normalize_spec_version(rest)?;
        let upper = caret_upper(&base);
        return Ok(*version >= base && *version < upper);
    }

    if let Some(rest) = s.strip_prefix('=') {
        return Ok(*version == normalize_spec_version(rest)?);
    }

    if s.starts_with(|c: char| c.is_ascii_digit()) {
        return Ok(*version == normalize_spec_version(s)?);
    }

    Err(BotpackError::InvalidVersionSpec { spec: spec.to_string() })
}

/// Pick the highest version in `versions` satisfying `spec`.
///
/// Returns the original string form of the winner, or `None` when nothing
/// matches. Any unparsable version or spec is an error.
pub fn pick_highest_satisfying(
    versions: &[String],
    spec: &str,
) -> Result<Option<String>, BotpackError> {
    let mut best: Option<(Version, &str)> = None;
    for raw in versions {
        let v = parse_version(raw)?;
        if !satisfies(&v, spec)? {
            continue;
        }
        match &best {
            Some((bv, _)) if *bv >= v => {}
            _ => best = Some((v, raw)),
        }
    }
    Ok(best.map(|(_, raw)| raw.to_string()))
}
