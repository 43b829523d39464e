use autotrace_core::{AutotraceError, Result};
use semver::{Version, VersionReq};

use crate::probe::{self, ProbeId};

/// Record layout a probe captures with. Most probes have a single layout;
/// those whose captured structure changed across library releases have one
/// variant per release range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Standard,
    /// net/http server before mux patterns existed.
    HttpServerLegacy,
    /// net/http server that also captures the matched mux pattern.
    HttpServerPattern,
}

const VERSIONED_LAYOUTS: &[(ProbeId, &str, Layout)] = &[
    (probe::HTTP_SERVER, "<1.22.0", Layout::HttpServerLegacy),
    (probe::HTTP_SERVER, ">=1.22.0", Layout::HttpServerPattern),
];

/// Picks the layout `probe` records with against library (or runtime)
/// `version`.
pub fn select_layout(probe: ProbeId, version: &Version) -> Result<Layout> {
    let mut ranged = false;
    for (candidate, req, layout) in VERSIONED_LAYOUTS {
        if *candidate != probe {
            continue;
        }
        ranged = true;

        let req = VersionReq::parse(req)
            .map_err(|e| AutotraceError::Internal(format!("bad version range {req}: {e}")))?;
        if req.matches(version) {
            return Ok(*layout);
        }
    }

    if ranged {
        return Err(AutotraceError::Probe(format!(
            "no {probe} layout supports version {version}"
        )));
    }
    Ok(Layout::Standard)
}

/// Parses versions as reported by the introspection side: `go1.22`,
/// `v1.7.3`, `1.21.0`. Missing minor or patch components read as zero and
/// anything after the numeric part (`rc1`, build tags) is ignored.
pub fn parse_runtime_version(raw: &str) -> Result<Version> {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix("go")
        .or_else(|| trimmed.strip_prefix('v'))
        .unwrap_or(trimmed);

    let numeric_end = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    if numeric_end == 0 {
        return Err(AutotraceError::Parse(format!("invalid version: {raw}")));
    }

    let mut parts = trimmed[..numeric_end]
        .split('.')
        .filter(|p| !p.is_empty())
        .map(|p| p.parse::<u64>());

    let mut next = |name: &str| -> Result<u64> {
        match parts.next() {
            None => Ok(0),
            Some(Ok(n)) => Ok(n),
            Some(Err(e)) => Err(AutotraceError::Parse(format!(
                "invalid {name} component in version {raw}: {e}"
            ))),
        }
    };

    let major = next("major")?;
    let minor = next("minor")?;
    let patch = next("patch")?;
    Ok(Version::new(major, minor, patch))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_server_layout_follows_version() {
        let legacy = Version::new(1, 21, 9);
        let pattern = Version::new(1, 22, 0);
        assert_eq!(
            select_layout(probe::HTTP_SERVER, &legacy).unwrap(),
            Layout::HttpServerLegacy
        );
        assert_eq!(
            select_layout(probe::HTTP_SERVER, &pattern).unwrap(),
            Layout::HttpServerPattern
        );
        assert_eq!(
            select_layout(probe::HTTP_SERVER, &Version::new(1, 23, 4)).unwrap(),
            Layout::HttpServerPattern
        );
    }

    #[test]
    fn unversioned_probes_use_standard_layout() {
        assert_eq!(
            select_layout(probe::GO_REDIS, &Version::new(9, 5, 1)).unwrap(),
            Layout::Standard
        );
    }

    #[test]
    fn prerelease_outside_every_range_is_an_error() {
        let rc = Version::parse("1.22.0-rc.1").unwrap();
        assert!(select_layout(probe::HTTP_SERVER, &rc).is_err());
    }

    #[test]
    fn parses_runtime_versions() {
        assert_eq!(parse_runtime_version("go1.22").unwrap(), Version::new(1, 22, 0));
        assert_eq!(parse_runtime_version("go1.21.5").unwrap(), Version::new(1, 21, 5));
        assert_eq!(parse_runtime_version("v9.0.2").unwrap(), Version::new(9, 0, 2));
        assert_eq!(parse_runtime_version("go1.22rc1").unwrap(), Version::new(1, 22, 0));
        assert!(parse_runtime_version("devel").is_err());
        assert!(parse_runtime_version("").is_err());
    }
}
