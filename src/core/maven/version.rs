use std::cmp::Ordering;

/// Numeric `major.minor.patch` view of a version string.
///
/// Missing components count as zero. Anything after `-` or `+` is kept as
/// a qualifier (`SNAPSHOT`, `beta.1`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub qualifier: Option<String>,
}

impl ReleaseVersion {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (core, qualifier) = match raw.find(['-', '+']) {
            Some(idx) => (&raw[..idx], Some(raw[idx + 1..].to_string())),
            None => (raw, None),
        };

        let mut parts = core.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        let patch = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }

        Some(Self {
            major,
            minor,
            patch,
            qualifier,
        })
    }

    pub fn is_release(&self) -> bool {
        self.qualifier.is_none()
    }

    fn numeric(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }
}

/// Pick the highest release on `current`'s major line, never going below `current`.
///
/// Returns `None` when `current` has no numeric major or nothing beats it.
pub fn select_latest_minor_patch<'a, I>(current: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let base = ReleaseVersion::parse(current)?;

    let best = candidates
        .into_iter()
        .filter_map(|raw| ReleaseVersion::parse(raw).map(|v| (raw, v)))
        .filter(|(_, v)| v.is_release() && v.major == base.major)
        .max_by(|(_, a), (_, b)| a.numeric().cmp(&b.numeric()))?;

    match best.1.numeric().cmp(&base.numeric()) {
        Ordering::Greater => Some(best.0.trim().to_string()),
        _ => None,
    }
}

/// Same major line as `version`; unparseable versions never match.
pub fn shares_major(version: &str, other: &str) -> bool {
    match (ReleaseVersion::parse(version), ReleaseVersion::parse(other)) {
        (Some(a), Some(b)) => a.major == b.major,
        _ => false,
    }
}
