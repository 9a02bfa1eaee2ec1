//! Dynamic-range detection over the video stream's range fields.

use crate::library::MediaStream;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;

/// A recognised dynamic-range format. Declaration order is display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RangeProfile {
    DolbyVision(Option<u32>),
    Hdr10Plus,
    Hdr10,
    Hlg,
    /// HDR of unknown flavour; only kept when nothing more specific matched.
    Hdr,
    Sdr,
}

impl RangeProfile {
    fn is_specific(&self) -> bool {
        !matches!(self, Self::Hdr | Self::Sdr)
    }
}

impl fmt::Display for RangeProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DolbyVision(Some(profile)) => write!(f, "Dolby Vision Profile {profile}"),
            Self::DolbyVision(None) => f.write_str("Dolby Vision"),
            Self::Hdr10Plus => f.write_str("HDR10+"),
            Self::Hdr10 => f.write_str("HDR10"),
            Self::Hlg => f.write_str("HLG"),
            Self::Hdr => f.write_str("HDR"),
            Self::Sdr => f.write_str("SDR"),
        }
    }
}

/// Ordered marker rules, matched against the upper-cased range fields.
static RANGE_RULES: Lazy<Vec<(Regex, RangeProfile)>> = Lazy::new(|| {
    vec![
        (
            Regex::new(r"DOVI|DOLBY ?VISION").unwrap(),
            RangeProfile::DolbyVision(None),
        ),
        (
            Regex::new(r"HDR10PLUS|HDR10\+").unwrap(),
            RangeProfile::Hdr10Plus,
        ),
        (Regex::new(r"HDR10(?:[^+P]|$)").unwrap(), RangeProfile::Hdr10),
        (Regex::new(r"HLG").unwrap(), RangeProfile::Hlg),
        (Regex::new(r"\bHDR\b").unwrap(), RangeProfile::Hdr),
    ]
});

static DV_PROFILE: Lazy<Regex> = Lazy::new(|| Regex::new(r"PROFILE\s*(\d+)").unwrap());

/// Every range format the stream advertises, de-duplicated and ordered.
/// Falls back to SDR when no marker matched.
pub fn detect_profiles(stream: &MediaStream) -> Vec<RangeProfile> {
    let fields: Vec<String> = [
        stream.video_range.as_deref(),
        stream.video_range_type.as_deref(),
        stream.video_do_vi_title.as_deref(),
    ]
    .into_iter()
    .flatten()
    .map(|s| s.to_uppercase())
    .collect();

    let mut found = BTreeSet::new();
    for field in &fields {
        for (pattern, profile) in RANGE_RULES.iter() {
            if pattern.is_match(field) {
                found.insert(*profile);
            }
        }
    }

    let dv_number = stream.dv_profile.or_else(|| {
        fields.iter().find_map(|field| {
            DV_PROFILE
                .captures(field)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse().ok())
        })
    });
    if let Some(number) = dv_number {
        found.remove(&RangeProfile::DolbyVision(None));
        found.insert(RangeProfile::DolbyVision(Some(number)));
    }

    if found.iter().any(RangeProfile::is_specific) {
        found.remove(&RangeProfile::Hdr);
    }
    if found.is_empty() {
        found.insert(RangeProfile::Sdr);
    }

    found.into_iter().collect()
}
