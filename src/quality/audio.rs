//! Audio track labels and best-track ranking.

use crate::library::MediaStream;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Language codes recognised as a leading prefix of a display title.
const LANGUAGE_CODES: &[&str] = &[
    "en", "eng", "ru", "rus", "de", "ger", "deu", "fr", "fre", "fra", "es", "spa", "it", "ita",
    "ja", "jpn", "ko", "kor", "zh", "chi", "zho", "pt", "por", "nl", "nld", "dut", "pl", "pol",
    "sv", "swe", "uk", "ukr", "tr", "tur", "ar", "ara", "hi", "hin", "cs", "cze", "ces", "fi",
    "fin", "no", "nor", "da", "dan", "und",
];

/// `[eng] `, `(en) `, `eng: `, `en/ `, `ENG - `
static LANGUAGE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:\[([A-Za-z]{2,3})\]|\(([A-Za-z]{2,3})\)|([A-Za-z]{2,3})\s*[:/]|([A-Za-z]{2,3})\s+-)\s*")
        .unwrap()
});

/// The single best audio track of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestAudio {
    pub codec: String,
    pub channels: u32,
    pub is_immersive: bool,
}

impl fmt::Display for BestAudio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.codec.is_empty() {
            f.write_str("Audio")?;
        } else {
            f.write_str(&self.codec.to_uppercase())?;
        }
        if self.channels > 0 {
            write!(f, " {}", layout_name(self.channels))?;
        }
        if self.is_immersive {
            f.write_str(" Atmos")?;
        }
        Ok(())
    }
}

/// Human-readable label for one audio stream.
pub fn audio_label(stream: &MediaStream) -> String {
    let label = stream
        .display_title
        .as_deref()
        .map(strip_language_prefix)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .unwrap_or_else(|| synthesize_label(stream));

    if has_atmos_marker(stream) && !label.to_lowercase().contains("atmos") {
        format!("{label} (Atmos)")
    } else {
        label
    }
}

fn synthesize_label(stream: &MediaStream) -> String {
    let mut parts = Vec::new();
    if let Some(codec) = stream.codec.as_deref().filter(|c| !c.is_empty()) {
        parts.push(codec.to_uppercase());
    }
    if let Some(layout) = channel_layout(stream) {
        parts.push(layout);
    }
    if parts.is_empty() {
        parts.push("Audio".to_string());
    }

    let mut label = parts.join(" ");
    if let Some(lang) = stream.language.as_deref().filter(|l| !l.is_empty()) {
        label.push_str(&format!(" ({lang})"));
    }
    label
}

/// Remove a leading language-code prefix in any of the recognised forms.
/// Prefixes that are not language codes are left alone.
pub fn strip_language_prefix(title: &str) -> &str {
    let Some(caps) = LANGUAGE_PREFIX.captures(title) else {
        return title;
    };
    let code = (1..=4).find_map(|i| caps.get(i)).map(|m| m.as_str().to_lowercase());
    match (code, caps.get(0)) {
        (Some(code), Some(whole)) if LANGUAGE_CODES.contains(&code.as_str()) => {
            &title[whole.end()..]
        }
        _ => title,
    }
}

fn channel_layout(stream: &MediaStream) -> Option<String> {
    match stream.channels {
        Some(channels) => Some(layout_name(channels)),
        None => stream.channel_layout.clone(),
    }
}

fn layout_name(channels: u32) -> String {
    match channels {
        2 => "2.0".to_string(),
        6 => "5.1".to_string(),
        8 => "7.1".to_string(),
        other => other.to_string(),
    }
}

fn has_atmos_marker(stream: &MediaStream) -> bool {
    [
        stream.profile.as_deref(),
        stream.title.as_deref(),
        stream.display_title.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|s| s.to_lowercase().contains("atmos"))
}

fn codec_rank(codec: &str) -> u8 {
    match codec.to_lowercase().as_str() {
        "truehd" => 6,
        "dts-hd" | "dtshd" | "dts-hd ma" => 5,
        "eac3" | "e-ac-3" => 4,
        "dts" => 3,
        "ac3" => 2,
        "aac" => 1,
        _ => 0,
    }
}

/// Immersive audio wins, then channel count, then codec.
pub fn best_audio<'a>(streams: impl IntoIterator<Item = &'a MediaStream>) -> Option<BestAudio> {
    streams
        .into_iter()
        .map(|s| BestAudio {
            codec: s.codec.clone().unwrap_or_default().to_lowercase(),
            channels: s.channels.unwrap_or(0),
            is_immersive: has_atmos_marker(s),
        })
        .max_by(compare_audio)
}

fn compare_audio(a: &BestAudio, b: &BestAudio) -> Ordering {
    a.is_immersive
        .cmp(&b.is_immersive)
        .then(a.channels.cmp(&b.channels))
        .then(codec_rank(&a.codec).cmp(&codec_rank(&b.codec)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn audio(codec: &str, channels: u32, lang: Option<&str>, display: Option<&str>) -> MediaStream {
        MediaStream {
            stream_type: Some("Audio".into()),
            codec: Some(codec.into()),
            channels: Some(channels),
            language: lang.map(String::from),
            display_title: display.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn strips_known_language_prefixes() {
        assert_eq!(strip_language_prefix("[eng] Dolby TrueHD 7.1"), "Dolby TrueHD 7.1");
        assert_eq!(strip_language_prefix("(en) AC3 5.1"), "AC3 5.1");
        assert_eq!(strip_language_prefix("eng: DTS"), "DTS");
        assert_eq!(strip_language_prefix("en/ AAC"), "AAC");
        assert_eq!(strip_language_prefix("ENG - EAC3 5.1"), "EAC3 5.1");
    }

    #[test]
    fn leaves_unknown_prefixes() {
        assert_eq!(strip_language_prefix("DTS: X"), "DTS: X");
        assert_eq!(strip_language_prefix("[xyz] AAC"), "[xyz] AAC");
    }

    #[test]
    fn synthesizes_label_without_display_title() {
        let s = audio("ac3", 6, Some("eng"), None);
        assert_eq!(audio_label(&s), "AC3 5.1 (eng)");

        let s = audio("aac", 2, None, None);
        assert_eq!(audio_label(&s), "AAC 2.0");

        let s = audio("flac", 4, None, None);
        assert_eq!(audio_label(&s), "FLAC 4");
    }

    #[test]
    fn appends_atmos_when_missing() {
        let mut s = audio("truehd", 8, Some("eng"), Some("[eng] TrueHD 7.1"));
        s.profile = Some("Dolby TrueHD + Dolby Atmos".into());
        assert_eq!(audio_label(&s), "TrueHD 7.1 (Atmos)");

        let mut s = audio("truehd", 8, None, Some("TrueHD Atmos 7.1"));
        s.profile = Some("Dolby Atmos".into());
        assert_eq!(audio_label(&s), "TrueHD Atmos 7.1");
    }

    #[test]
    fn best_audio_prefers_immersive_then_channels() {
        let mut atmos = audio("eac3", 6, None, None);
        atmos.title = Some("Atmos".into());
        let dts = audio("dts", 8, None, None);
        let ac3 = audio("ac3", 8, None, None);

        let best = best_audio([&dts, &atmos, &ac3]).unwrap();
        assert_eq!(best.codec, "eac3");
        assert!(best.is_immersive);

        let best = best_audio([&ac3, &dts]).unwrap();
        assert_eq!(best.codec, "dts");
        assert!(best_audio(std::iter::empty()).is_none());
    }

    #[test]
    fn best_audio_display() {
        let mut truehd = audio("truehd", 8, None, None);
        truehd.profile = Some("Dolby TrueHD + Dolby Atmos".into());
        assert_eq!(best_audio([&truehd]).unwrap().to_string(), "TRUEHD 7.1 Atmos");

        let mut unknown = audio("", 0, None, None);
        unknown.channels = None;
        assert_eq!(best_audio([&unknown]).unwrap().to_string(), "Audio");
    }
}
