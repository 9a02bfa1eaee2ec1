//! Media quality snapshots and their differ.
//!
//! A [`QualitySnapshot`] captures what a viewer would call "the quality" of a
//! file: resolution, codec, dynamic range and the set of audio tracks. Two
//! snapshots are equal exactly when their [`signature`](QualitySnapshot::signature)s
//! are equal, so track order and incidental stream metadata never count as a
//! change.

pub mod audio;
pub mod range;

pub use audio::BestAudio;
pub use range::RangeProfile;

use crate::library::{LibraryItem, MediaStream};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualitySnapshot {
    pub resolution_label: String,
    pub video_codec_class: String,
    /// Display labels in [`RangeProfile`] order.
    pub dynamic_range_profiles: Vec<String>,
    pub audio_tracks: BTreeSet<String>,
    pub best_audio: Option<BestAudio>,
}

impl QualitySnapshot {
    /// Canonical comparison string: resolution, codec, sorted range profiles
    /// and sorted audio labels.
    pub fn signature(&self) -> String {
        let mut profiles = self.dynamic_range_profiles.clone();
        profiles.sort();
        let audio: Vec<&str> = self.audio_tracks.iter().map(String::as_str).collect();
        format!(
            "{}|{}|{}|{}",
            self.resolution_label,
            self.video_codec_class,
            profiles.join(","),
            audio.join(",")
        )
    }

    pub fn range_label(&self) -> String {
        self.dynamic_range_profiles.join(", ")
    }
}

impl PartialEq for QualitySnapshot {
    fn eq(&self, other: &Self) -> bool {
        self.signature() == other.signature()
    }
}

impl Eq for QualitySnapshot {}

/// Build a snapshot from an item's details.
///
/// Streams come from the item itself or, when it lists none, from the first
/// media source that has any. Returns `None` when there are no streams at all.
pub fn build_snapshot(item: &LibraryItem) -> Option<QualitySnapshot> {
    let streams: &[MediaStream] = if !item.media_streams.is_empty() {
        &item.media_streams
    } else {
        item.media_sources
            .iter()
            .map(|source| source.media_streams.as_slice())
            .find(|streams| !streams.is_empty())?
    };

    let video = streams.iter().find(|s| s.is_video());
    let audio: Vec<&MediaStream> = streams.iter().filter(|s| s.is_audio()).collect();

    let (resolution_label, video_codec_class, dynamic_range_profiles) = match video {
        Some(video) => (
            resolution_label(video.width, video.height),
            codec_class(video.codec.as_deref()),
            range::detect_profiles(video)
                .into_iter()
                .map(|p| p.to_string())
                .collect(),
        ),
        None => ("Unknown".to_string(), "Unknown".to_string(), Vec::new()),
    };

    Some(QualitySnapshot {
        resolution_label,
        video_codec_class,
        dynamic_range_profiles,
        audio_tracks: audio.iter().map(|s| audio::audio_label(s)).collect(),
        best_audio: audio::best_audio(audio.iter().copied()),
    })
}

/// Resolution bucket from frame dimensions. Width is checked as well as
/// height so letterboxed and cropped encodes land in the right bucket.
pub fn resolution_label(width: Option<u32>, height: Option<u32>) -> String {
    let w = width.unwrap_or(0);
    let h = height.unwrap_or(0);
    if w == 0 && h == 0 {
        return "Unknown".to_string();
    }

    let label = if w >= 3800 || h >= 2000 {
        "2160p"
    } else if w >= 2500 || h >= 1400 {
        "1440p"
    } else if w >= 1900 || h >= 1000 {
        "1080p"
    } else if w >= 1200 || h >= 700 {
        "720p"
    } else if h >= 560 {
        "576p"
    } else if h >= 460 {
        "480p"
    } else {
        return format!("{h}p");
    };
    label.to_string()
}

pub fn codec_class(codec: Option<&str>) -> String {
    let Some(codec) = codec.filter(|c| !c.is_empty()) else {
        return "Unknown".to_string();
    };
    match codec.to_lowercase().as_str() {
        "hevc" | "h265" | "x265" => "HEVC".to_string(),
        "h264" | "avc" | "x264" => "H264".to_string(),
        "av1" => "AV1".to_string(),
        "vp9" => "VP9".to_string(),
        "mpeg2video" | "mpeg2" => "MPEG2".to_string(),
        "vc1" => "VC1".to_string(),
        other => other.to_uppercase(),
    }
}

/// Human-readable before/after lines for a quality change.
pub fn describe_change(before: &QualitySnapshot, after: &QualitySnapshot) -> String {
    let mut lines = Vec::new();

    if before.resolution_label != after.resolution_label {
        lines.push(format!(
            "Resolution: {} → {}",
            before.resolution_label, after.resolution_label
        ));
    }
    if before.video_codec_class != after.video_codec_class {
        lines.push(format!(
            "Video: {} → {}",
            before.video_codec_class, after.video_codec_class
        ));
    }

    let mut before_ranges = before.dynamic_range_profiles.clone();
    let mut after_ranges = after.dynamic_range_profiles.clone();
    before_ranges.sort();
    after_ranges.sort();
    if before_ranges != after_ranges {
        lines.push(format!(
            "Dynamic range: {} → {}",
            display_or_none(&before.range_label()),
            display_or_none(&after.range_label())
        ));
    }

    if before.audio_tracks != after.audio_tracks {
        lines.push(format!("Audio: {}", join_or_none(&after.audio_tracks)));
        lines.push(format!("Previously: {}", join_or_none(&before.audio_tracks)));
    }

    if before.best_audio != after.best_audio {
        if let Some(best) = &after.best_audio {
            let previous = before
                .best_audio
                .as_ref()
                .map_or_else(|| "none".to_string(), ToString::to_string);
            lines.push(format!("Best audio: {previous} → {best}"));
        }
    }

    lines.join("\n")
}

fn display_or_none(s: &str) -> &str {
    if s.is_empty() {
        "none"
    } else {
        s
    }
}

fn join_or_none(tracks: &BTreeSet<String>) -> String {
    if tracks.is_empty() {
        "none".to_string()
    } else {
        tracks.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}
