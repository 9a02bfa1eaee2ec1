//! Notification texts. Telegram legacy Markdown: `*bold*`, `[text](url)`.

use reelwatch_common::EntryScope;

/// Drop a trailing `" (2010)"` that some libraries bake into names.
pub fn clean_title(name: &str, year: Option<i32>) -> String {
    match year {
        Some(year) => name.replace(&format!(" ({year})"), "").trim().to_string(),
        None => name.trim().to_string(),
    }
}

fn year_suffix(year: Option<i32>) -> String {
    year.map(|y| format!(" *({y})*")).unwrap_or_default()
}

fn push_paragraph(out: &mut String, text: Option<&str>) {
    if let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) {
        out.push_str("\n\n");
        out.push_str(text);
    }
}

pub fn new_movie(name: &str, year: Option<i32>, overview: Option<&str>, runtime: Option<&str>) -> String {
    let mut text = format!(
        "*🍿New Movie Added🍿*\n\n*{}*{}",
        clean_title(name, year),
        year_suffix(year)
    );
    push_paragraph(&mut text, overview);
    if let Some(runtime) = runtime.filter(|r| !r.is_empty()) {
        text.push_str(&format!("\n\nRuntime\n{runtime}"));
    }
    text
}

pub fn new_season(
    series_name: &str,
    year: Option<i32>,
    season_name: &str,
    overview: Option<&str>,
) -> String {
    let mut text = format!(
        "*New Season Added*\n\n*{}*{}\n\n*{}*",
        clean_title(series_name, year),
        year_suffix(year),
        season_name
    );
    push_paragraph(&mut text, overview);
    text
}

pub struct EpisodeDetails<'a> {
    pub series_name: &'a str,
    pub season_number: Option<u32>,
    pub episode_number: Option<u32>,
    pub episode_title: &'a str,
    pub premiere_date: Option<&'a str>,
    pub overview: Option<&'a str>,
    /// Episodes of the season now in the library.
    pub season_episode_count: u32,
}

pub fn new_episodes(details: &EpisodeDetails<'_>) -> String {
    let mut text = String::from("*New Episode Added*");
    if let Some(date) = details.premiere_date {
        text.push_str(&format!("\n\n*Release Date*: {date}"));
    }
    text.push_str(&format!("\n\n*Series*: {}", details.series_name));
    if let (Some(season), Some(episode)) = (details.season_number, details.episode_number) {
        text.push_str(&format!(" *S*{season:02}*E*{episode:02}"));
    }
    text.push_str(&format!("\n*Episode Title*: {}", details.episode_title));
    if details.season_episode_count > 1 {
        text.push_str(&format!(
            "\n*Episodes in season*: {}",
            details.season_episode_count
        ));
    }
    push_paragraph(&mut text, details.overview);
    text
}

pub fn new_album(
    artist: Option<&str>,
    album: &str,
    year: Option<i32>,
    overview: Option<&str>,
    runtime: Option<&str>,
) -> String {
    let mut text = String::from("*🎵 New Album Added 🎵*");
    if let Some(artist) = artist.filter(|a| !a.is_empty()) {
        text.push_str(&format!("\n\n*{artist}*"));
    }
    match year {
        Some(year) => text.push_str(&format!("\n\n*{album} ({year})*")),
        None => text.push_str(&format!("\n\n*{album}*")),
    }
    push_paragraph(&mut text, overview);
    if let Some(runtime) = runtime.filter(|r| !r.is_empty()) {
        text.push_str(&format!("\n\nRuntime\n{runtime}"));
    }
    text
}

pub fn quality_updated(title: &str, year: Option<i32>, scope: &EntryScope, diff: &str) -> String {
    let mut text = format!(
        "*Quality Updated*\n\n*{}*{}",
        clean_title(title, year),
        year_suffix(year)
    );
    if let EntryScope::Season { .. } = scope {
        text.push_str(&format!("\n{}", capitalize(&scope.to_string())));
    }
    push_paragraph(&mut text, Some(diff));
    text
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn movie_title_loses_baked_in_year() {
        let text = new_movie("Inception (2010)", Some(2010), Some("Dreams."), Some("2h 28m"));
        assert!(text.starts_with("*🍿New Movie Added🍿*\n\n*Inception* *(2010)*"));
        assert!(text.contains("Dreams."));
        assert!(text.ends_with("Runtime\n2h 28m"));
    }

    #[test]
    fn empty_overview_is_skipped() {
        let text = new_season("Dark", Some(2017), "Season 2", Some("  "));
        assert_eq!(text, "*New Season Added*\n\n*Dark* *(2017)*\n\n*Season 2*");
    }

    #[test]
    fn episode_numbering() {
        let text = new_episodes(&EpisodeDetails {
            series_name: "Severance",
            season_number: Some(2),
            episode_number: Some(3),
            episode_title: "Who Is Alive?",
            premiere_date: Some("2025-01-31"),
            overview: None,
            season_episode_count: 3,
        });
        assert!(text.contains("*Series*: Severance *S*02*E*03"));
        assert!(text.contains("*Release Date*: 2025-01-31"));
        assert!(text.contains("*Episodes in season*: 3"));
    }

    #[test]
    fn quality_update_names_the_season() {
        let text = quality_updated(
            "Breaking Bad",
            Some(2008),
            &EntryScope::season(1, [1, 2]),
            "Resolution: 720p → 1080p",
        );
        assert!(text.contains("Season 1 (E01, E02)"));
        assert!(text.ends_with("Resolution: 720p → 1080p"));
    }
}
