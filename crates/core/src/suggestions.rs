//! Suggested prompts and the greeting shown above an empty transcript.

use chrono::{DateTime, TimeZone, Timelike};

/// Built-in prompts offered before the first message
pub const DEFAULT_SUGGESTIONS: &[&str] = &[
    "Summarize the top trends in NASA bioscience publications from the last 5 years.",
    "What entities are most connected to 'microgravity' in the knowledge graph?",
    "Find correlations between radiation exposure and gene expression findings.",
    "Suggest 3 new research hypotheses to explore next.",
];

/// How many suggestions the hero strip shows
pub const MARQUEE_LEN: usize = 3;

/// The suggestions actually displayed: the first [`MARQUEE_LEN`] entries.
pub fn marquee_suggestions<S: AsRef<str>>(suggestions: &[S]) -> Vec<&str> {
    suggestions.iter().take(MARQUEE_LEN).map(|s| AsRef::<str>::as_ref(s)).collect()
}

/// Time-of-day greeting for a local hour in `0..24`
pub fn greeting(hour: u32) -> &'static str {
    match hour {
        0..5 => "Good night",
        5..12 => "Good morning",
        12..18 => "Good afternoon",
        _ => "Good evening",
    }
}

/// Headline such as `"Good morning, Researcher."`
pub fn hero_headline<Tz: TimeZone>(name: &str, now: &DateTime<Tz>) -> String {
    format!("{}, {}.", greeting(now.hour()), name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_greeting_boundaries() {
        assert_eq!(greeting(0), "Good night");
        assert_eq!(greeting(4), "Good night");
        assert_eq!(greeting(5), "Good morning");
        assert_eq!(greeting(11), "Good morning");
        assert_eq!(greeting(12), "Good afternoon");
        assert_eq!(greeting(17), "Good afternoon");
        assert_eq!(greeting(18), "Good evening");
        assert_eq!(greeting(23), "Good evening");
    }

    #[test]
    fn test_hero_headline() {
        let now = Utc.with_ymd_and_hms(2025, 10, 4, 9, 30, 0).unwrap();
        assert_eq!(hero_headline("Researcher", &now), "Good morning, Researcher.");
    }

    #[test]
    fn test_marquee_takes_three() {
        let shown = marquee_suggestions(DEFAULT_SUGGESTIONS);
        assert_eq!(shown.len(), MARQUEE_LEN);
        assert_eq!(shown[0], DEFAULT_SUGGESTIONS[0]);
        assert_eq!(shown[2], DEFAULT_SUGGESTIONS[2]);
    }

    #[test]
    fn test_marquee_with_fewer_suggestions() {
        let custom = vec!["only one".to_string()];
        assert_eq!(marquee_suggestions(&custom), vec!["only one"]);
    }
}
