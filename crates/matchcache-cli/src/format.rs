//! Plain-text rendering of the profile list.

use matchcache_core::{CachedProfile, DecisionStatus, Notice, PendingAction};

/// Column widths for the profile table
const NAME_WIDTH: usize = 24;
const PLACE_WIDTH: usize = 28;

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Short status marker for the table
pub fn status_marker(status: DecisionStatus) -> &'static str {
    match status {
        DecisionStatus::Undecided => "-",
        DecisionStatus::Accepted => "accepted",
        DecisionStatus::Declined => "declined",
    }
}

/// "City, Country", or whichever half is present
pub fn format_place(profile: &CachedProfile) -> String {
    let city = profile.fields.city.trim();
    let country = profile.fields.country.trim();
    match (city.is_empty(), country.is_empty()) {
        (false, false) => format!("{}, {}", city, country),
        (false, true) => city.to_string(),
        (true, false) => country.to_string(),
        (true, true) => String::new(),
    }
}

pub fn format_row(profile: &CachedProfile) -> String {
    format!(
        "{}  {:<name_w$}  {:>3}  {:<place_w$}  {:<8}  {}",
        profile.id,
        truncate_string(&profile.fields.name, NAME_WIDTH),
        profile.fields.age,
        truncate_string(&format_place(profile), PLACE_WIDTH),
        status_marker(profile.status),
        profile.avatar_display(),
        name_w = NAME_WIDTH,
        place_w = PLACE_WIDTH,
    )
}

pub fn format_table(profiles: &[CachedProfile]) -> String {
    if profiles.is_empty() {
        return "No profiles.".to_string();
    }
    profiles
        .iter()
        .map(format_row)
        .collect::<Vec<_>>()
        .join("\n")
}

/// "12 profiles, 3 decided"
pub fn format_summary(profiles: &[CachedProfile]) -> String {
    let decided = profiles.iter().filter(|p| p.status.is_decided()).count();
    format!("{} profiles, {} decided", profiles.len(), decided)
}

pub fn format_notice(notice: Option<Notice>) -> Option<String> {
    notice.map(|n| format!("! {}", n))
}

pub fn format_pending(actions: &[PendingAction]) -> String {
    match actions.len() {
        0 => "No pending decisions.".to_string(),
        1 => "1 pending decision.".to_string(),
        n => format!("{} pending decisions.", n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matchcache_core::models::ProfileFields;
    use matchcache_core::{Decision, ProfileId};

    fn profile(city: &str, country: &str) -> CachedProfile {
        CachedProfile::new(
            ProfileId::random(),
            ProfileFields {
                name: "Ada Lovelace".to_string(),
                age: 36,
                avatar_url: "https://example.com/a.jpg".to_string(),
                city: city.to_string(),
                country: country.to_string(),
            },
        )
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("Hello", 10), "Hello");
        assert_eq!(truncate_string("Hello World", 8), "Hello...");
        assert_eq!(truncate_string("Hi", 2), "Hi");
        assert_eq!(truncate_string("Zoë Øster", 6), "Zoë...");
    }

    #[test]
    fn test_format_place() {
        assert_eq!(format_place(&profile("Oslo", "Norway")), "Oslo, Norway");
        assert_eq!(format_place(&profile("Oslo", "")), "Oslo");
        assert_eq!(format_place(&profile(" ", "Norway")), "Norway");
        assert_eq!(format_place(&profile("", "")), "");
    }

    #[test]
    fn test_format_row_shows_status_and_avatar() {
        let mut p = profile("Oslo", "Norway");
        p.status = DecisionStatus::Declined;
        let row = format_row(&p);
        assert!(row.starts_with(&p.id.to_string()));
        assert!(row.contains("Ada Lovelace"));
        assert!(row.contains("declined"));
        assert!(row.ends_with("https://example.com/a.jpg"));
    }

    #[test]
    fn test_format_table_empty() {
        assert_eq!(format_table(&[]), "No profiles.");
    }

    #[test]
    fn test_format_pending() {
        let id = ProfileId::random();
        let one = [PendingAction { id, decision: Decision::Accepted }];
        assert_eq!(format_pending(&[]), "No pending decisions.");
        assert_eq!(format_pending(&one), "1 pending decision.");
    }

    #[test]
    fn test_format_summary() {
        let mut decided = profile("Oslo", "Norway");
        decided.status = DecisionStatus::Accepted;
        let profiles = vec![decided, profile("Bergen", "Norway")];
        assert_eq!(format_summary(&profiles), "2 profiles, 1 decided");
    }

    #[test]
    fn test_format_notice() {
        assert_eq!(format_notice(None), None);
        assert_eq!(
            format_notice(Some(Notice::ShowingCached)).unwrap(),
            "! Unable to load data. Showing cached results."
        );
    }
}
