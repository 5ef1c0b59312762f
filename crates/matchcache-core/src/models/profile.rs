use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Identity
// ============================================================================

/// Opaque identity of one profile, assigned by the remote directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(Uuid);

impl ProfileId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Fresh random identity. Used by tests and fixtures; real identities come
    /// from the directory.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProfileId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

// ============================================================================
// Decisions
// ============================================================================

/// Local decision state attached to a cached profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DecisionStatus {
    #[default]
    Undecided,
    Accepted,
    Declined,
}

impl DecisionStatus {
    pub fn is_decided(&self) -> bool {
        !matches!(self, DecisionStatus::Undecided)
    }
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionStatus::Undecided => write!(f, "Undecided"),
            DecisionStatus::Accepted => write!(f, "Accepted"),
            DecisionStatus::Declined => write!(f, "Declined"),
        }
    }
}

/// A user-issued decision. Only the two terminal states can be decided;
/// `Undecided` is never sent to the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Accepted,
    Declined,
}

impl From<Decision> for DecisionStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Accepted => DecisionStatus::Accepted,
            Decision::Declined => DecisionStatus::Declined,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        DecisionStatus::from(*self).fmt(f)
    }
}

/// A decision made while disconnected, waiting for replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: ProfileId,
    pub decision: Decision,
}

// ============================================================================
// Profiles
// ============================================================================

/// Fields owned by the remote directory. Every sighting of a profile
/// overwrites all of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFields {
    pub name: String,
    pub age: u32,
    pub avatar_url: String,
    pub city: String,
    pub country: String,
}

/// One profile as returned by a single page fetch. Consumed once by the
/// reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    pub id: ProfileId,
    pub fields: ProfileFields,
}

impl RemoteRecord {
    pub fn new(id: ProfileId, fields: ProfileFields) -> Self {
        Self { id, fields }
    }
}

/// Persistent local copy of a profile, one per identity.
///
/// `status` and `local_asset_path` are local state and survive remote merges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedProfile {
    pub id: ProfileId,
    #[serde(flatten)]
    pub fields: ProfileFields,
    #[serde(default)]
    pub local_asset_path: Option<PathBuf>,
    #[serde(default)]
    pub status: DecisionStatus,
}

impl CachedProfile {
    /// New profile on first sighting: undecided, no local asset yet.
    pub fn new(id: ProfileId, fields: ProfileFields) -> Self {
        Self {
            id,
            fields,
            local_asset_path: None,
            status: DecisionStatus::Undecided,
        }
    }

    /// Whether the avatar still has to be downloaded.
    pub fn needs_asset(&self) -> bool {
        self.local_asset_path.is_none()
    }

    /// Location for presentation: the local file once cached, else the remote URL.
    pub fn avatar_display(&self) -> String {
        match self.local_asset_path {
            Some(ref path) => path.display().to_string(),
            None => self.fields.avatar_url.clone(),
        }
    }
}

impl From<RemoteRecord> for CachedProfile {
    fn from(record: RemoteRecord) -> Self {
        CachedProfile::new(record.id, record.fields)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(name: &str) -> ProfileFields {
        ProfileFields {
            name: name.to_string(),
            age: 30,
            avatar_url: "https://example.com/a.jpg".to_string(),
            city: "Pune".to_string(),
            country: "India".to_string(),
        }
    }

    #[test]
    fn test_profile_id_parse_and_display() {
        let raw = "6f1c0f9e-8d7b-4d0c-9c1e-2b1a3f4e5d6c";
        let id: ProfileId = raw.parse().unwrap();
        assert_eq!(id.to_string(), raw);
        assert!(" 6f1c0f9e-8d7b-4d0c-9c1e-2b1a3f4e5d6c ".parse::<ProfileId>().is_ok());
        assert!("not-a-uuid".parse::<ProfileId>().is_err());
    }

    #[test]
    fn test_new_profile_defaults() {
        let profile = CachedProfile::new(ProfileId::random(), fields("Ada Lovelace"));
        assert_eq!(profile.status, DecisionStatus::Undecided);
        assert!(profile.needs_asset());
        assert_eq!(profile.avatar_display(), "https://example.com/a.jpg");
    }

    #[test]
    fn test_avatar_display_prefers_local_path() {
        let mut profile = CachedProfile::new(ProfileId::random(), fields("Ada Lovelace"));
        profile.local_asset_path = Some(PathBuf::from("/tmp/images/a.jpg"));
        assert!(!profile.needs_asset());
        assert_eq!(profile.avatar_display(), "/tmp/images/a.jpg");
    }

    #[test]
    fn test_decision_into_status() {
        assert_eq!(DecisionStatus::from(Decision::Accepted), DecisionStatus::Accepted);
        assert_eq!(DecisionStatus::from(Decision::Declined), DecisionStatus::Declined);
        assert!(DecisionStatus::Accepted.is_decided());
        assert!(!DecisionStatus::Undecided.is_decided());
        assert_eq!(Decision::Declined.to_string(), "Declined");
    }

    #[test]
    fn test_cached_profile_serde_flattens_fields() {
        let profile = CachedProfile::new(ProfileId::random(), fields("Ada Lovelace"));
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["name"], "Ada Lovelace");
        assert_eq!(json["status"], "Undecided");

        let back: CachedProfile = serde_json::from_value(json).unwrap();
        assert_eq!(back, profile);
    }

    #[test]
    fn test_cached_profile_missing_local_fields_default() {
        let id = ProfileId::random();
        let json = serde_json::json!({
            "id": id,
            "name": "Grace Hopper",
            "age": 40,
            "avatar_url": "https://example.com/g.jpg",
            "city": "Arlington",
            "country": "United States"
        });
        let profile: CachedProfile = serde_json::from_value(json).unwrap();
        assert_eq!(profile.status, DecisionStatus::Undecided);
        assert!(profile.local_asset_path.is_none());
    }
}
