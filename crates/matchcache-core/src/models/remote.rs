// Allow dead code: API response structs have fields for completeness
#![allow(dead_code)]

use serde::{Deserialize, Serialize};

use super::profile::{ProfileFields, ProfileId, RemoteRecord};

// Response from the paginated user directory (`/api/?page=N&results=M`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryResponse {
    #[serde(default)]
    pub results: Vec<DirectoryUser>,
    pub info: Option<DirectoryInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryInfo {
    pub seed: Option<String>,
    pub results: Option<u32>,
    pub page: Option<u32>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryUser {
    pub login: Login,
    pub name: Name,
    pub picture: Picture,
    pub dob: Dob,
    pub location: Location,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Login {
    pub uuid: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Name {
    pub title: Option<String>,
    pub first: String,
    pub last: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Picture {
    pub large: String,
    pub medium: Option<String>,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dob {
    pub date: Option<String>,
    pub age: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub state: Option<String>,
    pub country: String,
}

impl DirectoryUser {
    /// Convert to a `RemoteRecord`. Returns `None` when the login uuid is not
    /// a valid identity token.
    pub fn to_remote_record(&self) -> Option<RemoteRecord> {
        let id: ProfileId = self.login.uuid.parse().ok()?;
        Some(RemoteRecord::new(
            id,
            ProfileFields {
                name: self.display_name(),
                age: self.dob.age,
                avatar_url: self.picture.large.clone(),
                city: self.location.city.clone(),
                country: self.location.country.clone(),
            },
        ))
    }

    /// "First Last"
    pub fn display_name(&self) -> String {
        format!("{} {}", self.name.first.trim(), self.name.last.trim())
    }
}
