use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of fields fed to the inference model.
pub const FEATURE_COUNT: usize = 8;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "follower_count",
    "following_count",
    "biography_length",
    "media_count",
    "has_profile_pic",
    "is_private",
    "username_digit_count",
    "username_length",
];

const MAX_USERNAME_CHARS: usize = 30;

static USERNAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9._]+$").expect("username pattern should compile"));

/// Public statistics describing one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileStats {
    pub username: String,
    pub followers: u64,
    pub following: u64,
    #[serde(default)]
    pub biography: String,
    pub media_count: u64,
    pub is_private: bool,
    #[serde(default)]
    pub profile_pic_url: Option<String>,
}

impl ProfileStats {
    /// Private accounts never report a profile picture, matching how the
    /// training data was collected.
    pub fn has_profile_pic(&self) -> bool {
        !self.is_private && self.profile_pic_url.is_some()
    }

    pub fn feature_vector(&self) -> FeatureVector {
        FeatureVector([
            self.followers as f32,
            self.following as f32,
            self.biography.chars().count() as f32,
            self.media_count as f32,
            f32::from(u8::from(self.has_profile_pic())),
            f32::from(u8::from(self.is_private)),
            self.username.chars().filter(char::is_ascii_digit).count() as f32,
            self.username.chars().count() as f32,
        ])
    }
}

/// Ordered model input; see [`FEATURE_NAMES`] for the field order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector(pub [f32; FEATURE_COUNT]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn named(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.0.iter().copied())
    }
}

/// Errors emitted while validating usernames.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UsernameError {
    #[error("username must not be blank")]
    Empty,
    #[error("username `{username}` exceeds {max} characters")]
    TooLong { username: String, max: usize },
    #[error("username `{username}` may only contain letters, digits, `.` and `_`")]
    InvalidCharacters { username: String },
}

/// Trim, drop a leading `@`, lowercase, and check the account naming rules.
pub fn normalize_username(raw: &str) -> Result<String, UsernameError> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix('@').unwrap_or(trimmed);
    if trimmed.is_empty() {
        return Err(UsernameError::Empty);
    }
    let username = trimmed.to_lowercase();
    if username.chars().count() > MAX_USERNAME_CHARS {
        return Err(UsernameError::TooLong {
            username,
            max: MAX_USERNAME_CHARS,
        });
    }
    if !USERNAME_PATTERN.is_match(&username) {
        return Err(UsernameError::InvalidCharacters { username });
    }
    Ok(username)
}
