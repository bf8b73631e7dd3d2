use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::ids::ObjectId;

/// One palette entry as `[r, g, b]`.
pub type Rgb = [u8; 3];

pub const PROMOTIONS: &[&str] = &[
    "", "1STPI", "2STPI", "3EII", "3GM", "3GCU", "3GMA", "3INFO", "3SGM", "3SRC", "4EII", "4GM",
    "4GCU", "4GMA", "4INFO", "4SGM", "4SRC", "5EII", "5GM", "5GCU", "5GMA", "5INFO", "5SGM",
    "5SRC", "Personnel/Enseignant",
];

pub const GENDERS: &[&str] = &["", "female", "male"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "ID")]
    pub id: ObjectId,
    pub name: String,
    pub username: String,
    pub description: String,
    pub email: String,
    #[serde(rename = "emailpublic")]
    pub email_public: bool,
    pub promotion: String,
    pub gender: String,
    pub events: Vec<ObjectId>,
    #[serde(rename = "postsliked")]
    pub posts_liked: Vec<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Association {
    #[serde(rename = "ID")]
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    pub description: String,
    pub events: Vec<ObjectId>,
    pub posts: Vec<ObjectId>,
    pub palette: Vec<Rgb>,
    #[serde(rename = "selectedcolor")]
    pub selected_color: i64,
    pub profile: String,
    pub cover: String,
    #[serde(rename = "bgcolor")]
    pub bg_color: String,
    #[serde(rename = "fgcolor")]
    pub fg_color: String,
}

/// Login account bound to one association. Not the association itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssociationUser {
    #[serde(rename = "ID")]
    pub id: ObjectId,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub association: ObjectId,
    pub master: bool,
    pub owner: Option<ObjectId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "ID")]
    pub id: ObjectId,
    pub name: String,
    pub association: ObjectId,
    pub description: String,
    pub participants: Vec<ObjectId>,
    pub status: String,
    pub palette: Vec<Rgb>,
    #[serde(rename = "selectedcolor")]
    pub selected_color: i64,
    #[serde(rename = "dateStart")]
    pub date_start: DateTime<Utc>,
    #[serde(rename = "dateEnd")]
    pub date_end: DateTime<Utc>,
    pub image: String,
    #[serde(rename = "bgColor")]
    pub bg_color: String,
    #[serde(rename = "fgColor")]
    pub fg_color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    #[serde(rename = "ID")]
    pub id: ObjectId,
    pub title: String,
    pub association: ObjectId,
    pub description: String,
    pub date: DateTime<Utc>,
    pub likes: Vec<ObjectId>,
    pub comments: Vec<Comment>,
    pub image: String,
    #[serde(rename = "imageSize")]
    pub image_size: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    #[serde(rename = "ID")]
    pub id: ObjectId,
    pub user: ObjectId,
    pub content: String,
    pub date: DateTime<Utc>,
    pub tags: Vec<Tag>,
    pub reports: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    #[serde(rename = "ID")]
    pub id: ObjectId,
    pub user: ObjectId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(rename = "ID")]
    pub id: ObjectId,
    pub username: String,
    #[serde(rename = "authtoken")]
    pub auth_token: String,
    pub user: ObjectId,
    pub device: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Event,
    Post,
    Tag,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Event => "event",
            NotificationKind::Post => "post",
            NotificationKind::Tag => "tag",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "event" => Some(NotificationKind::Event),
            "post" => Some(NotificationKind::Post),
            "tag" => Some(NotificationKind::Tag),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "ID")]
    pub id: ObjectId,
    pub sender: ObjectId,
    pub receiver: ObjectId,
    pub content: ObjectId,
    pub comment: Option<ObjectId>,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub date: DateTime<Utc>,
}

/// Push-capable device registered by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationUser {
    #[serde(rename = "ID")]
    pub id: ObjectId,
    #[serde(rename = "userid")]
    pub user_id: ObjectId,
    pub token: String,
    pub os: String,
}

// -- Request payloads --
//
// Each payload carries only the fields its update may overwrite, so a
// client can never write relationship sets through them.

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AssociationInput {
    pub name: String,
    pub email: String,
    pub description: String,
    pub palette: Vec<Rgb>,
    #[serde(rename = "selectedcolor")]
    pub selected_color: i64,
    pub profile: String,
    pub cover: String,
    #[serde(rename = "bgcolor")]
    pub bg_color: String,
    #[serde(rename = "fgcolor")]
    pub fg_color: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventInput {
    pub name: String,
    pub association: ObjectId,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub palette: Vec<Rgb>,
    #[serde(default, rename = "selectedcolor")]
    pub selected_color: i64,
    #[serde(rename = "dateStart")]
    pub date_start: DateTime<Utc>,
    #[serde(rename = "dateEnd")]
    pub date_end: DateTime<Utc>,
    #[serde(default)]
    pub image: String,
    #[serde(default, rename = "bgColor")]
    pub bg_color: String,
    #[serde(default, rename = "fgColor")]
    pub fg_color: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostInput {
    pub title: String,
    pub association: ObjectId,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    #[serde(default = "empty_object", rename = "imageSize")]
    pub image_size: serde_json::Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserInput {
    pub name: String,
    pub description: String,
    pub email: String,
    #[serde(rename = "emailpublic")]
    pub email_public: bool,
    pub promotion: String,
    pub gender: String,
}

impl UserInput {
    /// Promotion and gender must come from their closed lists.
    pub fn validate(&self) -> AppResult<()> {
        if !PROMOTIONS.contains(&self.promotion.as_str()) {
            return Err(AppError::Validation(format!(
                "Unknown promotion {:?}",
                self.promotion
            )));
        }
        if !GENDERS.contains(&self.gender.as_str()) {
            return Err(AppError::Validation(format!(
                "Unknown gender {:?}",
                self.gender
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentInput {
    pub user: ObjectId,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<TagInput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagInput {
    pub user: ObjectId,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationUserInput {
    #[serde(rename = "userid")]
    pub user_id: ObjectId,
    pub token: String,
    #[serde(default)]
    pub os: String,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}
