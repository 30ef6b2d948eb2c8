//! Concrete school-management records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Population, Record, RecordId, Reference, require_non_blank};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct School {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub classes: Vec<Reference<Class>>,
    #[serde(default)]
    pub clubs: Vec<Reference<Club>>,
}

impl Record for School {
    const COLLECTION: &'static str = "schools";

    fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    fn population() -> &'static [Population] {
        const PATHS: &[Population] = &[
            Population::new("classes", Class::COLLECTION),
            Population::new("clubs", Club::COLLECTION),
        ];
        PATHS
    }

    fn validate(&self) -> Result<(), String> {
        require_non_blank("name", &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub name: String,
    #[serde(default)]
    pub grade: Option<u8>,
    #[serde(default)]
    pub school: Option<Reference<School>>,
    #[serde(default)]
    pub students: Vec<Reference<User>>,
    #[serde(default)]
    pub courses: Vec<Reference<Course>>,
}

impl Record for Class {
    const COLLECTION: &'static str = "classes";

    fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    fn population() -> &'static [Population] {
        const PATHS: &[Population] = &[
            Population::new("school", School::COLLECTION),
            Population::new("students", User::COLLECTION),
            Population::new("courses", Course::COLLECTION),
        ];
        PATHS
    }

    fn validate(&self) -> Result<(), String> {
        require_non_blank("name", &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub courses: Vec<Reference<Course>>,
}

impl Record for Subject {
    const COLLECTION: &'static str = "subjects";

    fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    fn population() -> &'static [Population] {
        const PATHS: &[Population] = &[Population::new("courses", Course::COLLECTION)];
        PATHS
    }

    fn validate(&self) -> Result<(), String> {
        require_non_blank("name", &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subject: Option<Reference<Subject>>,
    #[serde(default)]
    pub teachers: Vec<Reference<User>>,
    #[serde(default)]
    pub classes: Vec<Reference<Class>>,
}

impl Record for Course {
    const COLLECTION: &'static str = "courses";

    fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    fn population() -> &'static [Population] {
        const PATHS: &[Population] = &[
            Population::new("subject", Subject::COLLECTION),
            Population::new("teachers", User::COLLECTION),
            Population::new("classes", Class::COLLECTION),
        ];
        PATHS
    }

    fn validate(&self) -> Result<(), String> {
        require_non_blank("name", &self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatType {
    Group,
    Private,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(rename = "type")]
    pub chat_type: ChatType,
    pub name: String,
    #[serde(default)]
    pub targets: Vec<Reference<User>>,
    #[serde(default)]
    pub courses: Vec<Reference<Course>>,
    #[serde(default)]
    pub clubs: Vec<Reference<Club>>,
    #[serde(default)]
    pub messages: Vec<Reference<Message>>,
}

impl Record for Chat {
    const COLLECTION: &'static str = "chats";

    fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    fn population() -> &'static [Population] {
        const PATHS: &[Population] = &[
            Population::new("targets", User::COLLECTION),
            Population::new("courses", Course::COLLECTION),
            Population::new("clubs", Club::COLLECTION),
            Population::new("messages", Message::COLLECTION),
            Population::new("messages.sender", User::COLLECTION),
        ];
        PATHS
    }

    fn validate(&self) -> Result<(), String> {
        require_non_blank("name", &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(default)]
    pub sender: Option<Reference<User>>,
    pub content: String,
    #[serde(default = "Utc::now")]
    pub sent_at: DateTime<Utc>,
}

impl Record for Message {
    const COLLECTION: &'static str = "messages";

    fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    fn population() -> &'static [Population] {
        const PATHS: &[Population] = &[Population::new("sender", User::COLLECTION)];
        PATHS
    }

    fn validate(&self) -> Result<(), String> {
        require_non_blank("content", &self.content)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub members: Vec<Reference<User>>,
    #[serde(default)]
    pub events: Vec<Reference<Event>>,
}

impl Record for Club {
    const COLLECTION: &'static str = "clubs";

    fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    fn population() -> &'static [Population] {
        const PATHS: &[Population] = &[
            Population::new("members", User::COLLECTION),
            Population::new("events", Event::COLLECTION),
        ];
        PATHS
    }

    fn validate(&self) -> Result<(), String> {
        require_non_blank("name", &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub clubs: Vec<Reference<Club>>,
}

impl Record for Event {
    const COLLECTION: &'static str = "events";

    fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    fn population() -> &'static [Population] {
        const PATHS: &[Population] = &[Population::new("clubs", Club::COLLECTION)];
        PATHS
    }

    fn validate(&self) -> Result<(), String> {
        require_non_blank("title", &self.title)?;
        if let Some(ends_at) = self.ends_at
            && ends_at < self.starts_at
        {
            return Err("endsAt cannot be before startsAt".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Student,
    Teacher,
    Parent,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: UserRole,
    #[serde(default)]
    pub school: Option<Reference<School>>,
}

impl Record for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    fn population() -> &'static [Population] {
        const PATHS: &[Population] = &[Population::new("school", School::COLLECTION)];
        PATHS
    }

    fn validate(&self) -> Result<(), String> {
        require_non_blank("username", &self.username)?;
        require_non_blank("firstName", &self.first_name)?;
        require_non_blank("lastName", &self.last_name)?;
        if !self.email.contains('@') {
            return Err(format!("Invalid email address: {}", self.email));
        }
        Ok(())
    }
}

/// An account created ahead of its owner's first sign-in. The owner redeems
/// `setupCode` to turn it into a [`User`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupAccount {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub email: String,
    pub setup_code: String,
    pub role: UserRole,
    #[serde(default)]
    pub school: Option<Reference<School>>,
    #[serde(default)]
    pub user: Option<Reference<User>>,
}

impl Record for SetupAccount {
    const COLLECTION: &'static str = "setupAccounts";

    fn id(&self) -> Option<&RecordId> {
        self.id.as_ref()
    }

    fn set_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    fn population() -> &'static [Population] {
        const PATHS: &[Population] = &[
            Population::new("school", School::COLLECTION),
            Population::new("user", User::COLLECTION),
        ];
        PATHS
    }

    fn validate(&self) -> Result<(), String> {
        require_non_blank("setupCode", &self.setup_code)?;
        if !self.email.contains('@') {
            return Err(format!("Invalid email address: {}", self.email));
        }
        Ok(())
    }
}
