//! Directory records and seed data.

use serde::{Deserialize, Serialize};
use uuid::{Uuid, uuid};

/// A directory user and the documents they own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable user id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Ids of the documents owned by this user.
    pub documents: Vec<Uuid>,
}

/// A stored document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Stable document id.
    pub id: Uuid,
    /// Short title.
    pub title: String,
    /// Body text.
    pub content: String,
}

impl Document {
    /// Create a document with a fresh id.
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            title: title.into(),
            content: content.into(),
        }
    }
}

const USER_A: Uuid = uuid!("4f1c2a90-71be-4b1f-9a63-0d2e54c8a101");
const USER_B: Uuid = uuid!("b7d94e32-1c55-4f08-8d9a-6e417b3f2202");
const USER_C: Uuid = uuid!("1a6f8c04-9db2-4e77-b150-3c98d5ae6303");

fn doc(id: Uuid, title: &str, content: &str) -> Document {
    Document {
        id,
        title: title.to_owned(),
        content: content.to_owned(),
    }
}

/// Documents owned by the first seed user.
pub fn documents_a() -> Vec<Document> {
    vec![
        doc(
            uuid!("6c3e9f10-5a21-4d48-b6e2-84f0c17d1a11"),
            "Field notes 1",
            "The survey started before sunrise and the light was poor.",
        ),
        doc(
            uuid!("e28b4d76-0f93-4c5a-a1d8-52b6e90f1a12"),
            "Field notes 2",
            "Most of the markers from last season were still standing.",
        ),
        doc(
            uuid!("90d17b3c-64e8-4f02-8a5b-c41d29e61a13"),
            "Field notes 3",
            "Two markers near the river had washed away entirely.",
        ),
    ]
}

/// Documents owned by the second seed user.
pub fn documents_b() -> Vec<Document> {
    vec![
        doc(
            uuid!("3a5c8e21-97d4-4b60-bf13-6e82a40d2b21"),
            "Meeting summary 1",
            "The schedule slipped a week because of the vendor delay.",
        ),
        doc(
            uuid!("c49f0b87-2e16-4da3-95c7-018d63fe2b22"),
            "Meeting summary 2",
            "Everyone agreed to freeze the interface before review.",
        ),
        doc(
            uuid!("75e2d6f0-8ba9-4137-a42e-9c50b81d2b23"),
            "Meeting summary 3",
            "The review found nothing blocking and the freeze held.",
        ),
    ]
}

/// Documents owned by the third seed user.
pub fn documents_c() -> Vec<Document> {
    vec![
        doc(
            uuid!("b81a4c59-d307-4e96-8f24-17c6e0ad3c31"),
            "Draft chapter 1",
            "The harbor was quiet in winter and the boats sat idle.",
        ),
        doc(
            uuid!("0f6d92e4-43ab-4c78-b9e1-85a2d17f3c32"),
            "Draft chapter 2",
            "By spring the yard filled again with paint and noise.",
        ),
        doc(
            uuid!("d27c05b1-6f8e-49a2-83d6-4be9107a3c33"),
            "Draft chapter 3",
            "Nobody remembered who had left the skiff unclaimed.",
        ),
    ]
}

/// All seed users, each owning one of the document groups.
pub fn seed_users() -> Vec<User> {
    vec![
        User {
            id: USER_A,
            name: "Ada Ferrant".to_owned(),
            documents: documents_a().into_iter().map(|d| d.id).collect(),
        },
        User {
            id: USER_B,
            name: "Bram Okafor".to_owned(),
            documents: documents_b().into_iter().map(|d| d.id).collect(),
        },
        User {
            id: USER_C,
            name: "Celia Marsh".to_owned(),
            documents: documents_c().into_iter().map(|d| d.id).collect(),
        },
    ]
}

/// All seed documents.
pub fn seed_documents() -> Vec<Document> {
    let mut docs = documents_a();
    docs.extend(documents_b());
    docs.extend(documents_c());
    docs
}
