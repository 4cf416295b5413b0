// Entity types exchanged with the store and encoded as JSON on the wire

use serde::{Deserialize, Serialize};

/// Persisted author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub nationality: String,
    /// Score linked to this author, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<ScoreSummary>,
}

/// Score as embedded in an author (without the back reference)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub id: i64,
    pub score: i64,
}

/// Author as embedded in a score (without the back reference)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorSummary {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub nationality: String,
}

/// Persisted user score, one-to-one with an author
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserScore {
    pub id: i64,
    pub score: i64,
    pub author: AuthorSummary,
}

/// Author payload accepted by `PUT /addNewAuthor`.
///
/// Missing fields decode as empty strings and are rejected by the store's
/// validation; unknown fields are rejected at decode time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NewAuthor {
    pub first_name: String,
    pub last_name: String,
    pub nationality: String,
}

impl From<&Author> for AuthorSummary {
    fn from(author: &Author) -> Self {
        Self {
            id: author.id,
            first_name: author.first_name.clone(),
            last_name: author.last_name.clone(),
            nationality: author.nationality.clone(),
        }
    }
}
