use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Id of a stored movie. Holding one confers no ownership of the movie.
pub type MovieRef = u64;

/// Stored account record. Encoded with bincode, so no serde attributes that
/// skip fields.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub favorite_movies: BTreeSet<MovieRef>,
}

/// A user record together with its storage id.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub id: u64,
    pub user: User,
}

/// External view of an identity. The password hash never leaves storage.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub favorite_movies: BTreeSet<MovieRef>,
}

impl From<&Identity> for Profile {
    fn from(identity: &Identity) -> Self {
        let user = &identity.user;
        Profile {
            id: identity.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            birth_date: user.birth_date,
            favorite_movies: user.favorite_movies.clone(),
        }
    }
}

/// Registration request body. Required fields are optional here so that a
/// missing one is reported with the other violations instead of as a
/// deserialization failure.
#[derive(Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birth_date: Option<String>,
}

/// Partial profile update. Absent and null fields are left untouched.
#[derive(Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub password: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub birth_date: Option<String>,
}

fn redacted(password: &Option<String>) -> Option<&'static str> {
    password.as_ref().map(|_| "<redacted>")
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("birth_date", &self.birth_date)
            .finish()
    }
}

impl fmt::Debug for ProfileUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileUpdate")
            .field("username", &self.username)
            .field("password", &redacted(&self.password))
            .field("email", &self.email)
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("birth_date", &self.birth_date)
            .finish()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Genre {
    pub name: String,
    pub description: String,
}

/// Cast member or director.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub name: String,
    pub bio: Option<String>,
    /// `YYYY` or `YYYY-MM-DD`.
    pub birth_date: String,
    pub death_date: Option<NaiveDate>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub title: String,
    pub summary: String,
    pub genres: Vec<Genre>,
    pub cast: Vec<Person>,
    pub directors: Vec<Person>,
    pub release_date: Option<NaiveDate>,
    pub image_path: Option<String>,
    pub featured: Option<bool>,
}

/// A movie as returned to clients, carrying its id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MovieEntry {
    pub id: MovieRef,
    #[serde(flatten)]
    pub movie: Movie,
}

/// Unvalidated movie input; see `validation::validate_movie`.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MovieDraft {
    pub title: Option<String>,
    pub summary: Option<String>,
    pub genres: Option<Vec<GenreDraft>>,
    pub cast: Option<Vec<PersonDraft>>,
    pub directors: Option<Vec<PersonDraft>>,
    pub release_date: Option<String>,
    pub image_path: Option<String>,
    pub featured: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct GenreDraft {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PersonDraft {
    pub name: Option<String>,
    pub bio: Option<String>,
    pub birth_date: Option<String>,
    pub death_date: Option<String>,
}
