use crate::error::{abort, Error, Result};
use crate::model::*;
use serde::{de::DeserializeOwned, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionalTree};
use sled::Transactional;
use std::collections::BTreeSet;

fn serialize_id(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

fn deserialize_id<V: AsRef<[u8]>>(id: V) -> Result<u64> {
    use std::convert::TryInto;
    id.as_ref()
        .try_into()
        .map(u64::from_be_bytes)
        .map_err(|_| Error::Internal("malformed record id".to_owned()))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

fn decode<T: DeserializeOwned, V: AsRef<[u8]>>(bytes: V) -> Result<T> {
    Ok(bincode::deserialize(bytes.as_ref())?)
}

type TxResult<T> = std::result::Result<T, ConflictableTransactionError<Error>>;

fn load_user(users: &TransactionalTree, id: u64) -> TxResult<User> {
    match users.get(serialize_id(id))? {
        Some(bytes) => decode(bytes).map_err(abort),
        None => Err(abort(Error::NotFound(format!("user {}", id)))),
    }
}

fn store_user(users: &TransactionalTree, id: u64, user: &User) -> TxResult<()> {
    users.insert(&serialize_id(id), encode(user).map_err(abort)?)?;
    Ok(())
}

/// Moves a unique index entry from `old` to `new`, aborting if `new` belongs
/// to someone else.
fn move_index(
    index: &TransactionalTree,
    field: &str,
    id: u64,
    old: &str,
    new: &str,
) -> TxResult<()> {
    if old == new {
        return Ok(());
    }
    if let Some(owner) = index.get(new.as_bytes())? {
        if owner.as_ref() != serialize_id(id) {
            return Err(abort(Error::Conflict(field.to_owned())));
        }
    }
    index.remove(old.as_bytes())?;
    index.insert(new.as_bytes(), &serialize_id(id))?;
    Ok(())
}

pub trait UserDb {
    fn add_user(&self, user: &User) -> Result<u64>;
    fn get_user(&self, id: u64) -> Result<Option<User>>;
    fn get_user_by_username(&self, username: &str) -> Result<Option<Identity>>;
    /// Applies `change` to the stored record and keeps the unique indexes in step.
    fn update_user<F: Fn(&mut User)>(&self, id: u64, change: F) -> Result<User>;
    fn remove_user(&self, id: u64) -> Result<()>;
    fn add_favorite(&self, id: u64, movie: MovieRef) -> Result<BTreeSet<MovieRef>>;
    fn remove_favorite(&self, id: u64, movie: MovieRef) -> Result<BTreeSet<MovieRef>>;
}

pub trait MovieDb {
    fn add_movie(&self, movie: &Movie) -> Result<MovieRef>;
    fn replace_movie(&self, id: MovieRef, movie: &Movie) -> Result<()>;
    fn remove_movie(&self, id: MovieRef) -> Result<()>;
    fn get_movie(&self, id: MovieRef) -> Result<Option<Movie>>;
    fn list_movies(&self) -> Result<Vec<MovieEntry>>;
    fn find_movie_by_title(&self, title: &str) -> Result<Option<MovieEntry>>;
    fn find_genre(&self, name: &str) -> Result<Option<Genre>>;
    fn find_director(&self, name: &str) -> Result<Option<Person>>;
}

const USERS: &[u8] = b"users";
const USERS_USERNAME: &[u8] = b"USERS_USERNAME";
const USERS_EMAIL: &[u8] = b"USERS_EMAIL";
const MOVIES: &[u8] = b"movies";

impl UserDb for sled::Db {
    fn add_user(&self, user: &User) -> Result<u64> {
        let users = self.open_tree(USERS)?;
        let users_username = self.open_tree(USERS_USERNAME)?;
        let users_email = self.open_tree(USERS_EMAIL)?;
        let id = self.generate_id()?;
        let encoded = encode(user)?;
        (&users, &users_username, &users_email).transaction(
            |(users, users_username, users_email)| {
                if users_username
                    .insert(user.username.as_bytes(), &serialize_id(id))?
                    .is_some()
                {
                    return Err(abort(Error::Conflict("username".to_owned())));
                }
                if users_email
                    .insert(user.email.as_bytes(), &serialize_id(id))?
                    .is_some()
                {
                    return Err(abort(Error::Conflict("email".to_owned())));
                }
                users.insert(&serialize_id(id), encoded.as_slice())?;
                Ok(())
            },
        )?;
        Ok(id)
    }

    fn get_user(&self, id: u64) -> Result<Option<User>> {
        let users = self.open_tree(USERS)?;
        users.get(serialize_id(id))?.map(decode).transpose()
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<Identity>> {
        let users_username = self.open_tree(USERS_USERNAME)?;
        let id = match users_username.get(username)? {
            Some(id) => deserialize_id(id)?,
            None => return Ok(None),
        };
        let user = self
            .get_user(id)?
            .ok_or_else(|| Error::Internal(format!("bad index users_username for {}", id)))?;
        Ok(Some(Identity { id, user }))
    }

    fn update_user<F: Fn(&mut User)>(&self, id: u64, change: F) -> Result<User> {
        let users = self.open_tree(USERS)?;
        let users_username = self.open_tree(USERS_USERNAME)?;
        let users_email = self.open_tree(USERS_EMAIL)?;
        let user = (&users, &users_username, &users_email).transaction(
            |(users, users_username, users_email)| {
                let mut user = load_user(users, id)?;
                let old_username = user.username.clone();
                let old_email = user.email.clone();
                change(&mut user);
                move_index(users_username, "username", id, &old_username, &user.username)?;
                move_index(users_email, "email", id, &old_email, &user.email)?;
                store_user(users, id, &user)?;
                Ok(user)
            },
        )?;
        Ok(user)
    }

    fn remove_user(&self, id: u64) -> Result<()> {
        let users = self.open_tree(USERS)?;
        let users_username = self.open_tree(USERS_USERNAME)?;
        let users_email = self.open_tree(USERS_EMAIL)?;
        (&users, &users_username, &users_email).transaction(
            |(users, users_username, users_email)| {
                let user = load_user(users, id)?;
                users.remove(&serialize_id(id))?;
                users_username.remove(user.username.as_bytes())?;
                users_email.remove(user.email.as_bytes())?;
                Ok(())
            },
        )?;
        Ok(())
    }

    fn add_favorite(&self, id: u64, movie: MovieRef) -> Result<BTreeSet<MovieRef>> {
        let users = self.open_tree(USERS)?;
        let movies = self.open_tree(MOVIES)?;
        let favorites = (&users, &movies).transaction(|(users, movies)| {
            if movies.get(serialize_id(movie))?.is_none() {
                return Err(abort(Error::NotFound(format!("movie {}", movie))));
            }
            let mut user = load_user(users, id)?;
            if user.favorite_movies.insert(movie) {
                store_user(users, id, &user)?;
            }
            Ok(user.favorite_movies)
        })?;
        Ok(favorites)
    }

    fn remove_favorite(&self, id: u64, movie: MovieRef) -> Result<BTreeSet<MovieRef>> {
        let users = self.open_tree(USERS)?;
        let favorites = users.transaction(|users| {
            let mut user = load_user(users, id)?;
            if user.favorite_movies.remove(&movie) {
                store_user(users, id, &user)?;
            }
            Ok(user.favorite_movies)
        })?;
        Ok(favorites)
    }
}

impl MovieDb for sled::Db {
    fn add_movie(&self, movie: &Movie) -> Result<MovieRef> {
        let movies = self.open_tree(MOVIES)?;
        let id = self.generate_id()?;
        movies.insert(serialize_id(id), encode(movie)?)?;
        Ok(id)
    }

    fn replace_movie(&self, id: MovieRef, movie: &Movie) -> Result<()> {
        let movies = self.open_tree(MOVIES)?;
        let encoded = encode(movie)?;
        movies.transaction(|movies| {
            if movies.get(serialize_id(id))?.is_none() {
                return Err(abort(Error::NotFound(format!("movie {}", id))));
            }
            movies.insert(&serialize_id(id), encoded.as_slice())?;
            Ok(())
        })?;
        Ok(())
    }

    fn remove_movie(&self, id: MovieRef) -> Result<()> {
        let movies = self.open_tree(MOVIES)?;
        match movies.remove(serialize_id(id))? {
            Some(_) => Ok(()),
            None => Err(Error::NotFound(format!("movie {}", id))),
        }
    }

    fn get_movie(&self, id: MovieRef) -> Result<Option<Movie>> {
        let movies = self.open_tree(MOVIES)?;
        movies.get(serialize_id(id))?.map(decode).transpose()
    }

    fn list_movies(&self) -> Result<Vec<MovieEntry>> {
        let movies = self.open_tree(MOVIES)?;
        movies
            .iter()
            .map(|entry| -> Result<MovieEntry> {
                let (id, movie) = entry?;
                Ok(MovieEntry {
                    id: deserialize_id(id)?,
                    movie: decode(movie)?,
                })
            })
            .collect()
    }

    fn find_movie_by_title(&self, title: &str) -> Result<Option<MovieEntry>> {
        Ok(self
            .list_movies()?
            .into_iter()
            .find(|entry| entry.movie.title == title))
    }

    fn find_genre(&self, name: &str) -> Result<Option<Genre>> {
        Ok(self
            .list_movies()?
            .into_iter()
            .flat_map(|entry| entry.movie.genres)
            .find(|genre| genre.name == name))
    }

    fn find_director(&self, name: &str) -> Result<Option<Person>> {
        Ok(self
            .list_movies()?
            .into_iter()
            .flat_map(|entry| entry.movie.directors)
            .find(|director| director.name == name))
    }
}
