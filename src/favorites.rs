use crate::credentials::ensure_self;
use crate::database::UserDb;
use crate::error::Result;
use crate::model::{Identity, MovieRef};
use log::debug;
use std::collections::BTreeSet;

/// Adds `movie` to the caller's favorites. Adding a member again is a no-op.
pub fn add_favorite(
    db: &sled::Db,
    actor: &Identity,
    target: &str,
    movie: MovieRef,
) -> Result<BTreeSet<MovieRef>> {
    ensure_self(actor, target)?;
    let favorites = db.add_favorite(actor.id, movie)?;
    debug!("user {} added favorite {}", actor.id, movie);
    Ok(favorites)
}

/// Removes `movie` from the caller's favorites. Removing a non-member is a no-op.
pub fn remove_favorite(
    db: &sled::Db,
    actor: &Identity,
    target: &str,
    movie: MovieRef,
) -> Result<BTreeSet<MovieRef>> {
    ensure_self(actor, target)?;
    let favorites = db.remove_favorite(actor.id, movie)?;
    debug!("user {} removed favorite {}", actor.id, movie);
    Ok(favorites)
}
