use crate::model::MovieEntry;
use log::warn;
use std::error::Error as StdError;

pub type LookupError = Box<dyn StdError + Send + Sync>;

/// Best-effort poster lookup by title.
pub trait PosterSource: Send + Sync {
    fn poster_for(&self, title: &str) -> Result<Option<String>, LookupError>;
}

/// Source that never knows a poster.
pub struct NoPosters;

impl PosterSource for NoPosters {
    fn poster_for(&self, _title: &str) -> Result<Option<String>, LookupError> {
        Ok(None)
    }
}

/// Fills in a poster URL for an outgoing movie that lacks one. Lookup
/// failures are logged and the stored value is kept.
pub fn enrich(source: &dyn PosterSource, entry: &mut MovieEntry) {
    let has_url = entry
        .movie
        .image_path
        .as_deref()
        .map_or(false, |path| path.starts_with("http"));
    if has_url {
        return;
    }
    match source.poster_for(&entry.movie.title) {
        Ok(Some(url)) => entry.movie.image_path = Some(url),
        Ok(None) => {}
        Err(err) => warn!("poster lookup for {:?} failed: {}", entry.movie.title, err),
    }
}
