use crate::error::{Error, FieldError, Result};
use crate::model::*;
use chrono::{DateTime, NaiveDate};
use regex::Regex;
use std::sync::OnceLock;

pub const MIN_USERNAME_LEN: usize = 6;
pub const MIN_PASSWORD_LEN: usize = 10;

/// Collects every rejected field before reporting.
#[derive(Debug, Default)]
pub struct Violations(Vec<FieldError>);

impl Violations {
    pub fn add<F: Into<String>, M: Into<String>>(&mut self, field: F, message: M) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn finish(self) -> Result<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self.0))
        }
    }

    /// Returns the trimmed value, or records a violation if it is absent or blank.
    pub fn required(&mut self, field: &str, value: Option<String>) -> Option<String> {
        match value.map(|v| v.trim().to_owned()) {
            Some(v) if !v.is_empty() => Some(v),
            _ => {
                self.add(field, "is required");
                None
            }
        }
    }
}

fn username_regex() -> &'static Regex {
    static USERNAME: OnceLock<Regex> = OnceLock::new();
    USERNAME.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_-]+$").expect("valid username regex"))
}

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(concat!(
            r"^[A-Za-z0-9_]+([.-]?[A-Za-z0-9_]+)*",
            r"@[A-Za-z0-9_]+([.-]?[A-Za-z0-9_]+)*(\.[A-Za-z0-9_]{2,3})+$",
        ))
        .expect("valid email regex")
    })
}

fn year_regex() -> &'static Regex {
    static YEAR: OnceLock<Regex> = OnceLock::new();
    YEAR.get_or_init(|| Regex::new(r"^[0-9]{4}$").expect("valid year regex"))
}

fn full_date_regex() -> &'static Regex {
    static FULL_DATE: OnceLock<Regex> = OnceLock::new();
    FULL_DATE.get_or_init(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("valid date regex"))
}

/// Trims and checks a username; `None` if it was rejected.
pub fn check_username(v: &mut Violations, field: &str, username: String) -> Option<String> {
    let username = username.trim().to_owned();
    let mut ok = true;
    if username.chars().count() < MIN_USERNAME_LEN {
        v.add(
            field,
            format!("must be at least {} characters", MIN_USERNAME_LEN),
        );
        ok = false;
    }
    if !username.is_empty() && !username_regex().is_match(&username) {
        v.add(
            field,
            "may only contain letters, digits, underscores and hyphens",
        );
        ok = false;
    }
    if ok {
        Some(username)
    } else {
        None
    }
}

/// Normalizes (trim, lowercase) and checks an email address.
pub fn check_email(v: &mut Violations, field: &str, email: String) -> Option<String> {
    let email = email.trim().to_lowercase();
    if email_regex().is_match(&email) {
        Some(email)
    } else {
        v.add(field, format!("{} is not a valid email address", email));
        None
    }
}

pub fn check_password(v: &mut Violations, field: &str, password: String) -> Option<String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        v.add(
            field,
            format!("must be at least {} characters", MIN_PASSWORD_LEN),
        );
        None
    } else {
        Some(password)
    }
}

/// Parses a date given as `YYYY-MM-DD` or an RFC 3339 timestamp.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|d| d.date_naive())
        })
}

pub fn check_date(v: &mut Violations, field: &str, value: Option<String>) -> Option<NaiveDate> {
    let value = value?;
    let parsed = parse_date(&value);
    if parsed.is_none() {
        v.add(field, format!("{} is not a valid date", value));
    }
    parsed
}

/// Resolves a person's birth date. A bare year means January 1st of it.
pub fn parse_birth_date(value: &str) -> Option<NaiveDate> {
    if year_regex().is_match(value) {
        value
            .parse()
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
    } else if full_date_regex().is_match(value) {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
    } else {
        None
    }
}

fn validate_genre(v: &mut Violations, path: &str, draft: GenreDraft) -> Genre {
    Genre {
        name: v
            .required(&format!("{}.name", path), draft.name)
            .unwrap_or_default(),
        description: v
            .required(&format!("{}.description", path), draft.description)
            .unwrap_or_default(),
    }
}

fn validate_person(v: &mut Violations, path: &str, draft: PersonDraft) -> Person {
    let name = v
        .required(&format!("{}.name", path), draft.name)
        .unwrap_or_default();

    let birth_field = format!("{}.birthDate", path);
    let birth_date = v
        .required(&birth_field, draft.birth_date)
        .unwrap_or_default();
    let born = parse_birth_date(&birth_date);
    if !birth_date.is_empty() && born.is_none() {
        v.add(
            &birth_field,
            format!("{} must be in YYYY or YYYY-MM-DD format", birth_date),
        );
    }

    let death_field = format!("{}.deathDate", path);
    let death_date = check_date(v, &death_field, draft.death_date);
    if let (Some(died), Some(born)) = (death_date, born) {
        if died < born {
            v.add(&death_field, "must not be before the birth date");
        }
    }

    Person {
        name,
        bio: draft.bio,
        birth_date,
        death_date,
    }
}

fn validate_list<D, T, F>(
    v: &mut Violations,
    field: &str,
    items: Option<Vec<D>>,
    what: &str,
    mut validate: F,
) -> Vec<T>
where
    F: FnMut(&mut Violations, &str, D) -> T,
{
    let items = items.unwrap_or_default();
    if items.is_empty() {
        v.add(field, format!("a movie must have at least one {}", what));
    }
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| validate(v, &format!("{}[{}]", field, i), item))
        .collect()
}

/// Validates a complete movie, reporting every failing field path.
pub fn validate_movie(draft: MovieDraft) -> Result<Movie> {
    let mut v = Violations::default();
    let title = v.required("title", draft.title).unwrap_or_default();
    let summary = v.required("summary", draft.summary).unwrap_or_default();
    let genres = validate_list(&mut v, "genres", draft.genres, "genre", validate_genre);
    let cast = validate_list(&mut v, "cast", draft.cast, "actor", validate_person);
    let directors = validate_list(
        &mut v,
        "directors",
        draft.directors,
        "director",
        validate_person,
    );
    let release_date = check_date(&mut v, "releaseDate", draft.release_date);
    v.finish()?;
    Ok(Movie {
        title,
        summary,
        genres,
        cast,
        directors,
        release_date,
        image_path: draft.image_path,
        featured: draft.featured,
    })
}

#[cfg(test)]
pub mod tests {
    use super::*;

    pub fn person(name: &str, birth: &str, death: Option<&str>) -> PersonDraft {
        PersonDraft {
            name: Some(name.to_owned()),
            bio: None,
            birth_date: Some(birth.to_owned()),
            death_date: death.map(str::to_owned),
        }
    }

    pub fn draft(title: &str) -> MovieDraft {
        MovieDraft {
            title: Some(title.to_owned()),
            summary: Some("Something happens.".to_owned()),
            genres: Some(vec![GenreDraft {
                name: Some("Drama".to_owned()),
                description: Some("Serious films.".to_owned()),
            }]),
            cast: Some(vec![person("Julie Andrews", "1935-10-01", None)]),
            directors: Some(vec![person("Robert Wise", "1914", Some("2005-09-14"))]),
            release_date: Some("1965-03-02".to_owned()),
            image_path: None,
            featured: Some(false),
        }
    }

    fn fields(err: Error) -> Vec<String> {
        match err {
            Error::Validation(fields) => fields.into_iter().map(|f| f.field).collect(),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn valid_movie() {
        let movie = validate_movie(draft("  The Sound of Music ")).unwrap();
        assert_eq!(movie.title, "The Sound of Music");
        assert_eq!(movie.directors[0].death_date, NaiveDate::from_ymd_opt(2005, 9, 14));
        assert_eq!(movie.release_date, NaiveDate::from_ymd_opt(1965, 3, 2));
    }

    #[test]
    fn empty_collections_fail() {
        let mut d = draft("Empty");
        d.genres = Some(vec![]);
        d.cast = None;
        d.directors = Some(vec![]);
        assert_eq!(
            fields(validate_movie(d).unwrap_err()),
            vec!["genres", "cast", "directors"]
        );
    }

    #[test]
    fn death_before_year_only_birth() {
        let mut d = draft("Dead early");
        d.cast = Some(vec![person("Someone", "1950", Some("1940-01-01"))]);
        assert_eq!(
            fields(validate_movie(d).unwrap_err()),
            vec!["cast[0].deathDate"]
        );

        let mut d = draft("Dead later");
        d.cast = Some(vec![person("Someone", "1950", Some("1990-05-01"))]);
        assert!(validate_movie(d).is_ok());
    }

    #[test]
    fn reports_every_nested_path() {
        let mut d = draft("Broken");
        d.summary = None;
        d.genres = Some(vec![GenreDraft {
            name: Some("Drama".to_owned()),
            description: None,
        }]);
        d.directors = Some(vec![
            person("Chris Sanders", "1962-03-12", None),
            person("Kirk DeMicco", "1969-02-12", Some("1960-01-01")),
            person("Nobody", "sometime", None),
        ]);
        assert_eq!(
            fields(validate_movie(d).unwrap_err()),
            vec![
                "summary",
                "genres[0].description",
                "directors[1].deathDate",
                "directors[2].birthDate",
            ]
        );
    }

    #[test]
    fn birth_date_must_be_a_real_date() {
        let mut d = draft("Feb 30");
        d.cast = Some(vec![person("Someone", "1970-02-30", Some("1960-01-01"))]);
        // The birth date is rejected and the ordering check is skipped.
        assert_eq!(
            fields(validate_movie(d).unwrap_err()),
            vec!["cast[0].birthDate"]
        );
    }

    #[test]
    fn death_date_accepts_timestamps() {
        let mut d = draft("Timestamp");
        d.cast = Some(vec![person(
            "Someone",
            "1914-09-10",
            Some("2005-09-14T00:00:00.000Z"),
        )]);
        let movie = validate_movie(d).unwrap();
        assert_eq!(movie.cast[0].death_date, NaiveDate::from_ymd_opt(2005, 9, 14));
    }

    #[test]
    fn account_fields() {
        let mut v = Violations::default();
        assert_eq!(
            check_username(&mut v, "username", " movie_fan-1 ".to_owned()),
            Some("movie_fan-1".to_owned())
        );
        assert_eq!(
            check_email(&mut v, "email", " Fan@Example.COM ".to_owned()),
            Some("fan@example.com".to_owned())
        );
        assert!(v.0.is_empty());

        assert_eq!(check_username(&mut v, "username", "bob".to_owned()), None);
        assert_eq!(check_username(&mut v, "username", "bad name!".to_owned()), None);
        assert_eq!(check_email(&mut v, "email", "not-an-email".to_owned()), None);
        assert_eq!(check_password(&mut v, "password", "short".to_owned()), None);
        assert_eq!(v.0.len(), 4);
    }

    #[test]
    fn only_ascii_is_accepted_in_emails_and_years() {
        let mut v = Violations::default();
        assert_eq!(check_email(&mut v, "email", "ü@exämple.com".to_owned()), None);
        assert_eq!(check_email(&mut v, "email", "fan@example.ком".to_owned()), None);
        assert_eq!(v.0.len(), 2);

        assert_eq!(parse_birth_date("١٩٧٠"), None);
        assert_eq!(parse_birth_date("١٩٧٠-٠١-٠١"), None);
        assert_eq!(parse_birth_date("1970"), NaiveDate::from_ymd_opt(1970, 1, 1));
    }
}
