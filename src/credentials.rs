use crate::database::UserDb;
use crate::error::{Error, Result};
use crate::model::*;
use crate::validation::{check_date, check_email, check_password, check_username, Violations};
use log::info;
use std::collections::BTreeSet;

/// Owns account records: registration, password checks and self-service
/// profile changes.
#[derive(Clone)]
pub struct CredentialStore {
    db: sled::Db,
    cost: u32,
}

/// Refuses to act on any account but the caller's own.
pub fn ensure_self(actor: &Identity, target: &str) -> Result<()> {
    if actor.user.username == target {
        Ok(())
    } else {
        Err(Error::Authorization(format!(
            "{} may not act on behalf of {}",
            actor.user.username, target
        )))
    }
}

impl CredentialStore {
    pub fn new(db: sled::Db, cost: u32) -> Self {
        CredentialStore { db, cost }
    }

    pub fn register(&self, candidate: Registration) -> Result<Identity> {
        let mut v = Violations::default();
        let username = v
            .required("username", candidate.username)
            .and_then(|u| check_username(&mut v, "username", u));
        let password = match candidate.password {
            Some(password) => check_password(&mut v, "password", password),
            None => {
                v.add("password", "is required");
                None
            }
        };
        let email = v
            .required("email", candidate.email)
            .and_then(|e| check_email(&mut v, "email", e));
        let birth_date = check_date(&mut v, "birthDate", candidate.birth_date);
        v.finish()?;

        let user = User {
            username: username.unwrap_or_default(),
            email: email.unwrap_or_default(),
            password_hash: bcrypt::hash(password.unwrap_or_default(), self.cost)?,
            first_name: candidate.first_name,
            last_name: candidate.last_name,
            birth_date,
            favorite_movies: BTreeSet::new(),
        };
        let id = self.db.add_user(&user)?;
        info!("registered user {} ({})", user.username, id);
        Ok(Identity { id, user })
    }

    pub fn verify(&self, username: &str, password: &str) -> Result<Identity> {
        let identity = self
            .db
            .get_user_by_username(username)?
            .ok_or_else(|| Error::NotFound(format!("user {}", username)))?;
        if bcrypt::verify(password, &identity.user.password_hash)? {
            Ok(identity)
        } else {
            Err(Error::Authentication("incorrect password".to_owned()))
        }
    }

    pub fn profile(&self, actor: &Identity, target: &str) -> Result<Profile> {
        ensure_self(actor, target)?;
        Ok(Profile::from(actor))
    }

    /// Applies the fields present in `update` to the caller's own record.
    pub fn update_profile(
        &self,
        actor: &Identity,
        target: &str,
        update: ProfileUpdate,
    ) -> Result<Identity> {
        ensure_self(actor, target)?;

        let mut v = Violations::default();
        let username = update
            .username
            .and_then(|u| check_username(&mut v, "username", u));
        let email = update.email.and_then(|e| check_email(&mut v, "email", e));
        let password = update
            .password
            .and_then(|p| check_password(&mut v, "password", p));
        let birth_date = check_date(&mut v, "birthDate", update.birth_date);
        v.finish()?;

        let password_hash = match password {
            Some(password) => Some(bcrypt::hash(password, self.cost)?),
            None => None,
        };
        let first_name = update.first_name;
        let last_name = update.last_name;

        let user = self.db.update_user(actor.id, |user| {
            if let Some(username) = &username {
                user.username = username.clone();
            }
            if let Some(email) = &email {
                user.email = email.clone();
            }
            if let Some(hash) = &password_hash {
                user.password_hash = hash.clone();
            }
            if let Some(first_name) = &first_name {
                user.first_name = Some(first_name.clone());
            }
            if let Some(last_name) = &last_name {
                user.last_name = Some(last_name.clone());
            }
            if let Some(birth_date) = birth_date {
                user.birth_date = Some(birth_date);
            }
        })?;
        info!("updated profile of user {}", actor.id);
        Ok(Identity { id: actor.id, user })
    }

    pub fn deregister(&self, actor: &Identity, target: &str) -> Result<()> {
        ensure_self(actor, target)?;
        self.db.remove_user(actor.id)?;
        info!("deregistered user {} ({})", actor.user.username, actor.id);
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::database::tests::temporary_db;

    pub fn store() -> CredentialStore {
        CredentialStore::new(temporary_db(), 4)
    }

    pub fn registration(username: &str, email: &str) -> Registration {
        Registration {
            username: Some(username.to_owned()),
            password: Some("correct horse battery".to_owned()),
            email: Some(email.to_owned()),
            ..Registration::default()
        }
    }

    fn fields(err: Error) -> Vec<String> {
        match err {
            Error::Validation(fields) => fields.into_iter().map(|f| f.field).collect(),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn register_then_verify() {
        let store = store();
        let registered = store
            .register(registration("daphne", "Daphne@Example.com"))
            .unwrap();
        assert_eq!(registered.user.email, "daphne@example.com");
        assert_ne!(registered.user.password_hash, "correct horse battery");

        let verified = store.verify("daphne", "correct horse battery").unwrap();
        assert_eq!(verified.id, registered.id);
        assert!(matches!(
            store.verify("daphne", "correct horse battery!"),
            Err(Error::Authentication(_))
        ));
        assert!(matches!(
            store.verify("Daphne", "correct horse battery"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn register_reports_every_violation() {
        let err = store()
            .register(Registration {
                username: Some("bob".to_owned()),
                password: Some("short".to_owned()),
                email: Some("bob-at-example".to_owned()),
                birth_date: Some("yesterday".to_owned()),
                ..Registration::default()
            })
            .unwrap_err();
        assert_eq!(
            fields(err),
            vec!["username", "password", "email", "birthDate"]
        );

        let err = store().register(Registration::default()).unwrap_err();
        assert_eq!(fields(err), vec!["username", "password", "email"]);
    }

    #[test]
    fn register_conflicts() {
        let store = store();
        store
            .register(registration("daphne", "daphne@example.com"))
            .unwrap();
        let mut other = registration("daphne", "someone@example.com");
        other.first_name = Some("Another".to_owned());
        assert!(matches!(
            store.register(other),
            Err(Error::Conflict(ref f)) if f == "username"
        ));
        assert!(matches!(
            store.register(registration("darwin", "DAPHNE@example.com")),
            Err(Error::Conflict(ref f)) if f == "email"
        ));
    }

    #[test]
    fn profile_is_self_only() {
        let store = store();
        let daphne = store
            .register(registration("daphne", "daphne@example.com"))
            .unwrap();
        store
            .register(registration("darwin", "darwin@example.com"))
            .unwrap();
        assert!(matches!(
            store.update_profile(&daphne, "darwin", ProfileUpdate::default()),
            Err(Error::Authorization(_))
        ));
        assert!(matches!(
            store.deregister(&daphne, "darwin"),
            Err(Error::Authorization(_))
        ));
        assert!(matches!(
            store.profile(&daphne, "darwin"),
            Err(Error::Authorization(_))
        ));
        assert_eq!(store.profile(&daphne, "daphne").unwrap().id, daphne.id);
    }

    #[test]
    fn update_applies_present_fields_only() {
        let store = store();
        let daphne = store
            .register(Registration {
                first_name: Some("Daphne".to_owned()),
                last_name: Some("Blake".to_owned()),
                ..registration("daphne", "daphne@example.com")
            })
            .unwrap();

        let updated = store
            .update_profile(
                &daphne,
                "daphne",
                ProfileUpdate {
                    last_name: Some("Moon".to_owned()),
                    password: Some("an even longer secret".to_owned()),
                    birth_date: Some("1990-04-01".to_owned()),
                    ..ProfileUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(updated.user.first_name.as_deref(), Some("Daphne"));
        assert_eq!(updated.user.last_name.as_deref(), Some("Moon"));
        assert_eq!(updated.user.email, "daphne@example.com");
        assert!(store.verify("daphne", "an even longer secret").is_ok());
        assert!(matches!(
            store.verify("daphne", "correct horse battery"),
            Err(Error::Authentication(_))
        ));
    }

    #[test]
    fn update_rechecks_uniqueness() {
        let store = store();
        let daphne = store
            .register(registration("daphne", "daphne@example.com"))
            .unwrap();
        store
            .register(registration("darwin", "darwin@example.com"))
            .unwrap();

        let rename = ProfileUpdate {
            username: Some("darwin".to_owned()),
            ..ProfileUpdate::default()
        };
        assert!(matches!(
            store.update_profile(&daphne, "daphne", rename),
            Err(Error::Conflict(ref f)) if f == "username"
        ));

        let bad = ProfileUpdate {
            username: Some("dap".to_owned()),
            email: Some("nope".to_owned()),
            ..ProfileUpdate::default()
        };
        assert_eq!(
            fields(store.update_profile(&daphne, "daphne", bad).unwrap_err()),
            vec!["username", "email"]
        );
        assert!(store.verify("daphne", "correct horse battery").is_ok());
    }

    #[test]
    fn deregister_frees_the_name() {
        let store = store();
        let daphne = store
            .register(registration("daphne", "daphne@example.com"))
            .unwrap();
        store.deregister(&daphne, "daphne").unwrap();
        assert!(matches!(
            store.verify("daphne", "correct horse battery"),
            Err(Error::NotFound(_))
        ));
        store
            .register(registration("daphne", "daphne@example.com"))
            .unwrap();
    }
}
