use crate::models::{ProfileUpdate, User, UserRecord};
use crate::store::{self, CURRENT_USER_KEY, Store, StoreError, USERS_KEY};
use crate::utils;

/// Local account registry and session holder.
///
/// Credentials live in plaintext in the store; this is a convenience login for a
/// single machine, not a security boundary. Every failed auth check is reported
/// as `Ok(false)` with no reason attached. `Err` is reserved for store faults.
#[derive(Debug, Default)]
pub struct AuthService {
    user: Option<User>,
}

impl AuthService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick up the session persisted by a previous run
    pub fn restore<S: Store + ?Sized>(store: &S) -> Result<Self, StoreError> {
        let user: Option<User> = store::load_json(store, CURRENT_USER_KEY)?;
        if let Some(ref u) = user {
            tracing::debug!(user_id = %u.id, "restored session");
        }
        Ok(Self { user })
    }

    pub fn current_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    fn load_users<S: Store + ?Sized>(store: &S) -> Result<Vec<UserRecord>, StoreError> {
        Ok(store::load_json(store, USERS_KEY)?.unwrap_or_default())
    }

    fn start_session<S: Store + ?Sized>(&mut self, store: &S, user: User) -> Result<(), StoreError> {
        store::save_json(store, CURRENT_USER_KEY, &user)?;
        self.user = Some(user);
        Ok(())
    }

    pub fn register<S: Store + ?Sized>(
        &mut self,
        store: &S,
        email: &str,
        password: &str,
        name: &str,
        department: Option<&str>,
    ) -> Result<bool, StoreError> {
        let mut users = Self::load_users(store)?;
        if users.iter().any(|u| u.email == email) {
            tracing::info!("registration rejected: email already in use");
            return Ok(false);
        }

        let record = UserRecord {
            id: utils::next_id(|id| users.iter().any(|u| u.id == id)),
            name: name.to_string(),
            email: email.to_string(),
            department: department.map(str::to_string),
            password: password.to_string(),
        };
        let user = record.to_user();
        users.push(record);
        store::save_json(store, USERS_KEY, &users)?;

        tracing::info!(user_id = %user.id, "registered user");
        self.start_session(store, user)?;
        Ok(true)
    }

    pub fn login<S: Store + ?Sized>(&mut self, store: &S, email: &str, password: &str) -> Result<bool, StoreError> {
        let users = Self::load_users(store)?;
        match users.iter().find(|u| u.email == email && u.password == password) {
            Some(record) => {
                tracing::info!(user_id = %record.id, "logged in");
                self.start_session(store, record.to_user())?;
                Ok(true)
            }
            None => {
                tracing::info!("login rejected");
                Ok(false)
            }
        }
    }

    pub fn logout<S: Store + ?Sized>(&mut self, store: &S) -> Result<(), StoreError> {
        if let Some(user) = self.user.take() {
            tracing::info!(user_id = %user.id, "logged out");
        }
        store.remove(CURRENT_USER_KEY)
    }

    pub fn update_profile<S: Store + ?Sized>(&mut self, store: &S, update: ProfileUpdate) -> Result<bool, StoreError> {
        let Some(session) = self.user.as_ref() else {
            return Ok(false);
        };

        let mut users = Self::load_users(store)?;
        let Some(index) = users.iter().position(|u| u.id == session.id) else {
            tracing::warn!(user_id = %session.id, "session user missing from registry");
            return Ok(false);
        };

        // Blank means "keep the current password"
        let new_password = update.new_password.filter(|p| !p.is_empty());

        // A password change always needs the current password
        if new_password.is_some() {
            match update.current_password.as_deref() {
                Some(current) if current == users[index].password => {}
                _ => {
                    tracing::info!(user_id = %session.id, "profile update rejected: wrong password");
                    return Ok(false);
                }
            }
        }

        if update.email != users[index].email
            && users.iter().any(|u| u.email == update.email && u.id != session.id)
        {
            tracing::info!(user_id = %session.id, "profile update rejected: email in use");
            return Ok(false);
        }

        let record = &mut users[index];
        record.name = update.name;
        record.department = update.department;
        record.email = update.email;
        if let Some(new_password) = new_password {
            record.password = new_password;
        }
        let user = record.to_user();

        store::save_json(store, USERS_KEY, &users)?;
        tracing::info!(user_id = %user.id, "profile updated");
        self.start_session(store, user)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn registered(store: &MemoryStore) -> AuthService {
        let mut auth = AuthService::new();
        assert!(auth
            .register(store, "ada@uni.edu", "pw1", "Ada", Some("Mathematics"))
            .unwrap());
        auth
    }

    fn stored_password(store: &MemoryStore, email: &str) -> String {
        let users: Vec<UserRecord> = store::load_json(store, USERS_KEY).unwrap().unwrap();
        users.into_iter().find(|u| u.email == email).unwrap().password
    }

    #[test]
    fn register_starts_session_without_password() {
        let store = MemoryStore::new();
        let auth = registered(&store);

        let user = auth.current_user().unwrap();
        assert_eq!(user.email, "ada@uni.edu");
        let session = store.get(CURRENT_USER_KEY).unwrap().unwrap();
        assert!(!session.contains("pw1"));
    }

    #[test]
    fn duplicate_registration_fails_and_keeps_password() {
        let store = MemoryStore::new();
        registered(&store);

        let mut other = AuthService::new();
        assert!(!other
            .register(&store, "ada@uni.edu", "hijack", "Mallory", None)
            .unwrap());
        assert!(other.current_user().is_none());
        assert_eq!(stored_password(&store, "ada@uni.edu"), "pw1");
    }

    #[test]
    fn login_is_exact_and_case_sensitive() {
        let store = MemoryStore::new();
        let mut auth = registered(&store);
        auth.logout(&store).unwrap();

        assert!(!auth.login(&store, "ada@uni.edu", "PW1").unwrap());
        assert!(!auth.login(&store, "ADA@uni.edu", "pw1").unwrap());
        assert!(auth.current_user().is_none());

        assert!(auth.login(&store, "ada@uni.edu", "pw1").unwrap());
        assert_eq!(auth.current_user().unwrap().name, "Ada");
    }

    #[test]
    fn logout_clears_memory_and_store() {
        let store = MemoryStore::new();
        let mut auth = registered(&store);
        auth.logout(&store).unwrap();

        assert!(!auth.is_authenticated());
        assert!(store.get(CURRENT_USER_KEY).unwrap().is_none());
        assert!(!AuthService::restore(&store).unwrap().is_authenticated());
    }

    #[test]
    fn restore_picks_up_persisted_session() {
        let store = MemoryStore::new();
        let auth = registered(&store);
        let restored = AuthService::restore(&store).unwrap();
        assert_eq!(restored.current_user(), auth.current_user());
    }

    #[test]
    fn update_profile_requires_session() {
        let store = MemoryStore::new();
        let mut auth = AuthService::new();
        let update = ProfileUpdate {
            name: "Nobody".to_string(),
            email: "nobody@uni.edu".to_string(),
            ..Default::default()
        };
        assert!(!auth.update_profile(&store, update).unwrap());
    }

    #[test]
    fn blank_new_password_keeps_the_old_one() {
        let store = MemoryStore::new();
        let mut auth = registered(&store);

        let update = ProfileUpdate {
            name: "Ada".to_string(),
            department: Some("Mathematics".to_string()),
            email: "ada@uni.edu".to_string(),
            new_password: Some(String::new()),
            ..Default::default()
        };
        assert!(auth.update_profile(&store, update).unwrap());
        assert_eq!(stored_password(&store, "ada@uni.edu"), "pw1");
    }

    #[test]
    fn update_profile_checks_current_password() {
        let store = MemoryStore::new();
        let mut auth = registered(&store);

        let wrong = ProfileUpdate {
            name: "Ada".to_string(),
            department: Some("Mathematics".to_string()),
            email: "ada@uni.edu".to_string(),
            current_password: Some("nope".to_string()),
            new_password: Some("pw2".to_string()),
        };
        assert!(!auth.update_profile(&store, wrong).unwrap());

        let missing = ProfileUpdate {
            name: "Ada".to_string(),
            email: "ada@uni.edu".to_string(),
            new_password: Some("pw2".to_string()),
            ..Default::default()
        };
        assert!(!auth.update_profile(&store, missing).unwrap());
        assert_eq!(stored_password(&store, "ada@uni.edu"), "pw1");

        let right = ProfileUpdate {
            name: "Ada L.".to_string(),
            department: Some("Computing".to_string()),
            email: "ada@uni.edu".to_string(),
            current_password: Some("pw1".to_string()),
            new_password: Some("pw2".to_string()),
        };
        assert!(auth.update_profile(&store, right).unwrap());
        assert_eq!(stored_password(&store, "ada@uni.edu"), "pw2");
        assert_eq!(auth.current_user().unwrap().name, "Ada L.");
    }

    #[test]
    fn update_profile_rejects_email_taken_by_another_user() {
        let store = MemoryStore::new();
        let mut first = registered(&store);
        let mut second = AuthService::new();
        assert!(second
            .register(&store, "grace@uni.edu", "pw", "Grace", None)
            .unwrap());

        let update = ProfileUpdate {
            name: "Grace".to_string(),
            email: "ada@uni.edu".to_string(),
            ..Default::default()
        };
        assert!(!second.update_profile(&store, update).unwrap());

        // Keeping one's own email is not a collision
        let same = ProfileUpdate {
            name: "Ada".to_string(),
            department: None,
            email: "ada@uni.edu".to_string(),
            ..Default::default()
        };
        assert!(first.update_profile(&store, same).unwrap());
        assert_eq!(first.current_user().unwrap().department, None);
    }

    #[test]
    fn user_ids_are_unique_within_registry() {
        let store = MemoryStore::new();
        let mut auth = AuthService::new();
        for i in 0..5 {
            let email = format!("user{}@uni.edu", i);
            assert!(auth.register(&store, &email, "pw", "User", None).unwrap());
        }
        let users: Vec<UserRecord> = store::load_json(&store, USERS_KEY).unwrap().unwrap();
        let mut ids: Vec<_> = users.iter().map(|u| u.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }
}
