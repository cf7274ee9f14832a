pub mod persistence;
pub mod profile;
pub mod session;

#[cfg(test)]
pub mod test_helpers {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::profile::{ProfileStore, StoreError};

    /// In-memory profile store whose next `failures` saves return an I/O error.
    #[derive(Default)]
    pub struct MemoryStore {
        profiles: Mutex<HashMap<String, String>>,
        failures: Mutex<u32>,
        saves: Mutex<u32>,
    }

    impl MemoryStore {
        #[must_use]
        pub fn failing(times: u32) -> Self {
            Self { failures: Mutex::new(times), ..Self::default() }
        }

        #[must_use]
        pub fn with_profile(profile: &str, contents: &str) -> Self {
            let store = Self::default();
            store.profiles.lock().unwrap().insert(profile.to_owned(), contents.to_owned());
            store
        }

        #[must_use]
        pub fn get(&self, profile: &str) -> Option<String> {
            self.profiles.lock().unwrap().get(profile).cloned()
        }

        /// Save attempts seen so far, failed ones included.
        #[must_use]
        pub fn save_attempts(&self) -> u32 {
            *self.saves.lock().unwrap()
        }
    }

    #[async_trait::async_trait]
    impl ProfileStore for MemoryStore {
        async fn load(&self, profile: &str) -> Result<Option<String>, StoreError> {
            Ok(self.get(profile))
        }

        async fn save(&self, profile: &str, contents: &str) -> Result<(), StoreError> {
            *self.saves.lock().unwrap() += 1;
            {
                let mut failures = self.failures.lock().unwrap();
                if *failures > 0 {
                    *failures -= 1;
                    return Err(StoreError::Io(std::io::Error::other("disk full")));
                }
            }
            self.profiles.lock().unwrap().insert(profile.to_owned(), contents.to_owned());
            Ok(())
        }

        async fn list(&self) -> Result<Vec<String>, StoreError> {
            let mut names: Vec<String> = self.profiles.lock().unwrap().keys().cloned().collect();
            names.sort();
            Ok(names)
        }
    }
}
