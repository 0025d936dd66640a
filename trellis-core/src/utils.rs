//! Utility functions for the container
//!
//! This module provides common utility functions used throughout the crate,
//! following Rust best practices for naming conventions and string manipulation.

/// Naming convention utilities for bean names
pub mod naming {
    /// Converts a PascalCase type name to camelCase for bean naming.
    ///
    /// This is the default bean naming strategy where `UserService`
    /// becomes `userService`.
    ///
    /// # Examples
    ///
    /// ```
    /// use trellis_core::utils::naming::to_camel_case;
    ///
    /// assert_eq!(to_camel_case("UserService"), "userService");
    /// assert_eq!(to_camel_case("DatabaseConnectionPool"), "databaseConnectionPool");
    /// assert_eq!(to_camel_case("A"), "a");
    /// assert_eq!(to_camel_case(""), "");
    /// ```
    pub fn to_camel_case(s: &str) -> String {
        let mut chars = s.chars();
        match chars.next() {
            None => String::new(),
            Some(first) => {
                let mut result = String::with_capacity(s.len());
                result.extend(first.to_lowercase());
                result.push_str(chars.as_str());
                result
            }
        }
    }

    /// Converts a string to snake_case.
    ///
    /// This is useful for configuration keys and other lowercase identifiers.
    ///
    /// # Examples
    ///
    /// ```
    /// use trellis_core::utils::naming::to_snake_case;
    ///
    /// assert_eq!(to_snake_case("UserService"), "user_service");
    /// assert_eq!(to_snake_case("DatabaseConnectionPool"), "database_connection_pool");
    /// ```
    pub fn to_snake_case(s: &str) -> String {
        let mut result = String::with_capacity(s.len() + s.len() / 2);
        for ch in s.chars() {
            if ch.is_uppercase() {
                if !result.is_empty() {
                    result.push('_');
                }
                result.extend(ch.to_lowercase());
            } else {
                result.push(ch);
            }
        }
        result
    }
}

/// Dependency resolution utilities
pub mod dependency {
    use parking_lot::RwLock;
    use std::collections::HashSet;

    /// Tracks beans currently being created to detect circular dependencies.
    ///
    /// This is a thread-safe wrapper around a HashSet that maintains the set
    /// of beans currently in the creation process on any thread.
    #[derive(Debug, Default)]
    pub struct CreationTracker {
        creating: RwLock<HashSet<String>>,
    }

    impl CreationTracker {
        /// Creates a new empty creation tracker.
        pub fn new() -> Self {
            Self::default()
        }

        /// Checks if a bean is currently being created.
        pub fn is_creating(&self, name: &str) -> bool {
            self.creating.read().contains(name)
        }

        /// Marks a bean as being created.
        ///
        /// Returns `true` if the bean was not already being created,
        /// `false` if it was already in the creating set (circular
        /// dependency detected).
        pub fn start_creating(&self, name: &str) -> bool {
            self.creating.write().insert(name.to_string())
        }

        /// Marks a bean as finished being created.
        pub fn finish_creating(&self, name: &str) {
            self.creating.write().remove(name);
        }

        /// Gets a snapshot of all beans currently being created.
        ///
        /// This is useful for debugging and error messages.
        pub fn current_creating(&self) -> Vec<String> {
            self.creating.read().iter().cloned().collect()
        }
    }

    /// RAII guard that unmarks a bean when creation ends, even on the
    /// error path.
    pub struct CreationGuard<'a> {
        tracker: &'a CreationTracker,
        name: String,
    }

    impl<'a> CreationGuard<'a> {
        /// Marks the bean as being created.
        ///
        /// Returns `None` when the bean is already being created, which
        /// means the caller has hit a circular dependency.
        pub fn enter(tracker: &'a CreationTracker, name: &str) -> Option<Self> {
            if tracker.start_creating(name) {
                Some(Self {
                    tracker,
                    name: name.to_string(),
                })
            } else {
                None
            }
        }
    }

    impl Drop for CreationGuard<'_> {
        fn drop(&mut self) {
            self.tracker.finish_creating(&self.name);
        }
    }
}
