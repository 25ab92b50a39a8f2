//! Instance size names accepted on the command line and their cloud mappings.

/// Default database size when none is requested.
pub const DEFAULT_DB_SIZE: &str = "small";

/// Default worker VM size.
pub const DEFAULT_WORKER_SIZE: &str = "xlarge";

/// Default web VM size.
pub const DEFAULT_WEB_SIZE: &str = "small";

/// Database size name → RDS instance class.
pub const DB_SIZES: &[(&str, &str)] = &[
    ("small", "db.t2.small"),
    ("medium", "db.t2.medium"),
    ("large", "db.m4.large"),
    ("xlarge", "db.m4.xlarge"),
    ("2xlarge", "db.m4.2xlarge"),
    ("4xlarge", "db.m4.4xlarge"),
];

pub const WORKER_SIZES: &[&str] = &[
    "medium", "large", "xlarge", "2xlarge", "4xlarge", "10xlarge", "16xlarge",
];

pub const WEB_SIZES: &[&str] = &["small", "medium", "large", "xlarge", "2xlarge"];

/// Look up the RDS instance class for a database size name.
pub fn db_instance_class(size: &str) -> Option<&'static str> {
    DB_SIZES
        .iter()
        .find(|(name, _)| *name == size)
        .map(|(_, class)| *class)
}

pub fn is_worker_size(size: &str) -> bool {
    WORKER_SIZES.contains(&size)
}

pub fn is_web_size(size: &str) -> bool {
    WEB_SIZES.contains(&size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_db_sizes() {
        assert_eq!(db_instance_class("small"), Some("db.t2.small"));
        assert_eq!(db_instance_class("4xlarge"), Some("db.m4.4xlarge"));
    }

    #[test]
    fn unknown_db_size_is_none() {
        assert_eq!(db_instance_class("huge"), None);
    }

    #[test]
    fn defaults_are_valid() {
        assert!(db_instance_class(DEFAULT_DB_SIZE).is_some());
        assert!(is_worker_size(DEFAULT_WORKER_SIZE));
        assert!(is_web_size(DEFAULT_WEB_SIZE));
    }
}
