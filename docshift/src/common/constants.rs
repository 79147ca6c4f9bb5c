// history ledger constants
pub const DEFAULT_HISTORY_COLLECTION: &str = "_migrations";
pub const LOCK_COLLECTION_SUFFIX: &str = ".lock";

// history record field names
pub const FIELD_ID: &str = "_id";
pub const FIELD_NAME: &str = "name";
pub const FIELD_APPLIED_AT: &str = "applied_at";
pub const FIELD_VERSION_MAJOR: &str = "version.major";
pub const FIELD_VERSION_MINOR: &str = "version.minor";
pub const FIELD_VERSION_PATCH: &str = "version.patch";
pub const VERSION_FIELDS: [&str; 3] = [
    FIELD_VERSION_MAJOR,
    FIELD_VERSION_MINOR,
    FIELD_VERSION_PATCH,
];

// lock record field names
pub const LOCK_MARKER_ID: &str = "_migration_lock";
pub const FIELD_LOCK_OWNER: &str = "owner";
pub const FIELD_LOCK_ACQUIRED_AT: &str = "acquired_at";

// Compile-time assertion for version field count
const _: () = {
    const VERSION_FIELD_COUNT: usize = 3;
    const ACTUAL_COUNT: usize = VERSION_FIELDS.len();
    const _: [(); 1] = [(); (ACTUAL_COUNT == VERSION_FIELD_COUNT) as usize];
};
