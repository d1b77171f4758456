use ahash::AHashMap as HashMap;

use crate::ledger::world_state::WorldState;

/// Represents the type of conflict detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictType {
    /// The transaction read data that another transaction modified since.
    ReadWrite,
    /// The transaction observed a key as absent and another transaction created it since.
    ReadInsert,
    /// The transaction read data that another transaction deleted since.
    ReadDelete,
}

/// Validates a transaction's read set against the committed world state.
///
/// Every key read by the transaction is recorded with the version it had at
/// read time (`0` for "absent"). The read set is valid when every one of those
/// versions is still current. The returned map lists the keys that are not.
pub fn detect_conflicts(
    read_set: &HashMap<String, u64>,
    world_state: &WorldState,
) -> HashMap<String, ConflictType> {
    let mut conflicts: HashMap<String, ConflictType> = HashMap::new();

    for (key, read_version) in read_set {
        let current_version = world_state.version_of(key);
        if current_version == *read_version {
            continue;
        }

        let conflict = match (*read_version, current_version) {
            (0, _) => ConflictType::ReadInsert,
            (_, 0) => ConflictType::ReadDelete,
            _ => ConflictType::ReadWrite,
        };
        conflicts.insert(key.clone(), conflict);
    }

    conflicts
}
