//! Allow-list derivation.
//!
//! The allow-list is a pure function of the main member, the current winner
//! set, and the stored identity mappings, nothing else. Callers fetch the
//! mappings and pass them in, so the computation is independently testable.

use std::collections::{HashMap, HashSet};

use crate::common::{ChatIdentity, ExternalIdentity};

#[derive(Debug)]
pub struct AllowListOutcome {
    /// External identities permitted to remain in the room.
    pub allow: HashSet<ExternalIdentity>,
    /// Winners with no resolved external identity. They cannot be enforced;
    /// the caller logs them as a data-integrity warning.
    pub unresolved: Vec<ChatIdentity>,
}

/// Build a room's allow-list: the main member plus the external identity of
/// every current winner that has one on file.
pub fn compute_allow_list(
    main_member: &ExternalIdentity,
    winners: &[ChatIdentity],
    mapping: &HashMap<ChatIdentity, ExternalIdentity>,
) -> AllowListOutcome {
    let mut allow = HashSet::new();
    allow.insert(main_member.clone());

    let mut unresolved = Vec::new();
    for winner in winners {
        match mapping.get(winner) {
            Some(external) => {
                allow.insert(external.clone());
            }
            None => unresolved.push(winner.clone()),
        }
    }

    AllowListOutcome { allow, unresolved }
}
