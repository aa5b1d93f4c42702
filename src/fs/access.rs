//! Owner/group/other access checks, superuser bypass (§4.5).
//!
//! Grounded on the teacher's `TypePerm::{owner,group,other}_access` bit
//! extraction (`ext/inner/body/typeperm.rs`), generalized from ext2's
//! combined type-and-perm word to this filesystem's separate `mode` field.

use crate::fs::inode::{Access, Inode, PermissionClass};

/// The effective user this mounted filesystem acts as. There is no
/// multi-user concurrency (§5 non-goal) — one identity is in effect for
/// every operation the caller issues through a given `Filesystem` handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub uid: u16,
    pub gid: u16,
}

impl Identity {
    pub const ROOT: Identity = Identity { uid: 0, gid: 0 };

    pub fn is_root(&self) -> bool {
        self.uid == 0
    }
}

impl Default for Identity {
    fn default() -> Self {
        Identity::ROOT
    }
}

/// `check(inode, required)`: true iff root, or the matching owner/group/other
/// mask is a superset of `required`.
pub fn check(identity: &Identity, inode: &Inode, required: Access) -> bool {
    if identity.is_root() {
        return true;
    }
    let class = if inode.owner == identity.uid {
        PermissionClass::Owner
    } else if inode.group == identity.gid {
        PermissionClass::Group
    } else {
        PermissionClass::Other
    };
    inode.class_mask(class) & required.0 == required.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inode_with(owner: u16, group: u16, mode: u16) -> Inode {
        let mut inode = Inode::default();
        inode.owner = owner;
        inode.group = group;
        inode.mode = mode;
        inode
    }

    #[test]
    fn root_bypasses_every_check() {
        let inode = inode_with(1, 1, 0o000);
        assert!(check(&Identity::ROOT, &inode, Access::READ));
        assert!(check(&Identity::ROOT, &inode, Access::WRITE));
    }

    #[test]
    fn owner_uses_the_owner_bits() {
        let inode = inode_with(7, 7, 0o640);
        let owner = Identity { uid: 7, gid: 9 };
        assert!(check(&owner, &inode, Access::READ));
        assert!(check(&owner, &inode, Access::WRITE));
        assert!(!check(&owner, &inode, Access::EXEC));
    }

    #[test]
    fn non_owner_same_group_uses_group_bits() {
        let inode = inode_with(1, 7, 0o640);
        let grouped = Identity { uid: 2, gid: 7 };
        assert!(check(&grouped, &inode, Access::READ));
        assert!(!check(&grouped, &inode, Access::WRITE));
    }

    #[test]
    fn stranger_uses_other_bits() {
        let inode = inode_with(1, 1, 0o644);
        let stranger = Identity { uid: 2, gid: 2 };
        assert!(check(&stranger, &inode, Access::READ));
        assert!(!check(&stranger, &inode, Access::WRITE));
    }
}
