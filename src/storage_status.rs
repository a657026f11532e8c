use ethereum_types::U256;

/// Classifies an SSTORE by the triple (original, current, new) value, per
/// EIP-2200/EIP-3529 (spec.md's §3 storage-status table). Drives both the
/// gas charged and the refund accrued/reversed for the store; factored out
/// of the opcode handler so the case analysis can be exercised directly
/// against the triple instead of through a whole `VM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageStatus {
    /// current == new: a no-op write, regardless of original (covers the
    /// X|X|X diagonal and every other current==new case the table folds
    /// into "otherwise -> Assigned").
    Assigned,
    /// original == current == 0, new != 0: zero -> non-zero, first write
    /// this transaction.
    Added,
    /// original == current != 0, new == 0: non-zero -> zero, first write
    /// this transaction.
    Deleted,
    /// original == current, both new and current non-zero and distinct:
    /// an ordinary overwrite, first write this transaction.
    Modified,
    /// original != current (already dirty), current == 0, new not in
    /// {0, original}: a zeroed dirty slot being set to a fresh value.
    DeletedAdded,
    /// original != current (already dirty), current not in {0, original},
    /// new == 0: a modified dirty slot being zeroed.
    ModifiedDeleted,
    /// original != current (already dirty), current == 0, new == original
    /// (and original != 0): a zeroed dirty slot restored to its
    /// pre-transaction value.
    DeletedRestored,
    /// original == 0, current != 0, new == 0: a dirty slot added then
    /// deleted within the same transaction, landing back at 0.
    AddedDeleted,
    /// original != current (already dirty), current not in {0, original},
    /// new == original (and original != 0): a modified dirty slot restored
    /// to its pre-transaction value.
    ModifiedRestored,
}

pub fn classify(original: U256, current: U256, new: U256) -> StorageStatus {
    if current == new {
        return StorageStatus::Assigned;
    }

    if original == current {
        if original.is_zero() {
            return StorageStatus::Added;
        }
        if new.is_zero() {
            return StorageStatus::Deleted;
        }
        return StorageStatus::Modified;
    }

    // original != current: the slot is already dirty this transaction.
    if original.is_zero() {
        // current != 0 (else original == current above), new == 0 (else
        // new == current would also take the Assigned branch above only
        // when new==current; here new could differ from both — but with
        // original == 0 the only restoring target is 0 itself).
        return StorageStatus::AddedDeleted;
    }

    if new == original {
        if current.is_zero() {
            return StorageStatus::DeletedRestored;
        }
        return StorageStatus::ModifiedRestored;
    }

    if current.is_zero() {
        return StorageStatus::DeletedAdded;
    }
    StorageStatus::ModifiedDeleted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_to_nonzero_is_added() {
        let status = classify(U256::zero(), U256::zero(), U256::from(5));
        assert_eq!(status, StorageStatus::Added);
    }

    #[test]
    fn nonzero_to_zero_is_deleted() {
        let status = classify(U256::from(5), U256::from(5), U256::zero());
        assert_eq!(status, StorageStatus::Deleted);
    }

    #[test]
    fn rewriting_same_value_is_assigned() {
        let status = classify(U256::from(5), U256::from(7), U256::from(7));
        assert_eq!(status, StorageStatus::Assigned);
    }

    #[test]
    fn restoring_original_after_a_dirty_write_from_zero() {
        let status = classify(U256::from(5), U256::zero(), U256::from(5));
        assert_eq!(status, StorageStatus::DeletedRestored);
    }

    #[test]
    fn restoring_original_after_a_dirty_write_from_nonzero() {
        let status = classify(U256::from(5), U256::from(9), U256::from(5));
        assert_eq!(status, StorageStatus::ModifiedRestored);
    }

    #[test]
    fn dirty_slot_zeroed_then_set_nonzero_again() {
        let status = classify(U256::from(5), U256::zero(), U256::from(9));
        assert_eq!(status, StorageStatus::DeletedAdded);
    }

    #[test]
    fn dirty_slot_modified_then_zeroed() {
        let status = classify(U256::from(5), U256::from(9), U256::zero());
        assert_eq!(status, StorageStatus::ModifiedDeleted);
    }

    #[test]
    fn added_then_deleted_within_the_same_transaction() {
        let status = classify(U256::zero(), U256::from(9), U256::zero());
        assert_eq!(status, StorageStatus::AddedDeleted);
    }
}
