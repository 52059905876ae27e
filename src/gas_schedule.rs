//! Revision-aware gas schedules.
//!
//! Costs that change across revisions live here; costs that never changed
//! are plain constants in `gas_cost`. The SSTORE matrix maps the nine
//! storage transition statuses to a cost and a (possibly negative) refund
//! delta, per revision.

use crate::{host::StorageStatus, revision::Revision};

/// Gas costs that vary by revision.
#[derive(Debug, Clone, Copy)]
pub struct GasSchedule {
    // Storage reads
    pub sload: u64,

    // Account access
    pub balance: u64,
    pub extcodesize: u64,
    pub extcodecopy_base: u64,
    pub extcodehash: u64,

    // Call-family base cost, not including memory, value or stipend.
    pub call_base: u64,

    pub selfdestruct: u64,
    pub selfdestruct_new_account: u64,

    pub exp_byte: u64,

    // Cold/warm access tracking (EIP-2929)
    pub has_access_lists: bool,
    pub cold_sload: u64,
    pub warm_sload: u64,
    pub cold_account_access: u64,
    pub warm_account_access: u64,

    // 63/64 forwarding rule (EIP-150)
    pub has_63_64_rule: bool,
}

impl GasSchedule {
    pub const fn for_revision(revision: Revision) -> &'static GasSchedule {
        match revision {
            Revision::Frontier | Revision::Homestead => &FRONTIER_SCHEDULE,
            Revision::Tangerine => &TANGERINE_SCHEDULE,
            Revision::SpuriousDragon
            | Revision::Byzantium
            | Revision::Constantinople
            | Revision::Petersburg => &SPURIOUS_DRAGON_SCHEDULE,
            Revision::Istanbul => &ISTANBUL_SCHEDULE,
            _ => &BERLIN_SCHEDULE,
        }
    }

    /// SLOAD cost, considering cold/warm access from Berlin on.
    #[inline]
    pub const fn sload_cost(&self, is_cold: bool) -> u64 {
        if self.has_access_lists {
            if is_cold { self.cold_sload } else { self.warm_sload }
        } else {
            self.sload
        }
    }

    /// Account access cost (BALANCE, EXTCODESIZE, EXTCODEHASH and the call
    /// family), considering cold/warm access from Berlin on.
    #[inline]
    pub const fn account_access_cost(&self, is_cold: bool, base_cost: u64) -> u64 {
        if self.has_access_lists {
            if is_cold {
                self.cold_account_access
            } else {
                self.warm_account_access
            }
        } else {
            base_cost
        }
    }
}

pub static FRONTIER_SCHEDULE: GasSchedule = GasSchedule {
    sload: 50,
    balance: 20,
    extcodesize: 20,
    extcodecopy_base: 20,
    extcodehash: 20,
    call_base: 40,
    selfdestruct: 0,
    selfdestruct_new_account: 0,
    exp_byte: 10,
    has_access_lists: false,
    cold_sload: 0,
    warm_sload: 0,
    cold_account_access: 0,
    warm_account_access: 0,
    has_63_64_rule: false,
};

/// EIP-150 IO repricing.
pub static TANGERINE_SCHEDULE: GasSchedule = GasSchedule {
    sload: 200,
    balance: 400,
    extcodesize: 700,
    extcodecopy_base: 700,
    extcodehash: 400,
    call_base: 700,
    selfdestruct: 5000,
    selfdestruct_new_account: 25000,
    has_63_64_rule: true,
    ..FRONTIER_SCHEDULE
};

/// EIP-160 EXP repricing.
pub static SPURIOUS_DRAGON_SCHEDULE: GasSchedule = GasSchedule {
    exp_byte: 50,
    ..TANGERINE_SCHEDULE
};

/// EIP-1884 IO repricing.
pub static ISTANBUL_SCHEDULE: GasSchedule = GasSchedule {
    sload: 800,
    balance: 700,
    extcodehash: 700,
    ..SPURIOUS_DRAGON_SCHEDULE
};

/// EIP-2929 cold/warm access lists. Base costs become irrelevant; the
/// cold/warm pair is what gets charged.
pub static BERLIN_SCHEDULE: GasSchedule = GasSchedule {
    sload: 0,
    balance: 0,
    extcodesize: 0,
    extcodecopy_base: 0,
    extcodehash: 0,
    call_base: 0,
    has_access_lists: true,
    cold_sload: 2100,
    warm_sload: 100,
    cold_account_access: 2600,
    warm_account_access: 100,
    ..ISTANBUL_SCHEDULE
};

/// Cost and refund delta for one SSTORE, before the cold-slot surcharge.
/// Refund deltas can be negative: a transition may take back a refund that
/// an earlier write in the same transaction granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStoreCost {
    pub gas: u64,
    pub refund: i64,
}

/// The per-revision parameters the SSTORE matrix is derived from.
struct StorageCostSpec {
    /// Net gas metering (EIP-1283/2200) rather than the legacy schedule.
    net_cost: bool,
    /// Warm storage access cost, YP `G_warmaccess`.
    warm_access: i64,
    /// Storage addition cost, YP `G_sset`.
    set: i64,
    /// Storage modification cost, YP `G_sreset`.
    reset: i64,
    /// Storage deletion refund, YP `R_sclear`.
    clear: i64,
}

const fn storage_cost_spec(revision: Revision) -> StorageCostSpec {
    match revision {
        Revision::Frontier
        | Revision::Homestead
        | Revision::Tangerine
        | Revision::SpuriousDragon
        | Revision::Byzantium
        | Revision::Petersburg => StorageCostSpec {
            net_cost: false,
            warm_access: 200,
            set: 20000,
            reset: 5000,
            clear: 15000,
        },
        Revision::Constantinople => StorageCostSpec {
            net_cost: true,
            warm_access: 200,
            set: 20000,
            reset: 5000,
            clear: 15000,
        },
        Revision::Istanbul => StorageCostSpec {
            net_cost: true,
            warm_access: 800,
            set: 20000,
            reset: 5000,
            clear: 15000,
        },
        Revision::Berlin => StorageCostSpec {
            net_cost: true,
            warm_access: 100,
            set: 20000,
            reset: 5000 - 2100,
            clear: 15000,
        },
        // EIP-3529 lowered the clear refund.
        _ => StorageCostSpec {
            net_cost: true,
            warm_access: 100,
            set: 20000,
            reset: 5000 - 2100,
            clear: 4800,
        },
    }
}

/// SSTORE cost and refund delta for a storage transition status. The cold
/// surcharge (EIP-2929) is charged separately by the caller.
pub const fn sstore_cost(revision: Revision, status: StorageStatus) -> StorageStoreCost {
    let spec = storage_cost_spec(revision);
    let (gas, refund) = if !spec.net_cost {
        // Legacy schedule: only the current -> new transition matters.
        match status {
            StorageStatus::Added
            | StorageStatus::DeletedAdded
            | StorageStatus::DeletedRestored => (spec.set, 0),
            StorageStatus::Deleted
            | StorageStatus::ModifiedDeleted
            | StorageStatus::AddedDeleted => (spec.reset, spec.clear),
            StorageStatus::Assigned
            | StorageStatus::Modified
            | StorageStatus::ModifiedRestored => (spec.reset, 0),
        }
    } else {
        match status {
            StorageStatus::Assigned => (spec.warm_access, 0),
            StorageStatus::Added => (spec.set, 0),
            StorageStatus::Deleted => (spec.reset, spec.clear),
            StorageStatus::Modified => (spec.reset, 0),
            StorageStatus::DeletedAdded => (spec.warm_access, -spec.clear),
            StorageStatus::ModifiedDeleted => (spec.warm_access, spec.clear),
            StorageStatus::DeletedRestored => {
                (spec.warm_access, spec.reset - spec.warm_access - spec.clear)
            }
            StorageStatus::AddedDeleted => (spec.warm_access, spec.set - spec.warm_access),
            StorageStatus::ModifiedRestored => (spec.warm_access, spec.reset - spec.warm_access),
        }
    };
    StorageStoreCost {
        gas: gas as u64,
        refund,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontier_schedule() {
        let schedule = GasSchedule::for_revision(Revision::Frontier);
        assert_eq!(schedule.sload, 50);
        assert_eq!(schedule.balance, 20);
        assert!(!schedule.has_access_lists);
        assert!(!schedule.has_63_64_rule);
    }

    #[test]
    fn berlin_cold_warm() {
        let schedule = GasSchedule::for_revision(Revision::Berlin);
        assert!(schedule.has_access_lists);
        assert_eq!(schedule.sload_cost(true), 2100);
        assert_eq!(schedule.sload_cost(false), 100);
        assert_eq!(schedule.account_access_cost(true, 0), 2600);
        assert_eq!(schedule.account_access_cost(false, 0), 100);
    }

    #[test]
    fn pre_berlin_ignores_cold_warm() {
        let schedule = GasSchedule::for_revision(Revision::Istanbul);
        assert_eq!(schedule.sload_cost(true), 800);
        assert_eq!(schedule.sload_cost(false), 800);
    }

    #[test]
    fn sstore_cancun_matrix() {
        use StorageStatus::*;
        let cost = |status| sstore_cost(Revision::Cancun, status);
        assert_eq!(cost(Assigned), StorageStoreCost { gas: 100, refund: 0 });
        assert_eq!(cost(Added), StorageStoreCost { gas: 20000, refund: 0 });
        assert_eq!(cost(Deleted), StorageStoreCost { gas: 2900, refund: 4800 });
        assert_eq!(cost(Modified), StorageStoreCost { gas: 2900, refund: 0 });
        assert_eq!(cost(DeletedAdded), StorageStoreCost { gas: 100, refund: -4800 });
        assert_eq!(cost(ModifiedDeleted), StorageStoreCost { gas: 100, refund: 4800 });
        assert_eq!(cost(DeletedRestored), StorageStoreCost { gas: 100, refund: 2900 - 100 - 4800 });
        assert_eq!(cost(AddedDeleted), StorageStoreCost { gas: 100, refund: 19900 });
        assert_eq!(cost(ModifiedRestored), StorageStoreCost { gas: 100, refund: 2800 });
    }

    #[test]
    fn sstore_legacy_matrix() {
        use StorageStatus::*;
        let cost = |status| sstore_cost(Revision::Homestead, status);
        assert_eq!(cost(Added), StorageStoreCost { gas: 20000, refund: 0 });
        assert_eq!(cost(Deleted), StorageStoreCost { gas: 5000, refund: 15000 });
        assert_eq!(cost(Assigned), StorageStoreCost { gas: 5000, refund: 0 });
        // Dirty-slot distinctions collapse onto the clean transitions.
        assert_eq!(cost(DeletedAdded), cost(Added));
        assert_eq!(cost(ModifiedDeleted), cost(Deleted));
    }

    #[test]
    fn london_lowered_clear_refund() {
        use StorageStatus::*;
        assert_eq!(sstore_cost(Revision::Berlin, Deleted).refund, 15000);
        assert_eq!(sstore_cost(Revision::London, Deleted).refund, 4800);
        assert_eq!(sstore_cost(Revision::Cancun, Deleted).refund, 4800);
    }
}
