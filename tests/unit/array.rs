//! End-to-end array tests: scenarios that exercise an array together with a
//! replacement policy and (for the sparse pair) each other, the way a single
//! `src/array/*.rs` file's inline tests exercise one array type in isolation.

use std::sync::Arc;

use assoc_cache::array::sparse::data_array::SparseDataArray;
use assoc_cache::array::sparse::tag_array::{EvictOutcome, SparseTagArray};
use assoc_cache::array::zcache::{PartitionedZArray, ZArray, NO_ELIGIBLE_CANDIDATE};
use assoc_cache::array::CacheArray;
use assoc_cache::config::{SetAssocConfig, ZCacheConfig};
use assoc_cache::hash::{H3HashFamily, SharedHashFamily};
use assoc_cache::mem_req::MemReq;
use assoc_cache::policy::lru::LruPolicy;
use proptest::prelude::*;

use crate::common::{bit_extract_hash, set_assoc_4x2, zcache_16x4x8, zcache_4x2x2, zcache_4x2x4};

/// *S3 — Sparse sharing.* Two addresses that fingerprint to the same data
/// entry: both tags are approximate and share the entry; evicting one does
/// not free the data slot, evicting the last one does.
#[test]
fn sparse_sharing_scenario() {
    let mut tag = SparseTagArray::new(SetAssocConfig { num_lines: 4, ways: 2 }).unwrap();
    let mut data = SparseDataArray::new(SetAssocConfig { num_lines: 4, ways: 2 }).unwrap();
    let mut tag_policy = LruPolicy::new();
    let mut data_policy = LruPolicy::new();

    let map_value = 0x7;

    let req_a = MemReq::new(0x100, 0);
    let data_id = insert_data_entry(&mut data, &mut data_policy, map_value, &req_a);
    let tag_a = insert_tag(&mut tag, &mut data, &mut tag_policy, &req_a, data_id);

    let req_b = MemReq::new(0x200, 0);
    assert_eq!(data.lookup(map_value), Some(data_id), "same fingerprint must hit the existing data entry");
    let tag_b = insert_tag(&mut tag, &mut data, &mut tag_policy, &req_b, data_id);

    assert_eq!(tag.valid_lines(), 2);
    assert_eq!(data.read_list_head(data_id), tag_b as i64, "most recently added tag becomes the list head");
    assert_eq!(tag.read_next(tag_b), tag_a as i64);
    assert_eq!(tag.read_next(tag_a), -1);
    assert_eq!(tag.read_prev(tag_a), tag_b as i64);
    assert_eq!(tag.read_prev(tag_b), -1);

    match tag.evict_associated_data(tag_b) {
        EvictOutcome::ListHeadStillShared { new_head } => {
            assert_eq!(new_head, tag_a as i64);
            data.change_in_place(data_id, new_head);
        }
        other => panic!("expected ListHeadStillShared, got {other:?}"),
    }
    tag.postinsert(tag_b, &MemReq::new(0, 0), -1, false, -1, &mut tag_policy);
    assert_eq!(tag.valid_lines(), 1, "evicting the list head must not free the data slot while a sharer remains");

    match tag.evict_associated_data(tag_a) {
        EvictOutcome::SoleSurvivorSafeToFree => {}
        other => panic!("expected SoleSurvivorSafeToFree, got {other:?}"),
    }
}

fn insert_data_entry(data: &mut SparseDataArray, policy: &mut LruPolicy, map_value: u64, req: &MemReq) -> u64 {
    if let Some(id) = data.lookup(map_value) {
        return id;
    }
    let (id, _, _) = data.preinsert(map_value, policy);
    data.postinsert(id, req, map_value, true, -1, policy);
    id
}

fn insert_tag(tag: &mut SparseTagArray, data: &mut SparseDataArray, policy: &mut LruPolicy, req: &MemReq, data_id: u64) -> u64 {
    let (tag_id, _) = tag.preinsert(req.line_addr, policy);
    let head = data.read_list_head(data_id);
    tag.postinsert(tag_id, req, data_id as i64, true, head, policy);
    data.change_in_place(data_id, tag_id as i64);
    tag_id
}

/// *S4 — Partitioned bypass.* Once both domains have reached the warm-up
/// threshold and own disjoint halves of the array, a fill whose walk lands
/// entirely on the other domain's lines must bypass rather than evict.
#[test]
fn partitioned_bypass_once_both_domains_saturate() {
    let hash: SharedHashFamily = bit_extract_hash();
    let mut array = PartitionedZArray::new(ZCacheConfig { num_lines: 4, ways: 2, cands: 2 }, 2, Arc::clone(&hash)).unwrap();
    let mut policy = LruPolicy::new();

    const DOMAIN_A: u32 = 0;
    const DOMAIN_B: u32 = 1;

    // Domain A takes one line from each hash "side" (addresses 0 and 2 seed
    // positions {0,2} then {0,3} under this hash; the already-resident
    // position 0 is skipped in favor of the still-empty position 3),
    // reaching its num_lines/2 = 2 warm-up threshold at positions 0 and 3.
    for addr in [0x0_u64, 0x2] {
        let req = MemReq { line_addr: addr, pc: 0, src_id: DOMAIN_A };
        let (victim, _) = array.preinsert(&req, &mut policy);
        assert_ne!(victim, NO_ELIGIBLE_CANDIDATE);
        array.postinsert(victim, &req, &mut policy);
    }
    // Domain B takes the two positions A left behind (1 and 2): address 1
    // seeds {1,2} (both still empty); address 5 seeds the same pair again
    // (this hash only resolves 2 bits) but position 1 is now B-owned, so the
    // still-empty position 2 is chosen, reaching B's own threshold.
    for addr in [0x1_u64, 0x5] {
        let req = MemReq { line_addr: addr, pc: 0, src_id: DOMAIN_B };
        let (victim, _) = array.preinsert(&req, &mut policy);
        assert_ne!(victim, NO_ELIGIBLE_CANDIDATE);
        array.postinsert(victim, &req, &mut policy);
    }

    // The array is now full, split evenly. Address 6 seeds the same two
    // physical positions domain A already owns (0x0 and 0x2 do), so domain
    // B's fill of it finds no loosely-eligible candidate at all.
    let req_bypass = MemReq { line_addr: 0x6, pc: 0, src_id: DOMAIN_B };
    let (victim, wb) = array.preinsert(&req_bypass, &mut policy);
    assert_eq!(victim, NO_ELIGIBLE_CANDIDATE, "every candidate is owned by the other, saturated domain");
    assert_eq!(wb, 0);
    array.postinsert(victim, &req_bypass, &mut policy);
    assert_eq!(array.lookup(&req_bypass, false, &mut policy), None, "a bypassed fill must not be installed");
}

/// Boundary behavior: a `ZArray` with `cands == ways` never relocates, so an
/// address always lands on one of its own two seed positions and nothing
/// else is ever disturbed.
#[rstest::rstest]
fn zarray_cands_equal_ways_is_pinned_to_seeds(zcache_4x2x2: ZCacheConfig) {
    let hash = bit_extract_hash();
    let mut array = ZArray::new(zcache_4x2x2, hash).unwrap();
    let mut policy = LruPolicy::new();
    for addr in 0x0..0x6_u64 {
        let req = MemReq::new(addr, 0);
        let (victim, _) = array.preinsert(&req, &mut policy);
        array.postinsert(victim, &req, &mut policy);
    }
    assert_eq!(array.swaps(), 0);
}

/// Boundary behavior: a single-domain `PartitionedZArray` must behave
/// identically to a plain `ZArray` built over the same configuration and
/// hash family.
#[rstest::rstest]
fn single_domain_matches_plain_zarray(zcache_4x2x4: ZCacheConfig) {
    let hash = bit_extract_hash();
    let mut plain = ZArray::new(zcache_4x2x4, Arc::clone(&hash)).unwrap();
    let mut partitioned = PartitionedZArray::new(zcache_4x2x4, 1, Arc::clone(&hash)).unwrap();
    let mut policy_a = LruPolicy::new();
    let mut policy_b = LruPolicy::new();

    for addr in [0x0_u64, 0x1, 0x2, 0x3, 0x4] {
        let req = MemReq { line_addr: addr, pc: 0, src_id: 0 };
        let (v1, wb1) = plain.preinsert(&req, &mut policy_a);
        let (v2, wb2) = partitioned.preinsert(&req, &mut policy_b);
        assert_eq!(v1, v2, "identical geometry and history must choose the identical victim");
        assert_eq!(wb1, wb2);
        plain.postinsert(v1, &req, &mut policy_a);
        partitioned.postinsert(v2, &req, &mut policy_b);
    }
}

/// *Invariant 1.* A resident set-assoc line always lives in the set its
/// address hashes to, across arbitrary fill/evict churn.
#[test]
fn set_assoc_invariant_line_lives_in_its_hashed_set() {
    let hash: SharedHashFamily = Arc::new(H3HashFamily::new(1));
    let num_sets = 4_u64;

    proptest!(ProptestConfig::with_cases(200), |(addrs in proptest::collection::vec(1_u64..10_000, 1..100))| {
        let mut array = assoc_cache::array::set_assoc::SetAssocArray::new(
            SetAssocConfig { num_lines: 8, ways: 2 },
            Arc::clone(&hash),
        ).unwrap();
        let mut policy = LruPolicy::new();
        for addr in addrs {
            let req = MemReq::new(addr, 0);
            if array.lookup(&req, true, &mut policy).is_some() {
                continue;
            }
            let (victim, _) = array.preinsert(&req, &mut policy);
            array.postinsert(victim, &req, &mut policy);
            let id = array.lookup(&req, false, &mut policy).expect("just-installed address must be resident");
            let expected_set = hash.hash(0, addr) & (num_sets - 1);
            prop_assert_eq!(id / 2, expected_set);
        }
    });
}

/// *Round-trip law.* After `postinsert`, a `ZArray` line is always locatable
/// via `lookup`, across arbitrary fill/evict churn driving relocation.
#[test]
fn zarray_round_trip_after_postinsert() {
    proptest!(ProptestConfig::with_cases(100), |(addrs in proptest::collection::vec(1_u64..100_000, 1..150))| {
        let hash: SharedHashFamily = Arc::new(H3HashFamily::new(4));
        let mut array = ZArray::new(ZCacheConfig { num_lines: 16, ways: 4, cands: 8 }, hash).unwrap();
        let mut policy = LruPolicy::new();
        for addr in addrs {
            let req = MemReq::new(addr, 0);
            if array.lookup(&req, true, &mut policy).is_some() {
                continue;
            }
            let (victim, _) = array.preinsert(&req, &mut policy);
            array.postinsert(victim, &req, &mut policy);
            prop_assert!(array.lookup(&req, false, &mut policy).is_some());
        }
    });
}

/// *Invariant 4.* For every non-empty sharing list: exactly one tag has
/// `prev = -1`; every other member is reachable from that head via `next`;
/// `valid_lines` always equals the count of tags with a nonzero address.
///
/// Exercised over random churn on a small tag/data pair with only two
/// possible fingerprints, so every eviction this generates is a tag-array
/// eviction whose effect on the shared data entry this test can verify.
#[test]
fn sparse_sharing_list_invariant_holds_under_churn() {
    proptest!(ProptestConfig::with_cases(200), |(addrs in proptest::collection::vec(1_u64..9, 1..40))| {
        let num_tags = 4;
        let mut tag = SparseTagArray::new(SetAssocConfig { num_lines: num_tags, ways: 2 }).unwrap();
        let mut data = SparseDataArray::new(SetAssocConfig { num_lines: 4, ways: 2 }).unwrap();
        let mut tag_policy = LruPolicy::new();
        let mut data_policy = LruPolicy::new();

        for addr in addrs {
            if tag.lookup(addr).is_some() {
                continue;
            }
            let map_value = addr % 2;
            let req = MemReq::new(addr, 0);

            let data_id = match data.lookup(map_value) {
                Some(id) => id,
                None => {
                    let (id, _, _) = data.preinsert(map_value, &mut data_policy);
                    data.postinsert(id, &req, map_value, true, -1, &mut data_policy);
                    id
                }
            };

            let (tag_id, evicted_addr) = tag.preinsert(addr, &mut tag_policy);
            if evicted_addr != 0 {
                let old_map_id = tag.read_map_id(tag_id);
                if let EvictOutcome::ListHeadStillShared { new_head } = tag.evict_associated_data(tag_id) {
                    data.change_in_place(old_map_id as u64, new_head);
                }
            }
            let head = data.read_list_head(data_id);
            tag.postinsert(tag_id, &req, data_id as i64, true, head, &mut tag_policy);
            data.change_in_place(data_id, tag_id as i64);

            prop_assert_eq!(
                tag.valid_lines(),
                (0..num_tags as u64).filter(|&id| tag.read_address(id) != 0).count()
            );

            check_sharing_lists(&tag, num_tags as u64)?;
        }
    });
}

fn check_sharing_lists(tag: &SparseTagArray, num_tags: u64) -> Result<(), proptest::test_runner::TestCaseError> {
    use std::collections::HashMap;

    let mut groups: HashMap<i64, Vec<u64>> = HashMap::new();
    for id in 0..num_tags {
        if tag.read_address(id) == 0 {
            continue;
        }
        let map_id = tag.read_map_id(id);
        if map_id != -1 {
            groups.entry(map_id).or_default().push(id);
        }
    }

    for (_, members) in groups {
        let heads: Vec<u64> = members.iter().copied().filter(|&id| tag.read_prev(id) == -1).collect();
        prop_assert_eq!(heads.len(), 1, "every non-empty sharing list has exactly one head");
        let head = heads[0];

        let mut visited = vec![head];
        let mut cur = tag.read_next(head);
        while cur != -1 {
            visited.push(cur as u64);
            cur = tag.read_next(cur as u64);
        }
        visited.sort_unstable();
        let mut expected = members.clone();
        expected.sort_unstable();
        prop_assert_eq!(visited, expected, "walking next from the head must reach every list member exactly once");
    }
    Ok(())
}

#[rstest::rstest]
fn fixtures_are_self_consistent(set_assoc_4x2: SetAssocConfig, zcache_16x4x8: ZCacheConfig) {
    assert_eq!(set_assoc_4x2.num_sets(), 2);
    assert_eq!(zcache_16x4x8.num_sets(), 4);
}
