//! The locked interior of the negative cache: a canonically ordered
//! zone index, per-zone denial indices, and the global LRU with its
//! byte budget.
//!
//! Both indices keep *interior* placeholder nodes for every strict
//! ancestor of an in-use entry, so insert and delete stay logarithmic
//! and parent links always resolve. Interior nodes are not in use, are
//! never on the LRU, and disappear as soon as their use-count drops to
//! zero. Ownership lives in the ordered maps plus two slabs; parent and
//! LRU links are plain arena indices, which sidesteps the ownership
//! cycle a pointer-based tree would create.

use crate::nsec3::Nsec3Params;
use slab::Slab;
use std::collections::BTreeMap;
use std::mem;
use tracing::{debug, trace};
use umbra_proto::{Name, RecordClass};

/// Key of the zone index: canonical name first, class as tie-break.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct ZoneKey {
    /// Canonical (lowercased) zone name.
    pub name: Name,
    /// Record class.
    pub class: RecordClass,
}

impl ZoneKey {
    pub(crate) fn new(class: RecordClass, name: &Name) -> Self {
        Self {
            name: name.lowercased(),
            class,
        }
    }
}

/// A zone tracked by the negative cache.
#[derive(Debug)]
pub(crate) struct ZoneNode {
    /// Canonical zone name.
    pub name: Name,
    /// Record class.
    pub class: RecordClass,
    /// Nearest strict ancestor zone in the index.
    pub parent: Option<usize>,
    /// In-use zones in this subtree, including this one.
    pub count: usize,
    /// True when at least one denial in this zone is in use.
    pub in_use: bool,
    /// NSEC3 parameters, or `None` for a plain-NSEC zone.
    pub nsec3: Option<Nsec3Params>,
    /// Ordered index of denial owner names in this zone.
    pub denials: BTreeMap<Name, usize>,
}

/// A denial owner name tracked inside one zone.
#[derive(Debug)]
pub(crate) struct DenialNode {
    /// Canonical owner name of the NSEC/NSEC3 record.
    pub name: Name,
    /// The zone this denial belongs to.
    pub zone: usize,
    /// Nearest strict ancestor denial within the same zone.
    pub parent: Option<usize>,
    /// In-use denials in this subtree, including this one.
    pub count: usize,
    /// True when the RRset cache may hold a record for this owner.
    pub in_use: bool,
    /// True when the owner is an NSEC3 hashed name.
    pub nsec3_hashed: bool,
    /// More recently used neighbor.
    pub lru_prev: Option<usize>,
    /// Less recently used neighbor.
    pub lru_next: Option<usize>,
}

/// Fixed accounting overhead of a zone entry.
fn zone_overhead(name: &Name, salt_len: usize) -> usize {
    mem::size_of::<ZoneNode>() + name.wire_len() + salt_len
}

/// Fixed accounting overhead of a denial entry.
fn denial_overhead(name: &Name) -> usize {
    mem::size_of::<DenialNode>() + name.wire_len()
}

/// The state behind the big lock.
pub(crate) struct Store {
    /// Zone arena.
    zones: Slab<ZoneNode>,
    /// Denial arena.
    denials: Slab<DenialNode>,
    /// Ordered zone index over the arena.
    zone_index: BTreeMap<ZoneKey, usize>,
    /// Most recently used denial.
    lru_head: Option<usize>,
    /// Least recently used denial.
    lru_tail: Option<usize>,
    /// Bytes currently accounted.
    used: usize,
    /// Byte budget.
    cap: usize,
}

impl Store {
    pub(crate) fn new(cap: usize) -> Self {
        Self {
            zones: Slab::new(),
            denials: Slab::new(),
            zone_index: BTreeMap::new(),
            lru_head: None,
            lru_tail: None,
            used: 0,
            cap,
        }
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub(crate) fn memory_in_use(&self) -> usize {
        self.used
    }

    /// Number of in-use denials (equals the LRU length).
    pub(crate) fn denial_count(&self) -> usize {
        self.denials.iter().filter(|(_, d)| d.in_use).count()
    }

    /// Number of zones tracked, interior placeholders included.
    #[cfg(test)]
    fn zone_count(&self) -> usize {
        self.zone_index.len()
    }

    pub(crate) fn zone(&self, id: usize) -> &ZoneNode {
        &self.zones[id]
    }

    // =========================================================================
    // Zone index
    // =========================================================================

    /// Exact zone lookup.
    pub(crate) fn find_zone(&self, class: RecordClass, name: &Name) -> Option<usize> {
        self.zone_index.get(&ZoneKey::new(class, name)).copied()
    }

    /// Deepest in-use zone that is `name` or an ancestor of it.
    pub(crate) fn closest_zone(&self, class: RecordClass, name: &Name) -> Option<usize> {
        for labels in (1..=name.label_count()).rev() {
            let ancestor = name.ancestor(labels)?;
            if let Some(&id) = self.zone_index.get(&ZoneKey::new(class, &ancestor)) {
                if self.zones[id].in_use {
                    return Some(id);
                }
            }
        }
        None
    }

    /// Finds or creates a zone, materializing interior ancestors.
    ///
    /// When the zone already exists and `params` carries NSEC3
    /// parameters differing from the stored ones, the zone's denials
    /// are purged first when `harden` is set; either way the new
    /// parameters replace the old.
    pub(crate) fn ensure_zone(
        &mut self,
        class: RecordClass,
        name: &Name,
        params: Option<Nsec3Params>,
        harden: bool,
    ) -> usize {
        let key = ZoneKey::new(class, name);

        if let Some(&id) = self.zone_index.get(&key) {
            let Some(new_params) = params else { return id };
            if self.zones[id].nsec3.as_ref() == Some(&new_params) {
                return id;
            }
            if self.zones[id].nsec3.is_some() && harden {
                debug!(zone = %key.name, "NSEC3 parameters changed, purging denials");
                // Purging can collapse the zone (and its interior
                // ancestors) entirely; re-resolve before updating.
                self.purge_zone_denials(id);
                if let Some(&survivor) = self.zone_index.get(&key) {
                    self.replace_zone_params(survivor, new_params);
                    return survivor;
                }
                // The zone collapsed: fall through and recreate it
                // with the new parameters.
                return self.ensure_zone(class, name, Some(new_params), harden);
            }
            self.replace_zone_params(id, new_params);
            return id;
        }

        // Find the nearest existing ancestor, remembering the names we
        // must materialize on the way down.
        let mut missing: Vec<Name> = Vec::new();
        let mut parent: Option<usize> = None;
        for labels in (1..key.name.label_count()).rev() {
            let ancestor = key.name.ancestor(labels).expect("label count in range");
            if let Some(&id) = self.zone_index.get(&ZoneKey::new(class, &ancestor)) {
                parent = Some(id);
                break;
            }
            missing.push(ancestor);
        }

        // Create interior ancestors top-down so parent links resolve.
        for ancestor in missing.into_iter().rev() {
            parent = Some(self.create_zone(class, ancestor, parent, None));
        }

        let id = self.create_zone(class, key.name, parent, params);
        trace!(zone = %self.zones[id].name, "zone created");
        id
    }

    /// Swaps a zone's NSEC3 parameters, keeping the salt accounted.
    fn replace_zone_params(&mut self, id: usize, params: Nsec3Params) {
        let old_salt = self.zones[id].nsec3.as_ref().map_or(0, |p| p.salt.len());
        self.used += params.salt.len();
        self.used -= old_salt;
        self.zones[id].nsec3 = Some(params);
    }

    fn create_zone(
        &mut self,
        class: RecordClass,
        name: Name,
        parent: Option<usize>,
        nsec3: Option<Nsec3Params>,
    ) -> usize {
        self.used += zone_overhead(&name, nsec3.as_ref().map_or(0, |p| p.salt.len()));
        let key = ZoneKey {
            name: name.clone(),
            class,
        };
        let id = self.zones.insert(ZoneNode {
            name,
            class,
            parent,
            count: 0,
            in_use: false,
            nsec3,
            denials: BTreeMap::new(),
        });
        self.zone_index.insert(key, id);
        id
    }

    /// Removes a zone that ended up holding nothing, walking up
    /// through equally empty interior ancestors.
    ///
    /// Ingest materializes a zone before it knows whether any record
    /// of the reply survives its checks; this undoes a fruitless
    /// materialization so zero-count entries do not linger.
    pub(crate) fn drop_zone_if_empty(&mut self, class: RecordClass, name: &Name) {
        let Some(id) = self.find_zone(class, name) else {
            return;
        };
        let mut cur = Some(id);
        while let Some(i) = cur {
            if self.zones[i].count != 0 || !self.zones[i].denials.is_empty() {
                break;
            }
            let parent = self.zones[i].parent;
            let key = ZoneKey {
                name: self.zones[i].name.clone(),
                class: self.zones[i].class,
            };
            let salt_len = self.zones[i].nsec3.as_ref().map_or(0, |p| p.salt.len());
            self.used -= zone_overhead(&key.name, salt_len);
            self.zone_index.remove(&key);
            self.zones.remove(i);
            cur = parent;
        }
    }

    /// Drops every denial of a zone, in use or interior.
    pub(crate) fn purge_zone_denials(&mut self, zone_id: usize) {
        let ids: Vec<usize> = self.zones[zone_id].denials.values().copied().collect();
        for id in ids {
            if self.denials[id].in_use {
                self.lru_unlink(id);
            }
            self.used -= denial_overhead(&self.denials[id].name);
            self.denials.remove(id);
        }
        self.zones[zone_id].denials.clear();
        if self.zones[zone_id].in_use {
            self.zone_became_unused(zone_id);
        }
    }

    // =========================================================================
    // Denial index
    // =========================================================================

    /// Inserts (or revives) a denial owner in a zone and moves it to
    /// the front of the LRU, evicting over-budget entries afterwards.
    pub(crate) fn insert_denial(&mut self, zone_id: usize, owner: &Name, nsec3_hashed: bool) {
        let owner = owner.lowercased();

        if let Some(&id) = self.zones[zone_id].denials.get(&owner) {
            if self.denials[id].in_use {
                self.touch(id);
            } else {
                self.denials[id].in_use = true;
                self.bump_counts(id);
                self.lru_push_front(id);
                if !self.zones[zone_id].in_use {
                    self.zone_became_used(zone_id);
                }
            }
            self.evict_over_cap();
            return;
        }

        // Materialize interior ancestors between the owner and the
        // zone apex, nearest existing one first.
        let apex_labels = self.zones[zone_id].name.label_count();
        let mut missing: Vec<Name> = Vec::new();
        let mut parent: Option<usize> = None;
        for labels in (apex_labels..owner.label_count()).rev() {
            let ancestor = owner.ancestor(labels).expect("label count in range");
            if let Some(&id) = self.zones[zone_id].denials.get(&ancestor) {
                parent = Some(id);
                break;
            }
            missing.push(ancestor);
        }
        for ancestor in missing.into_iter().rev() {
            parent = Some(self.create_denial(zone_id, ancestor, parent, nsec3_hashed));
        }

        let id = self.create_denial(zone_id, owner, parent, nsec3_hashed);
        self.denials[id].in_use = true;
        self.bump_counts(id);
        self.lru_push_front(id);
        if !self.zones[zone_id].in_use {
            self.zone_became_used(zone_id);
        }
        trace!(owner = %self.denials[id].name, zone = %self.zones[zone_id].name, "denial cached");
        self.evict_over_cap();
    }

    fn create_denial(
        &mut self,
        zone_id: usize,
        name: Name,
        parent: Option<usize>,
        nsec3_hashed: bool,
    ) -> usize {
        self.used += denial_overhead(&name);
        let id = self.denials.insert(DenialNode {
            name: name.clone(),
            zone: zone_id,
            parent,
            count: 0,
            in_use: false,
            nsec3_hashed,
            lru_prev: None,
            lru_next: None,
        });
        self.zones[zone_id].denials.insert(name, id);
        id
    }

    /// Increments use-counts from a node up its parent chain.
    fn bump_counts(&mut self, id: usize) {
        let mut cur = Some(id);
        while let Some(i) = cur {
            self.denials[i].count += 1;
            cur = self.denials[i].parent;
        }
    }

    /// Largest in-use owner `<= target` in a zone, if any.
    pub(crate) fn covering_denial(&self, zone_id: usize, target: &Name) -> Option<&DenialNode> {
        self.zones[zone_id]
            .denials
            .range(..=target.lowercased())
            .rev()
            .map(|(_, &id)| &self.denials[id])
            .find(|node| node.in_use)
    }

    /// Canonically largest in-use denial of a zone, if any.
    ///
    /// The NSEC3 hash space is circular: a target hashing before every
    /// cached owner may still be covered by the chain's last record.
    pub(crate) fn last_denial(&self, zone_id: usize) -> Option<&DenialNode> {
        self.zones[zone_id]
            .denials
            .iter()
            .rev()
            .map(|(_, &id)| &self.denials[id])
            .find(|node| node.in_use)
    }

    /// The in-use denial for exactly this owner, if present.
    pub(crate) fn exact_denial(&self, zone_id: usize, owner: &Name) -> Option<&DenialNode> {
        self.zones[zone_id]
            .denials
            .get(&owner.lowercased())
            .map(|&id| &self.denials[id])
            .filter(|node| node.in_use)
    }

    /// Takes a denial out of use and collapses the freed part of the
    /// parent chain; empties and removes the zone when it was the last.
    pub(crate) fn remove_denial(&mut self, id: usize) {
        if !self.denials[id].in_use {
            return;
        }
        let zone_id = self.denials[id].zone;
        self.denials[id].in_use = false;
        self.lru_unlink(id);

        let mut cur = Some(id);
        while let Some(i) = cur {
            self.denials[i].count -= 1;
            let parent = self.denials[i].parent;
            if self.denials[i].count == 0 {
                let name = self.denials[i].name.clone();
                self.used -= denial_overhead(&name);
                self.zones[zone_id].denials.remove(&name);
                self.denials.remove(i);
            }
            cur = parent;
        }

        if self.zones[zone_id].denials.is_empty() {
            self.zone_became_unused(zone_id);
        }
    }

    /// Removes a denial addressed by zone key and owner name.
    ///
    /// Synthesis re-resolves by name after dropping and re-taking the
    /// lock; arena ids are not stable across that window.
    pub(crate) fn remove_denial_by_name(
        &mut self,
        class: RecordClass,
        zone_name: &Name,
        owner: &Name,
    ) -> bool {
        let Some(zone_id) = self.find_zone(class, zone_name) else {
            return false;
        };
        let Some(&id) = self.zones[zone_id].denials.get(&owner.lowercased()) else {
            return false;
        };
        if !self.denials[id].in_use {
            return false;
        }
        debug!(owner = %owner, zone = %zone_name, "dropping denial");
        self.remove_denial(id);
        true
    }

    /// Moves a denial addressed by name to the LRU front.
    pub(crate) fn touch_by_name(&mut self, class: RecordClass, zone_name: &Name, owner: &Name) {
        if let Some(zone_id) = self.find_zone(class, zone_name) {
            if let Some(&id) = self.zones[zone_id].denials.get(&owner.lowercased()) {
                if self.denials[id].in_use {
                    self.touch(id);
                }
            }
        }
    }

    fn zone_became_used(&mut self, zone_id: usize) {
        self.zones[zone_id].in_use = true;
        let mut cur = Some(zone_id);
        while let Some(i) = cur {
            self.zones[i].count += 1;
            cur = self.zones[i].parent;
        }
    }

    fn zone_became_unused(&mut self, zone_id: usize) {
        self.zones[zone_id].in_use = false;
        let mut cur = Some(zone_id);
        while let Some(i) = cur {
            self.zones[i].count -= 1;
            let parent = self.zones[i].parent;
            if self.zones[i].count == 0 {
                let key = ZoneKey {
                    name: self.zones[i].name.clone(),
                    class: self.zones[i].class,
                };
                let salt_len = self.zones[i].nsec3.as_ref().map_or(0, |p| p.salt.len());
                self.used -= zone_overhead(&key.name, salt_len);
                self.zone_index.remove(&key);
                self.zones.remove(i);
            }
            cur = parent;
        }
    }

    // =========================================================================
    // LRU governor
    // =========================================================================

    /// Moves an in-use denial to the front of the LRU.
    pub(crate) fn touch(&mut self, id: usize) {
        self.lru_unlink(id);
        self.lru_push_front(id);
    }

    fn lru_push_front(&mut self, id: usize) {
        self.denials[id].lru_prev = None;
        self.denials[id].lru_next = self.lru_head;
        if let Some(head) = self.lru_head {
            self.denials[head].lru_prev = Some(id);
        }
        self.lru_head = Some(id);
        if self.lru_tail.is_none() {
            self.lru_tail = Some(id);
        }
    }

    fn lru_unlink(&mut self, id: usize) {
        let prev = self.denials[id].lru_prev;
        let next = self.denials[id].lru_next;
        match prev {
            Some(p) => self.denials[p].lru_next = next,
            None if self.lru_head == Some(id) => self.lru_head = next,
            None => return, // not linked
        }
        match next {
            Some(n) => self.denials[n].lru_prev = prev,
            None => self.lru_tail = prev,
        }
        self.denials[id].lru_prev = None;
        self.denials[id].lru_next = None;
    }

    /// Strict LRU eviction: drop least recently used denials until the
    /// byte budget is met again.
    pub(crate) fn evict_over_cap(&mut self) {
        while self.used > self.cap {
            let Some(tail) = self.lru_tail else {
                break;
            };
            trace!(owner = %self.denials[tail].name, "evicting least recently used denial");
            self.remove_denial(tail);
        }
    }

    /// LRU length, counted by walking the list.
    #[cfg(test)]
    fn lru_len(&self) -> usize {
        let mut n = 0;
        let mut cur = self.lru_head;
        while let Some(i) = cur {
            n += 1;
            cur = self.denials[i].lru_next;
        }
        n
    }

    /// Owner names from most to least recently used.
    #[cfg(test)]
    fn lru_owners(&self) -> Vec<Name> {
        let mut out = Vec::new();
        let mut cur = self.lru_head;
        while let Some(i) = cur {
            out.push(self.denials[i].name.clone());
            cur = self.denials[i].lru_next;
        }
        out
    }

    // =========================================================================
    // Consistency checking (test support)
    // =========================================================================

    /// Verifies every structural invariant; panics with a description
    /// on the first violation.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let mut expected_used = 0;

        for (_, zone) in self.zones.iter() {
            expected_used +=
                zone_overhead(&zone.name, zone.nsec3.as_ref().map_or(0, |p| p.salt.len()));

            // Ordered index sorted canonically by construction of
            // BTreeMap; verify the keys resolve and ancestors exist.
            let mut in_use_denials = 0;
            for (name, &id) in &zone.denials {
                let node = &self.denials[id];
                assert_eq!(&node.name, name, "index key mismatch");
                assert!(node.count > 0, "zero-count node {name} still present");
                if node.in_use {
                    in_use_denials += 1;
                }
                // Interior coverage: every strict ancestor at or below
                // the apex is present.
                let mut ancestor = name.clone();
                while let Some(parent) = ancestor.parent() {
                    if parent.label_count() < zone.name.label_count() {
                        break;
                    }
                    assert!(
                        zone.denials.contains_key(&parent),
                        "missing interior ancestor {parent} of {name}"
                    );
                    ancestor = parent;
                }
            }
            assert_eq!(
                zone.in_use,
                in_use_denials > 0,
                "zone {} in_use flag wrong",
                zone.name
            );
        }

        // Use-count correctness for denials.
        for (id, node) in self.denials.iter() {
            expected_used += denial_overhead(&node.name);
            let mut subtree = usize::from(node.in_use);
            for (_, other) in self.denials.iter() {
                if other.in_use && self.is_denial_ancestor(id, other) {
                    subtree += 1;
                }
            }
            assert_eq!(node.count, subtree, "use-count wrong at {}", node.name);
        }

        // Zone use-counts.
        for (id, zone) in self.zones.iter() {
            let mut subtree = usize::from(zone.in_use);
            for (_, other) in self.zones.iter() {
                if other.in_use && self.is_zone_ancestor(id, other) {
                    subtree += 1;
                }
            }
            assert_eq!(zone.count, subtree, "zone use-count wrong at {}", zone.name);
            if zone.count == 0 {
                // Materialized but never used; must be truly empty.
                assert!(
                    !zone.in_use && zone.denials.is_empty(),
                    "zero-count zone {} holds state",
                    zone.name
                );
            }
        }

        // LRU membership: exactly the in-use denials.
        let lru: Vec<usize> = {
            let mut v = Vec::new();
            let mut cur = self.lru_head;
            while let Some(i) = cur {
                v.push(i);
                cur = self.denials[i].lru_next;
            }
            v
        };
        assert_eq!(lru.len(), self.denial_count(), "LRU length mismatch");
        for &i in &lru {
            assert!(self.denials[i].in_use, "interior node on LRU");
        }

        // Byte accounting.
        assert_eq!(self.used, expected_used, "byte counter out of sync");
        assert!(self.used <= self.cap || self.lru_tail.is_none());
    }

    #[cfg(test)]
    fn is_denial_ancestor(&self, ancestor: usize, node: &DenialNode) -> bool {
        let mut cur = node.parent;
        while let Some(i) = cur {
            if i == ancestor {
                return true;
            }
            cur = self.denials[i].parent;
        }
        false
    }

    #[cfg(test)]
    fn is_zone_ancestor(&self, ancestor: usize, node: &ZoneNode) -> bool {
        let mut cur = node.parent;
        while let Some(i) = cur {
            if i == ancestor {
                return true;
            }
            cur = self.zones[i].parent;
        }
        false
    }
}
