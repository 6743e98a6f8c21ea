use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, warn};
use parking_lot::RwLock;

use super::table::{TableHeader, TABLE_HEADER_SIZE};
use super::{ColorBits, ColorRegistry, ColorSetId};
use crate::error::{ColorSetError, ConfigError, TableError};
use crate::Result;

/// Lookup table guarded by the store lock
#[derive(Default)]
struct Inner {
    /// Stored sets in id order
    sets: Vec<Arc<ColorBits>>,

    /// Content hash to every id with that hash
    lookup: AHashMap<u64, Vec<u32>>,

    /// Resolved `add_color` joins, exact or superset, keyed by `(id, color)`
    joins: AHashMap<(u32, u32), u32>,
}

impl Inner {
    fn lookup_id(&self, hash: u64, bits: &ColorBits) -> Option<ColorSetId> {
        self.lookup
            .get(&hash)?
            .iter()
            .copied()
            .find(|&id| *self.sets[id as usize] == *bits)
            .map(ColorSetId)
    }

    fn insert(&mut self, hash: u64, bits: Arc<ColorBits>) -> Result<ColorSetId> {
        let id = u32::try_from(self.sets.len())
            .map_err(|_| ColorSetError::Saturated(self.sets.len()))?;
        self.sets.push(bits);
        self.lookup.entry(hash).or_default().push(id);
        Ok(ColorSetId(id))
    }

    fn minimal_superset(&self, bits: &ColorBits) -> Option<ColorSetId> {
        // ties go to the lowest id
        self.sets
            .iter()
            .enumerate()
            .filter(|(_, set)| bits.is_subset_of(set))
            .min_by_key(|(_, set)| set.count_ones())
            .map(|(id, _)| ColorSetId(id as u32))
    }
}

#[derive(Default)]
struct Counters {
    primary_shortcut: AtomicUsize,
    already_present: AtomicUsize,
    found_existing: AtomicUsize,
    created: AtomicUsize,
    imaginary: AtomicUsize,
    cached_join: AtomicUsize,
}

/// Snapshot of the lookup paths taken by a [`ColorSetStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    /// `add_color` calls on the empty set answered with a primary id
    pub primary_shortcut: usize,
    /// `add_color` calls whose color was already in the set
    pub already_present: usize,
    /// Requests answered by an existing set found through the hash table
    pub found_existing: usize,
    /// Requests that stored a new set
    pub created: usize,
    /// `add_color` calls answered by a superset after saturation
    pub imaginary: usize,
    /// `add_color` calls answered from the join cache
    pub cached_join: usize,
}

/// Largest color universe whose pre-seeded sets fit the `u32` id space
pub const MAX_UNIVERSE_SIZE: usize = u32::MAX as usize - 1;

/// Concurrent, deduplicating registry of color sets
///
/// Every store starts out with the empty set at id 0 and the primary set `{c}` at id `c + 1`
/// for every color of the universe. Further sets are appended on demand and never removed,
/// so an id keeps naming the same content for the lifetime of the store.
///
/// All operations take `&self`; share the store between producer threads with an `Arc` or
/// a scoped borrow. A single reader-writer lock guards the table. Lookups search under the
/// read lock first, and inserts search again under the write lock so that two threads never
/// create two ids for the same content. Every join resolved by [`add_color`](Self::add_color)
/// is cached per `(id, color)`, so repeated joins are answered under the read lock.
pub struct ColorSetStore {
    universe_size: usize,
    max_color_count: Option<usize>,
    inner: RwLock<Inner>,
    counters: Counters,
    saturation_logged: AtomicBool,
}

impl ColorSetStore {
    /// Creates an unbounded store over `universe_size` colors
    pub fn new(universe_size: usize) -> Result<Self> {
        Self::build(universe_size, None)
    }

    /// Creates a store holding at most `max_color_count` sets
    ///
    /// Once full, [`get_or_create`](Self::get_or_create) fails with
    /// [`ColorSetError::Saturated`] for new content, while [`add_color`](Self::add_color)
    /// falls back to the smallest stored superset.
    pub fn with_max_color_count(universe_size: usize, max_color_count: usize) -> Result<Self> {
        check_universe_size(universe_size)?;
        if max_color_count < universe_size + 1 {
            return Err(ConfigError::MaxColorCountTooSmall {
                max: max_color_count,
                required: universe_size + 1,
            }
            .into());
        }
        Self::build(universe_size, Some(max_color_count))
    }

    fn build(universe_size: usize, max_color_count: Option<usize>) -> Result<Self> {
        check_universe_size(universe_size)?;
        let mut inner = Inner::default();
        let empty = ColorBits::new(universe_size);
        inner.insert(empty.content_hash(), Arc::new(empty))?;
        for color in 0..universe_size {
            let primary = ColorBits::from_colors(universe_size, &[color])?;
            inner.insert(primary.content_hash(), Arc::new(primary))?;
        }
        debug!(
            "Color set store created with {universe_size} colors (max: {max_color_count:?})"
        );
        Ok(Self {
            universe_size,
            max_color_count,
            inner: RwLock::new(inner),
            counters: Counters::default(),
            saturation_logged: AtomicBool::new(false),
        })
    }

    #[must_use]
    pub fn universe_size(&self) -> usize {
        self.universe_size
    }

    #[must_use]
    pub fn max_color_count(&self) -> Option<usize> {
        self.max_color_count
    }

    /// Number of stored color sets, including the pre-seeded ones
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().sets.len()
    }

    /// Always false: the empty set is stored from the start
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().sets.is_empty()
    }

    /// Checks if no further sets can be stored
    #[must_use]
    pub fn is_saturated(&self) -> bool {
        self.max_color_count
            .is_some_and(|max| self.inner.read().sets.len() >= max)
    }

    fn check_color(&self, color: usize) -> Result<()> {
        if color >= self.universe_size {
            return Err(ColorSetError::ColorOutOfRange {
                color,
                universe_size: self.universe_size,
            }
            .into());
        }
        Ok(())
    }

    fn check_width(&self, bits: &ColorBits) -> Result<()> {
        if bits.len() != self.universe_size {
            return Err(ColorSetError::WidthMismatch {
                expected: self.universe_size,
                got: bits.len(),
            }
            .into());
        }
        Ok(())
    }

    fn is_full(&self, inner: &Inner) -> bool {
        self.max_color_count
            .is_some_and(|max| inner.sets.len() >= max)
    }

    /// Read-only view of the set named by `id`
    pub fn get(&self, id: ColorSetId) -> Result<Arc<ColorBits>> {
        self.inner
            .read()
            .sets
            .get(id.index())
            .cloned()
            .ok_or_else(|| ColorSetError::UnknownId(id.0).into())
    }

    /// Looks up the id of `bits` without storing it
    pub fn find(&self, bits: &ColorBits) -> Result<Option<ColorSetId>> {
        self.check_width(bits)?;
        Ok(self.inner.read().lookup_id(bits.content_hash(), bits))
    }

    /// Returns the id of `bits`, storing a copy if the content is new
    pub fn get_or_create(&self, bits: &ColorBits) -> Result<ColorSetId> {
        self.check_width(bits)?;
        let hash = bits.content_hash();
        if let Some(id) = self.inner.read().lookup_id(hash, bits) {
            self.counters.found_existing.fetch_add(1, Ordering::Relaxed);
            return Ok(id);
        }

        let stored = Arc::new(bits.clone());
        let mut inner = self.inner.write();
        if let Some(id) = inner.lookup_id(hash, bits) {
            self.counters.found_existing.fetch_add(1, Ordering::Relaxed);
            return Ok(id);
        }
        if self.is_full(&inner) {
            return Err(ColorSetError::Saturated(inner.sets.len()).into());
        }
        let id = inner.insert(hash, stored)?;
        self.counters.created.fetch_add(1, Ordering::Relaxed);
        Ok(id)
    }

    /// Returns the id of the set named by `id` with `color` added
    ///
    /// The set behind `id` is never modified. If `color` is already a member, `id` itself is
    /// returned. On a saturated store the result may name a strict superset of the union.
    pub fn add_color(&self, id: ColorSetId, color: usize) -> Result<ColorSetId> {
        self.check_color(color)?;
        if id == ColorSetId::EMPTY {
            self.counters
                .primary_shortcut
                .fetch_add(1, Ordering::Relaxed);
            return Ok(ColorSetId::primary(color));
        }

        let key = (id.0, color as u32);
        let current = {
            let inner = self.inner.read();
            let current = inner
                .sets
                .get(id.index())
                .cloned()
                .ok_or(ColorSetError::UnknownId(id.0))?;
            if current.contains(color) {
                self.counters.already_present.fetch_add(1, Ordering::Relaxed);
                return Ok(id);
            }
            if let Some(&target) = inner.joins.get(&key) {
                self.counters.cached_join.fetch_add(1, Ordering::Relaxed);
                return Ok(ColorSetId(target));
            }
            current
        };

        let target = Arc::new(current.with_color(color)?);
        let hash = target.content_hash();
        let mut inner = self.inner.write();
        if let Some(&cached) = inner.joins.get(&key) {
            self.counters.cached_join.fetch_add(1, Ordering::Relaxed);
            return Ok(ColorSetId(cached));
        }
        let resolved = if let Some(found) = inner.lookup_id(hash, &target) {
            self.counters.found_existing.fetch_add(1, Ordering::Relaxed);
            found
        } else if !self.is_full(&inner) {
            let created = inner.insert(hash, target)?;
            self.counters.created.fetch_add(1, Ordering::Relaxed);
            created
        } else {
            if !self.saturation_logged.swap(true, Ordering::Relaxed) {
                warn!(
                    "Color set store saturated at {} sets, resolving new sets to supersets",
                    inner.sets.len()
                );
            }
            let superset = inner
                .minimal_superset(&target)
                .ok_or(ColorSetError::NoSuperset)?;
            self.counters.imaginary.fetch_add(1, Ordering::Relaxed);
            superset
        };
        inner.joins.insert(key, resolved.0);
        Ok(resolved)
    }

    /// Resolves and caches the join of every stored set with every color
    ///
    /// The store must be saturated, so that no later insert can change a resolution. After
    /// this, every [`add_color`](Self::add_color) call is answered under the read lock. Joins
    /// without any stored superset stay unresolved. Returns the number of joins cached.
    pub fn precompute_joins(&self) -> Result<usize> {
        let mut inner = self.inner.write();
        if !self.is_full(&inner) {
            return Err(ColorSetError::NotSaturated.into());
        }
        let mut cached = 0;
        // the empty set joins through the primary shortcut
        for id in 1..inner.sets.len() {
            let current = Arc::clone(&inner.sets[id]);
            for color in 0..self.universe_size {
                let key = (id as u32, color as u32);
                if current.contains(color) || inner.joins.contains_key(&key) {
                    continue;
                }
                let target = current.with_color(color)?;
                let resolved = inner
                    .lookup_id(target.content_hash(), &target)
                    .or_else(|| inner.minimal_superset(&target));
                if let Some(resolved) = resolved {
                    inner.joins.insert(key, resolved.0);
                    cached += 1;
                }
            }
        }
        debug!(
            "Precomputed {cached} joins over {} sets and {} colors",
            inner.sets.len(),
            self.universe_size
        );
        Ok(cached)
    }

    /// Checks that no two ids name the same content
    pub fn verify_unique(&self) -> Result<()> {
        let inner = self.inner.read();
        let mut seen = AHashMap::with_capacity(inner.sets.len());
        for (id, bits) in inner.sets.iter().enumerate() {
            if let Some(first) = seen.insert(&**bits, id as u32) {
                return Err(ColorSetError::DuplicateContent {
                    first,
                    second: id as u32,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Finds the stored set with the fewest colors that contains every color of `bits`
    ///
    /// Ties are broken by the lowest id.
    pub fn find_minimal_superset(&self, bits: &ColorBits) -> Result<Option<ColorSetId>> {
        self.check_width(bits)?;
        Ok(self.inner.read().minimal_superset(bits))
    }

    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            primary_shortcut: self.counters.primary_shortcut.load(Ordering::Relaxed),
            already_present: self.counters.already_present.load(Ordering::Relaxed),
            found_existing: self.counters.found_existing.load(Ordering::Relaxed),
            created: self.counters.created.load(Ordering::Relaxed),
            imaginary: self.counters.imaginary.load(Ordering::Relaxed),
            cached_join: self.counters.cached_join.load(Ordering::Relaxed),
        }
    }

    /// Iterates over a snapshot of all stored sets in id order
    pub fn iter(&self) -> impl Iterator<Item = (ColorSetId, Arc<ColorBits>)> {
        let sets = self.inner.read().sets.clone();
        sets.into_iter()
            .enumerate()
            .map(|(id, bits)| (ColorSetId(id as u32), bits))
    }

    /// Stores a hierarchy of unions over the primary colors
    ///
    /// Neighbouring sets are merged pairwise, level by level, until a single set holds
    /// every color; a set without a partner moves up unchanged. For `n` colors this adds
    /// `n - 1` sets, the last of which is the full set.
    pub fn init_secondary_colors_with_binary_reduction(&self) -> Result<Vec<ColorSetId>> {
        let mut level: Vec<ColorBits> = (0..self.universe_size)
            .map(|color| ColorBits::from_colors(self.universe_size, &[color]))
            .collect::<Result<_>>()?;
        let mut secondary = Vec::with_capacity(self.universe_size.saturating_sub(1));
        while level.len() > 1 {
            let mut chunks = level.chunks_exact(2);
            let mut next = Vec::with_capacity(level.len().div_ceil(2));
            for pair in &mut chunks {
                let merged = pair[0].union(&pair[1])?;
                secondary.push(merged.clone());
                next.push(merged);
            }
            next.extend(chunks.remainder().iter().cloned());
            level = next;
        }
        self.insert_secondary(secondary)
    }

    /// Stores the given sets as secondary colors
    ///
    /// Every set must have at least two colors and all sets must be distinct. With
    /// `require_all_set`, one of them must hold every color. Nothing is stored unless all
    /// sets pass validation.
    pub fn init_secondary_colors_from_bitvectors(
        &self,
        sets: &[ColorBits],
        require_all_set: bool,
    ) -> Result<Vec<ColorSetId>> {
        let mut seen = AHashSet::with_capacity(sets.len());
        for bits in sets {
            self.check_width(bits)?;
            if bits.count_ones() < 2 || !seen.insert(bits) {
                return Err(ColorSetError::InvalidSecondaryColor.into());
            }
        }
        // a single color is its own full set
        if require_all_set && self.universe_size > 1 && !sets.iter().any(ColorBits::is_all_set)
        {
            return Err(ColorSetError::InvalidSecondaryColor.into());
        }
        self.insert_secondary(sets.to_vec())
    }

    /// Stores one secondary color per group of primary colors
    pub fn init_secondary_colors_from_groups(
        &self,
        groups: &[Vec<usize>],
        require_all_set: bool,
    ) -> Result<Vec<ColorSetId>> {
        let sets = groups
            .iter()
            .map(|group| ColorBits::from_colors(self.universe_size, group))
            .collect::<Result<Vec<_>>>()?;
        self.init_secondary_colors_from_bitvectors(&sets, require_all_set)
    }

    fn insert_secondary(&self, sets: Vec<ColorBits>) -> Result<Vec<ColorSetId>> {
        let mut inner = self.inner.write();
        if inner.sets.len() != self.universe_size + 1 {
            return Err(ColorSetError::SecondaryColorsInitialized.into());
        }
        if let Some(max) = self.max_color_count {
            if inner.sets.len() + sets.len() > max {
                return Err(ColorSetError::Saturated(max).into());
            }
        }
        let mut ids = Vec::with_capacity(sets.len());
        for bits in sets {
            let id = inner.insert(bits.content_hash(), Arc::new(bits))?;
            ids.push(id);
        }
        self.counters.created.fetch_add(ids.len(), Ordering::Relaxed);
        debug!("Initialized {} secondary colors", ids.len());
        Ok(ids)
    }

    /// Writes the id to color set table
    ///
    /// Superset resolutions of a saturated store are not part of the table.
    pub fn write_table<W: Write>(&self, writer: &mut W) -> Result<()> {
        let inner = self.inner.read();
        let header = TableHeader::new(
            self.universe_size as u64,
            inner.sets.len() as u64,
            self.max_color_count.unwrap_or(0) as u64,
        );
        writer.write_all(header.as_bytes())?;
        for bits in &inner.sets {
            bits.words()
                .iter()
                .try_for_each(|&word| writer.write_u64::<LittleEndian>(word))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Reads a table written by [`write_table`](Self::write_table)
    ///
    /// Ids are preserved: the set at position `i` of the table is id `i` of the new store.
    pub fn read_table<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buffer = [0u8; TABLE_HEADER_SIZE];
        reader.read_exact(&mut buffer)?;
        let header = TableHeader::from_bytes(&buffer)?;

        let invalid = |field: &'static str, value: u64| TableError::InvalidHeader { field, value };
        let universe_size = usize::try_from(header.universe_size)
            .ok()
            .filter(|size| (1..=MAX_UNIVERSE_SIZE).contains(size))
            .ok_or(invalid("universe_size", header.universe_size))?;
        let count = usize::try_from(header.count)
            .ok()
            .filter(|&count| count <= u32::MAX as usize)
            .ok_or(invalid("count", header.count))?;
        if count < universe_size + 1 {
            return Err(TableError::MissingSeedColors.into());
        }
        let max_color_count = match usize::try_from(header.max_color_count) {
            Ok(0) => None,
            Ok(max) if max >= count => Some(max),
            _ => return Err(invalid("max_color_count", header.max_color_count).into()),
        };

        // read everything before seeding, so a lying header fails on the stream
        let words_per_set = header.words_per_set();
        let mut secondary = Vec::new();
        for id in 0..count {
            let mut words = vec![0u64; words_per_set];
            reader.read_u64_into::<LittleEndian>(&mut words)?;
            let bits = ColorBits::from_words(universe_size, words);
            if id > universe_size {
                secondary.push(bits);
            } else if !bits.iter_colors().eq(id.checked_sub(1)) {
                return Err(TableError::MissingSeedColors.into());
            }
        }

        let store = Self::build(universe_size, max_color_count)?;
        {
            let mut inner = store.inner.write();
            for bits in secondary {
                let hash = bits.content_hash();
                if let Some(existing) = inner.lookup_id(hash, &bits) {
                    return Err(TableError::DuplicateColorSet(existing.0).into());
                }
                inner.insert(hash, Arc::new(bits))?;
            }
        }
        debug!("Read color table with {count} sets over {universe_size} colors");
        Ok(store)
    }
}

fn check_universe_size(universe_size: usize) -> Result<()> {
    if universe_size == 0 {
        return Err(ConfigError::ZeroColorUniverse.into());
    }
    if universe_size > MAX_UNIVERSE_SIZE {
        return Err(ConfigError::ColorUniverseTooLarge {
            size: universe_size,
            max: MAX_UNIVERSE_SIZE,
        }
        .into());
    }
    Ok(())
}

impl ColorRegistry for ColorSetStore {
    fn universe_size(&self) -> usize {
        self.universe_size
    }

    fn len(&self) -> usize {
        ColorSetStore::len(self)
    }

    fn get_or_create(&self, bits: &ColorBits) -> Result<ColorSetId> {
        ColorSetStore::get_or_create(self, bits)
    }

    fn add_color(&self, id: ColorSetId, color: usize) -> Result<ColorSetId> {
        ColorSetStore::add_color(self, id, color)
    }

    fn get(&self, id: ColorSetId) -> Result<Arc<ColorBits>> {
        ColorSetStore::get(self, id)
    }
}
