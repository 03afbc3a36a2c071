//! Position mapping through document changes.

const DEL_BEFORE: u8 = 1;
const DEL_AFTER: u8 = 2;
const DEL_ACROSS: u8 = 4;
const DEL_SIDE: u8 = 8;

/// Where a position ended up after mapping, and what happened around it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapResult {
    pub pos: usize,
    del_info: u8,
}

impl MapResult {
    /// The content on the side the position was associated with is gone.
    pub fn deleted(&self) -> bool {
        self.del_info & DEL_SIDE > 0
    }

    pub fn deleted_before(&self) -> bool {
        self.del_info & (DEL_BEFORE | DEL_ACROSS) > 0
    }

    pub fn deleted_after(&self) -> bool {
        self.del_info & (DEL_AFTER | DEL_ACROSS) > 0
    }

    pub fn deleted_across(&self) -> bool {
        self.del_info & DEL_ACROSS > 0
    }
}

/// One replaced range: `old_size` positions at `start` became `new_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapRange {
    pub start: usize,
    pub old_size: usize,
    pub new_size: usize,
}

/// The position changes made by a single step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepMap {
    ranges: Vec<MapRange>,
}

impl StepMap {
    pub fn new(ranges: Vec<MapRange>) -> Self {
        let ranges = ranges
            .into_iter()
            .filter(|r| r.old_size != 0 || r.new_size != 0)
            .collect();
        Self { ranges }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(start: usize, old_size: usize, new_size: usize) -> Self {
        Self::new(vec![MapRange {
            start,
            old_size,
            new_size,
        }])
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn ranges(&self) -> &[MapRange] {
        &self.ranges
    }

    pub fn map(&self, pos: usize, assoc: i8) -> usize {
        self.map_result(pos, assoc).pos
    }

    /// Map a position. `assoc` decides which side an insertion at exactly
    /// this position ends up on: negative keeps it before, positive after.
    pub fn map_result(&self, pos: usize, assoc: i8) -> MapResult {
        let mut diff: isize = 0;
        for range in &self.ranges {
            let start = range.start;
            if start > pos {
                break;
            }
            let end = start + range.old_size;
            if pos <= end {
                let side = if range.old_size == 0 {
                    assoc
                } else if pos == start {
                    -1
                } else if pos == end {
                    1
                } else {
                    assoc
                };
                let base = start as isize + diff;
                let result = if side < 0 { base } else { base + range.new_size as isize };

                // A pure insertion deletes nothing around the position.
                let mut del_info = if range.old_size == 0 {
                    0
                } else if pos == start {
                    DEL_AFTER
                } else if pos == end {
                    DEL_BEFORE
                } else {
                    DEL_ACROSS
                };
                if range.old_size > 0 && (if assoc < 0 { pos != start } else { pos != end }) {
                    del_info |= DEL_SIDE;
                }
                return MapResult {
                    pos: result.max(0) as usize,
                    del_info,
                };
            }
            diff += range.new_size as isize - range.old_size as isize;
        }
        MapResult {
            pos: (pos as isize + diff).max(0) as usize,
            del_info: 0,
        }
    }

    /// The map that undoes this one.
    pub fn invert(&self) -> StepMap {
        let mut diff: isize = 0;
        let mut ranges = Vec::with_capacity(self.ranges.len());
        for range in &self.ranges {
            ranges.push(MapRange {
                start: (range.start as isize + diff).max(0) as usize,
                old_size: range.new_size,
                new_size: range.old_size,
            });
            diff += range.new_size as isize - range.old_size as isize;
        }
        StepMap { ranges }
    }
}

/// A pipeline of step maps, applied in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping {
    maps: Vec<StepMap>,
}

impl Mapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_maps(maps: Vec<StepMap>) -> Self {
        Self { maps }
    }

    pub fn maps(&self) -> &[StepMap] {
        &self.maps
    }

    pub fn push(&mut self, map: StepMap) {
        self.maps.push(map);
    }

    pub fn append(&mut self, other: &Mapping) {
        self.maps.extend(other.maps.iter().cloned());
    }

    pub fn is_identity(&self) -> bool {
        self.maps.iter().all(StepMap::is_empty)
    }

    pub fn invert(&self) -> Mapping {
        Mapping {
            maps: self.maps.iter().rev().map(StepMap::invert).collect(),
        }
    }

    pub fn map(&self, pos: usize, assoc: i8) -> usize {
        self.maps.iter().fold(pos, |pos, map| map.map(pos, assoc))
    }

    pub fn map_result(&self, pos: usize, assoc: i8) -> MapResult {
        let mut del_info = 0;
        let mut pos = pos;
        for map in &self.maps {
            let result = map.map_result(pos, assoc);
            del_info |= result.del_info;
            pos = result.pos;
        }
        MapResult { pos, del_info }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_assoc() {
        let map = StepMap::single(5, 0, 3);
        assert_eq!(map.map(5, -1), 5);
        assert_eq!(map.map(5, 1), 8);
        assert_eq!(map.map(2, 1), 2);
        assert_eq!(map.map(7, 1), 10);
        assert!(!map.map_result(5, 1).deleted_after());
    }

    #[test]
    fn test_deletion_flags() {
        let map = StepMap::single(2, 4, 0);
        let inside = map.map_result(4, 1);
        assert_eq!(inside.pos, 2);
        assert!(inside.deleted_across());
        assert!(inside.deleted());

        let at_start = map.map_result(2, 1);
        assert!(at_start.deleted_after());
        assert!(!at_start.deleted_before());

        let at_end = map.map_result(6, 1);
        assert_eq!(at_end.pos, 2);
        assert!(at_end.deleted_before());
        assert!(!at_end.deleted_after());
        assert_eq!(map.map(9, 1), 5);
    }

    #[test]
    fn test_invert_round_trip() {
        let map = StepMap::new(vec![
            MapRange { start: 1, old_size: 2, new_size: 5 },
            MapRange { start: 10, old_size: 3, new_size: 0 },
        ]);
        let inverted = map.invert();
        for pos in [0, 8, 14, 20] {
            let forward = map.map(pos, 1);
            assert_eq!(inverted.map(forward, 1), pos, "pos {pos}");
        }
    }

    #[test]
    fn test_mapping_accumulates_deletions() {
        let mut mapping = Mapping::new();
        mapping.push(StepMap::single(0, 0, 2));
        mapping.push(StepMap::single(3, 4, 0));
        let result = mapping.map_result(4, 1);
        assert_eq!(result.pos, 3);
        assert!(result.deleted_across());
    }
}
