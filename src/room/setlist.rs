use std::collections::HashMap;

use chrono::Utc;
use uuid::Uuid;

use super::models::SetlistEntry;
use crate::shared::AppError;

/// The room's ordered, duplicate-free song list. Orders are always a
/// contiguous permutation of [0..n); every mutation preserves that invariant
/// or fails without touching state.
#[derive(Debug, Clone, Default)]
pub struct Setlist {
    /// Kept sorted by `order`
    entries: Vec<SetlistEntry>,
}

impl Setlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, song_id: Uuid) -> bool {
        self.entries.iter().any(|e| e.song_id == song_id)
    }

    /// Entries in playback order
    pub fn entries(&self) -> &[SetlistEntry] {
        &self.entries
    }

    /// Appends a song at the tail (order = n). Fails on duplicates.
    pub fn add(&mut self, song_id: Uuid) -> Result<SetlistEntry, AppError> {
        if self.contains(song_id) {
            return Err(AppError::Conflict(format!(
                "song {song_id} is already in this room's setlist"
            )));
        }
        let entry = SetlistEntry {
            song_id,
            order: self.entries.len(),
            added_at: Utc::now(),
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Removes a song and compacts remaining orders back to [0..n).
    pub fn remove(&mut self, song_id: Uuid) -> Result<SetlistEntry, AppError> {
        let idx = self
            .entries
            .iter()
            .position(|e| e.song_id == song_id)
            .ok_or_else(|| {
                AppError::NotFound(format!("song {song_id} is not in this room's setlist"))
            })?;
        let removed = self.entries.remove(idx);
        for (order, entry) in self.entries.iter_mut().enumerate() {
            entry.order = order;
        }
        Ok(removed)
    }

    /// Applies a full or partial song -> order assignment map. Assigned songs
    /// take their requested slots; unaffected songs keep their relative order
    /// and fill the remaining slots ascending. Fails unless the merged result
    /// is an exact permutation of [0..n), leaving state untouched.
    pub fn reorder(
        &mut self,
        assignments: &HashMap<Uuid, usize>,
    ) -> Result<Vec<SetlistEntry>, AppError> {
        let n = self.entries.len();
        let mut slots: Vec<Option<Uuid>> = vec![None; n];

        for (&song_id, &order) in assignments {
            if !self.contains(song_id) {
                return Err(AppError::NotFound(format!(
                    "song {song_id} is not in this room's setlist"
                )));
            }
            if order >= n {
                return Err(AppError::Validation(format!(
                    "orders must form a contiguous permutation of 0..{n}: {order} is out of range"
                )));
            }
            if slots[order].is_some() {
                return Err(AppError::Validation(format!(
                    "orders must form a contiguous permutation of 0..{n}: {order} assigned twice"
                )));
            }
            slots[order] = Some(song_id);
        }

        // Fill unclaimed slots with the unassigned songs in current order
        let mut rest = self
            .entries
            .iter()
            .map(|e| e.song_id)
            .filter(|id| !assignments.contains_key(id));
        for slot in slots.iter_mut() {
            if slot.is_none() {
                *slot = rest.next();
            }
        }

        // With unique in-range assignments and the remainder poured in, every
        // slot is filled exactly once; rebuild preserving each entry's added_at.
        let by_id: HashMap<Uuid, SetlistEntry> = self
            .entries
            .iter()
            .map(|e| (e.song_id, e.clone()))
            .collect();
        let mut rebuilt = Vec::with_capacity(n);
        for (order, slot) in slots.into_iter().enumerate() {
            let entry = slot.and_then(|song_id| by_id.get(&song_id)).ok_or_else(|| {
                AppError::Internal("reorder merge left an unfilled slot".to_string())
            })?;
            let mut entry = entry.clone();
            entry.order = order;
            rebuilt.push(entry);
        }
        self.entries = rebuilt;

        Ok(self.entries.clone())
    }

    /// Appends songs from an external ordered list, skipping those already
    /// present and preserving the source's relative order. Returns the
    /// entries actually appended.
    pub fn import_from(&mut self, source: &[Uuid]) -> Vec<SetlistEntry> {
        let mut appended = Vec::new();
        for &song_id in source {
            if !self.contains(song_id) {
                let entry = SetlistEntry {
                    song_id,
                    order: self.entries.len(),
                    added_at: Utc::now(),
                };
                self.entries.push(entry.clone());
                appended.push(entry);
            }
        }
        appended
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    fn orders(setlist: &Setlist) -> Vec<usize> {
        setlist.entries().iter().map(|e| e.order).collect()
    }

    #[test]
    fn test_add_appends_at_tail() {
        let mut setlist = Setlist::new();
        let songs = ids(3);

        for (i, &song) in songs.iter().enumerate() {
            let entry = setlist.add(song).unwrap();
            assert_eq!(entry.order, i);
        }
        assert_eq!(orders(&setlist), vec![0, 1, 2]);
    }

    #[test]
    fn test_add_duplicate_is_conflict() {
        let mut setlist = Setlist::new();
        let song = Uuid::new_v4();
        setlist.add(song).unwrap();

        let err = setlist.add(song).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(setlist.len(), 1);
    }

    #[test]
    fn test_remove_compacts_orders() {
        let mut setlist = Setlist::new();
        let songs = ids(4);
        for &song in &songs {
            setlist.add(song).unwrap();
        }

        setlist.remove(songs[1]).unwrap();

        assert_eq!(setlist.len(), 3);
        assert_eq!(orders(&setlist), vec![0, 1, 2]);
        let remaining: Vec<Uuid> = setlist.entries().iter().map(|e| e.song_id).collect();
        assert_eq!(remaining, vec![songs[0], songs[2], songs[3]]);
    }

    #[test]
    fn test_remove_missing_is_not_found() {
        let mut setlist = Setlist::new();
        let err = setlist.remove(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_remove_then_add_lands_at_tail() {
        let mut setlist = Setlist::new();
        let songs = ids(3);
        for &song in &songs {
            setlist.add(song).unwrap();
        }

        setlist.remove(songs[0]).unwrap();
        let entry = setlist.add(songs[0]).unwrap();

        // The re-added song took the new tail position, not its old slot
        assert_eq!(entry.order, 2);
        let sequence: Vec<Uuid> = setlist.entries().iter().map(|e| e.song_id).collect();
        assert_eq!(sequence, vec![songs[1], songs[2], songs[0]]);
    }

    #[test]
    fn test_partial_reorder_merges_with_unaffected() {
        // items [A(0), B(1), C(2)]; reorder({A:2, C:0}) -> C(0), B(1), A(2)
        let mut setlist = Setlist::new();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        for &song in &[a, b, c] {
            setlist.add(song).unwrap();
        }

        let mut assignments = HashMap::new();
        assignments.insert(a, 2);
        assignments.insert(c, 0);
        let result = setlist.reorder(&assignments).unwrap();

        let sequence: Vec<Uuid> = result.iter().map(|e| e.song_id).collect();
        assert_eq!(sequence, vec![c, b, a]);
        assert_eq!(orders(&setlist), vec![0, 1, 2]);
    }

    #[test]
    fn test_full_reorder() {
        let mut setlist = Setlist::new();
        let songs = ids(4);
        for &song in &songs {
            setlist.add(song).unwrap();
        }

        let assignments: HashMap<Uuid, usize> = songs
            .iter()
            .enumerate()
            .map(|(i, &song)| (song, songs.len() - 1 - i))
            .collect();
        let result = setlist.reorder(&assignments).unwrap();

        let sequence: Vec<Uuid> = result.iter().map(|e| e.song_id).collect();
        let reversed: Vec<Uuid> = songs.iter().rev().copied().collect();
        assert_eq!(sequence, reversed);
    }

    #[test]
    fn test_reorder_rejects_out_of_range() {
        let mut setlist = Setlist::new();
        let songs = ids(2);
        for &song in &songs {
            setlist.add(song).unwrap();
        }

        let mut assignments = HashMap::new();
        assignments.insert(songs[0], 2);
        let err = setlist.reorder(&assignments).unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert!(err.to_string().contains("contiguous permutation"));
        // State untouched
        assert_eq!(orders(&setlist), vec![0, 1]);
    }

    #[test]
    fn test_reorder_rejects_duplicate_order() {
        let mut setlist = Setlist::new();
        let songs = ids(3);
        for &song in &songs {
            setlist.add(song).unwrap();
        }

        let mut assignments = HashMap::new();
        assignments.insert(songs[0], 1);
        assignments.insert(songs[1], 1);
        let err = setlist.reorder(&assignments).unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(
            setlist
                .entries()
                .iter()
                .map(|e| e.song_id)
                .collect::<Vec<_>>(),
            songs
        );
    }

    #[test]
    fn test_reorder_unknown_song_is_not_found() {
        let mut setlist = Setlist::new();
        setlist.add(Uuid::new_v4()).unwrap();

        let mut assignments = HashMap::new();
        assignments.insert(Uuid::new_v4(), 0);
        let err = setlist.reorder(&assignments).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_reorder_result_is_always_exact_permutation() {
        // Property across partial coverage sizes
        for assigned in 0..=5usize {
            let mut setlist = Setlist::new();
            let songs = ids(5);
            for &song in &songs {
                setlist.add(song).unwrap();
            }

            // Assign the first `assigned` songs to the last `assigned` slots
            let assignments: HashMap<Uuid, usize> = songs
                .iter()
                .take(assigned)
                .enumerate()
                .map(|(i, &song)| (song, 5 - assigned + i))
                .collect();
            setlist.reorder(&assignments).unwrap();

            let mut seen = orders(&setlist);
            seen.sort_unstable();
            assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        }
    }

    #[test]
    fn test_import_skips_duplicates_preserves_source_order() {
        let mut setlist = Setlist::new();
        let existing = Uuid::new_v4();
        setlist.add(existing).unwrap();

        let (x, y) = (Uuid::new_v4(), Uuid::new_v4());
        let appended = setlist.import_from(&[x, existing, y]);

        let appended_ids: Vec<Uuid> = appended.iter().map(|e| e.song_id).collect();
        assert_eq!(appended_ids, vec![x, y]);
        let sequence: Vec<Uuid> = setlist.entries().iter().map(|e| e.song_id).collect();
        assert_eq!(sequence, vec![existing, x, y]);
        assert_eq!(orders(&setlist), vec![0, 1, 2]);
    }

    #[test]
    fn test_import_into_empty() {
        let mut setlist = Setlist::new();
        let songs = ids(3);
        let appended = setlist.import_from(&songs);

        assert_eq!(appended.len(), 3);
        assert_eq!(orders(&setlist), vec![0, 1, 2]);
    }
}
