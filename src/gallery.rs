use crate::data::model::Dataset;
use crate::error::ChainError;
use crate::template::replay::BoundTemplate;

// ---------------------------------------------------------------------------
// Gallery state
// ---------------------------------------------------------------------------

/// Stable handle a display layer keeps for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(u64);

/// One named series in the gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryEntry {
    pub id: EntryId,
    pub name: String,
    pub dataset: Dataset,
}

/// Ordered collection of named datasets, independent of rendering.
///
/// This is the id → dataset side mapping a shell uses instead of storing
/// window references inside datasets.
#[derive(Debug, Default)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
    next_id: u64,

    /// Status / error message for the shell to show.
    pub status_message: Option<String>,
}

impl Gallery {
    /// Append a dataset under `name`.
    pub fn add(&mut self, name: impl Into<String>, dataset: Dataset) -> EntryId {
        let id = EntryId(self.next_id);
        self.next_id += 1;
        self.entries.push(GalleryEntry {
            id,
            name: name.into(),
            dataset,
        });
        id
    }

    pub fn get(&self, id: EntryId) -> Option<&GalleryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// First entry named `name`.
    pub fn find(&self, name: &str) -> Option<&GalleryEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn remove(&mut self, id: EntryId) -> Option<GalleryEntry> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(pos))
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the gallery is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replay `template` and add every dataset result in step order.
    ///
    /// Scalar results are skipped. `progress` receives
    /// `(steps completed, total steps)` after each successful step. On
    /// failure the entries added so far are kept, the status message is set,
    /// and the error is returned.
    pub fn apply_template(
        &mut self,
        template: &BoundTemplate,
        mut progress: impl FnMut(usize, usize),
    ) -> Result<usize, ChainError> {
        let total = template.step_count();
        let mut added = 0;
        let mut replay = template.replay();
        while let Some(result) = replay.next() {
            match result {
                Ok((value, name)) => {
                    if let Some(dataset) = value.into_dataset() {
                        self.add(name, dataset);
                        added += 1;
                    }
                    progress(replay.completed(), total);
                }
                Err(e) => {
                    self.status_message = Some(format!(
                        "Error after {} of {total} steps: {e}",
                        e.completed_steps()
                    ));
                    return Err(e);
                }
            }
        }
        log::info!(
            "Applied template '{}': {added} series from {total} steps",
            template.template().name()
        );
        self.status_message = None;
        Ok(added)
    }
}
