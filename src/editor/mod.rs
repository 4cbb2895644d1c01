//! Interactive selection editor: the user drags rectangles over an image,
//! each one is translated independently, and a composited output image is
//! regenerated once all pending work settles.
//!
//! `SelectionEditor` is a pure reducer over pointer and completion events.
//! It owns the selection list, the in-progress draft, and the identity of
//! the last composite it asked for; every mutation funnels through a single
//! "list changed" check that decides whether to recompose. The actions it
//! returns are carried out by [`driver::EditorDriver`].

pub mod driver;

pub use driver::EditorDriver;

use crate::overlay::DisplayRect;

/// Drags smaller than this on either axis (display pixels) are discarded.
pub const MIN_SELECTION_SIZE: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionStatus {
    Pending,
    Translating,
    Translated,
}

/// A user-drawn rectangle in display space. Persisted selections always
/// have positive width and height; a failed translation removes the
/// selection entirely rather than marking it.
#[derive(Debug, Clone)]
pub struct Selection {
    pub id: u64,
    pub rect: DisplayRect,
    pub status: SelectionStatus,
    pub translated_text: Option<String>,
}

/// Snapshot of one translated selection handed to composition.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeRegion {
    pub rect: DisplayRect,
    pub text: String,
}

/// Work the reducer asks its driver to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum EditorAction {
    /// Recognize and translate the image under this selection.
    Translate { id: u64, rect: DisplayRect },
    /// Regenerate and publish the composite for this translated set.
    Compose {
        key: String,
        regions: Vec<ComposeRegion>,
    },
}

#[derive(Debug, Clone)]
struct Draft {
    anchor: (f32, f32),
    rect: DisplayRect,
}

#[derive(Debug, Default)]
pub struct SelectionEditor {
    selections: Vec<Selection>,
    draft: Option<Draft>,
    hovered: Option<u64>,
    next_id: u64,
    last_composite_key: Option<String>,
}

impl SelectionEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selections(&self) -> &[Selection] {
        &self.selections
    }

    /// The rectangle currently being dragged, if any. At most one drag is in
    /// progress at a time.
    pub fn draft_rect(&self) -> Option<DisplayRect> {
        self.draft.as_ref().map(|draft| draft.rect)
    }

    /// The selection under the pointer, for hover highlighting only.
    pub fn hovered(&self) -> Option<u64> {
        self.hovered
    }

    /// Click-to-delete takes priority over starting a drag: a pointer-down
    /// inside an existing selection removes it and no draft begins.
    pub fn pointer_down(&mut self, x: f32, y: f32) -> Vec<EditorAction> {
        if self.draft.is_some() {
            return Vec::new();
        }
        if let Some(id) = self.hit_test(x, y) {
            self.remove(id);
            return self.list_changed();
        }
        self.draft = Some(Draft {
            anchor: (x, y),
            rect: DisplayRect {
                x,
                y,
                w: 0.0,
                h: 0.0,
            },
        });
        Vec::new()
    }

    /// Tracks the drag (the origin follows the pointer when it moves left of
    /// or above the anchor, so the rect always has non-negative size) and
    /// refreshes the hovered selection.
    pub fn pointer_move(&mut self, x: f32, y: f32) {
        self.hovered = self.hit_test(x, y);
        if let Some(draft) = self.draft.as_mut() {
            let (ax, ay) = draft.anchor;
            draft.rect = DisplayRect {
                x: ax.min(x),
                y: ay.min(y),
                w: (x - ax).abs(),
                h: (y - ay).abs(),
            };
        }
    }

    /// Finalizes the drag. Undersized selections are discarded; everything
    /// else enters the list and is dispatched for translation exactly once.
    pub fn pointer_up(&mut self) -> Vec<EditorAction> {
        let Some(draft) = self.draft.take() else {
            return Vec::new();
        };
        let rect = draft.rect;
        if rect.w < MIN_SELECTION_SIZE || rect.h < MIN_SELECTION_SIZE {
            return Vec::new();
        }

        let id = self.next_id;
        self.next_id += 1;
        self.selections.push(Selection {
            id,
            rect,
            status: SelectionStatus::Pending,
            translated_text: None,
        });
        // Flip to translating before the async dispatch so a selection never
        // has more than one request in flight.
        if let Some(selection) = self.find_mut(id) {
            selection.status = SelectionStatus::Translating;
        }

        let mut actions = vec![EditorAction::Translate { id, rect }];
        actions.extend(self.list_changed());
        actions
    }

    /// Alternate deletion gesture; same rule as pointer-down on a selection.
    pub fn right_click(&mut self, x: f32, y: f32) -> Vec<EditorAction> {
        if let Some(id) = self.hit_test(x, y) {
            self.remove(id);
            return self.list_changed();
        }
        Vec::new()
    }

    /// Empties the list and cancels an in-progress drag. In-flight translate
    /// responses are not cancelled; they no-op later because their id is
    /// gone.
    pub fn clear_all(&mut self) -> Vec<EditorAction> {
        self.draft = None;
        self.hovered = None;
        self.selections.clear();
        self.list_changed()
    }

    /// Applies a translate completion by id. If the user deleted the
    /// selection while the request was in flight the id finds nothing and
    /// the update is dropped. A failed or empty translation removes the
    /// selection.
    pub fn translate_done(&mut self, id: u64, text: Option<String>) -> Vec<EditorAction> {
        match text.filter(|value| !value.trim().is_empty()) {
            Some(text) => {
                if let Some(selection) = self.find_mut(id) {
                    selection.translated_text = Some(text);
                    selection.status = SelectionStatus::Translated;
                }
            }
            None => self.remove(id),
        }
        self.list_changed()
    }

    /// Topmost (most recently created) selection containing the point.
    fn hit_test(&self, x: f32, y: f32) -> Option<u64> {
        self.selections
            .iter()
            .rev()
            .find(|selection| selection.rect.contains(x, y))
            .map(|selection| selection.id)
    }

    fn find_mut(&mut self, id: u64) -> Option<&mut Selection> {
        self.selections
            .iter_mut()
            .find(|selection| selection.id == id)
    }

    fn remove(&mut self, id: u64) {
        self.selections.retain(|selection| selection.id != id);
        if self.hovered == Some(id) {
            self.hovered = None;
        }
    }

    /// Settle guard, re-evaluated on every list mutation: recompose only
    /// when at least one selection is translated and none is still
    /// translating, and only when the derived output would differ from the
    /// last one requested.
    fn list_changed(&mut self) -> Vec<EditorAction> {
        let any_translated = self
            .selections
            .iter()
            .any(|selection| selection.status == SelectionStatus::Translated);
        let any_translating = self
            .selections
            .iter()
            .any(|selection| selection.status == SelectionStatus::Translating);
        if !any_translated || any_translating {
            return Vec::new();
        }

        let regions: Vec<ComposeRegion> = self
            .selections
            .iter()
            .filter(|selection| selection.status == SelectionStatus::Translated)
            .filter_map(|selection| {
                selection.translated_text.as_ref().map(|text| ComposeRegion {
                    rect: selection.rect,
                    text: text.clone(),
                })
            })
            .collect();

        let key = composite_key(&regions);
        if self.last_composite_key.as_deref() == Some(key.as_str()) {
            return Vec::new();
        }
        self.last_composite_key = Some(key.clone());
        vec![EditorAction::Compose { key, regions }]
    }
}

/// Identity of a derived composite: stable over the translated set, so list
/// changes that leave that set untouched never trigger a redundant publish.
fn composite_key(regions: &[ComposeRegion]) -> String {
    let mut seed = String::new();
    for region in regions {
        seed.push_str(&format!(
            "{:.2},{:.2},{:.2},{:.2}|{};",
            region.rect.x, region.rect.y, region.rect.w, region.rect.h, region.text
        ));
    }
    format!("{:x}", md5::compute(seed.as_bytes()))
}
