use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque reference to a live DOM node, owned by the browser driver.
///
/// A handle is only meaningful for the driver query that produced it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Clickable,
    Input,
    Dropdown,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Clickable => "clickable",
            ElementKind::Input => "input",
            ElementKind::Dropdown => "dropdown",
        }
    }

    /// Badge colour used when visual marking is enabled.
    pub fn badge_color(&self) -> &'static str {
        match self {
            ElementKind::Input => "red",
            ElementKind::Dropdown => "orange",
            ElementKind::Clickable => "yellow",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate node as reported by the driver, before description and numbering.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawElement {
    pub handle: ElementHandle,
    /// Lowercase tag name.
    pub tag: String,
    /// The `type` property for form controls.
    pub input_type: Option<String>,
    /// The element's own `id` attribute.
    pub dom_id: Option<String>,
    pub inner_text: Option<String>,
    pub aria_label: Option<String>,
    pub placeholder: Option<String>,
    pub bounding_box: Option<BoundingBox>,
    pub visible: bool,
}

/// A `<label>` as reported by the driver.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawLabel {
    pub for_id: Option<String>,
    pub own_id: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedElement {
    pub id: u32,
    #[serde(skip)]
    pub handle: ElementHandle,
    pub bounding_box: Option<BoundingBox>,
    pub kind: ElementKind,
    pub description: String,
}

/// The numbered element registry for one navigation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub url: String,
    elements: BTreeMap<u32, MappedElement>,
}

impl Snapshot {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            elements: BTreeMap::new(),
        }
    }

    /// Append an element under the next free id and return that id.
    pub fn push(
        &mut self,
        handle: ElementHandle,
        kind: ElementKind,
        description: String,
        bounding_box: Option<BoundingBox>,
    ) -> u32 {
        let id = self.elements.len() as u32 + 1;
        self.elements.insert(
            id,
            MappedElement {
                id,
                handle,
                bounding_box,
                kind,
                description,
            },
        );
        id
    }

    pub fn get(&self, id: u32) -> Option<&MappedElement> {
        self.elements.get(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.elements.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MappedElement> {
        self.elements.values()
    }

    /// One line per element: `N: description (kind)`.
    pub fn layout(&self) -> String {
        self.iter()
            .map(|e| format!("{}: {} ({})", e.id, e.description, e.kind))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskState {
    pub url: String,
    pub task: String,
    pub iteration: u32,
    pub done: bool,
}

impl TaskState {
    pub fn new(url: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            task: task.into(),
            iteration: 0,
            done: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_numbers_from_one() {
        let mut snapshot = Snapshot::new("https://example.com");
        let first = snapshot.push(ElementHandle(7), ElementKind::Clickable, "Home".to_string(), None);
        let second = snapshot.push(ElementHandle(9), ElementKind::Input, "Search".to_string(), None);

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(snapshot.get(2).unwrap().handle, ElementHandle(9));
        assert!(!snapshot.contains(3));
    }

    #[test]
    fn test_snapshot_layout() {
        let mut snapshot = Snapshot::new("https://example.com");
        snapshot.push(ElementHandle(1), ElementKind::Clickable, "Sign in".to_string(), None);
        snapshot.push(ElementHandle(2), ElementKind::Dropdown, "Country".to_string(), None);

        assert_eq!(snapshot.layout(), "1: Sign in (clickable)\n2: Country (dropdown)");
    }
}
