//! Read-only view of a kit's part catalog, exposed to the host as a sequence.

use scenebind_native::PartInfo;

/// Snapshot of the parts a kit declares, in declaration order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KitCatalog {
    parts: Vec<PartInfo>,
}

impl KitCatalog {
    pub(crate) fn new(parts: Vec<PartInfo>) -> Self {
        KitCatalog { parts }
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PartInfo> {
        self.parts.get(index)
    }

    /// Whether the kit declares a part called `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.parts.iter().any(|p| p.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.parts.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PartInfo> {
        self.parts.iter()
    }
}

impl<'a> IntoIterator for &'a KitCatalog {
    type Item = &'a PartInfo;
    type IntoIter = std::slice::Iter<'a, PartInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.parts.iter()
    }
}
