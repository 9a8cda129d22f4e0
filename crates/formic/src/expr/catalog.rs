use indexmap::IndexSet;

/// Ordered, de-duplicated registry of path tokens for one node's
/// compilation pass.
///
/// Indices are assigned in first-seen order and never change once
/// assigned; after the pass the catalog is read-only and its indices
/// address the positional dependency-values array.
#[derive(Debug, Default, Clone)]
pub struct PathCatalog {
    paths: IndexSet<String>,
}

impl PathCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path, returning its stable index. Registering a path
    /// that is already present is a no-op preserving the original index.
    pub fn set(&mut self, path: &str) -> u32 {
        if let Some(index) = self.paths.get_index_of(path) {
            return index as u32;
        }
        let (index, _) = self.paths.insert_full(path.to_string());
        index as u32
    }

    pub fn find_index(&self, path: &str) -> Option<u32> {
        self.paths.get_index_of(path).map(|i| i as u32)
    }

    pub fn get(&self, index: u32) -> Option<&str> {
        self.paths.get_index(index as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_seen_order() {
        let mut catalog = PathCatalog::new();
        assert_eq!(catalog.set("/a/b"), 0);
        assert_eq!(catalog.set("../x"), 1);
        assert_eq!(catalog.set("/a/b"), 0);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get(1), Some("../x"));
    }

    #[test]
    fn same_token_same_index_for_all_forms() {
        let forms = ["/a/b", "#/a/b", "../a/b", "./a/b", "@"];
        let mut catalog = PathCatalog::new();
        let first: Vec<_> = forms.iter().map(|p| catalog.set(p)).collect();
        let second: Vec<_> = forms.iter().map(|p| catalog.set(p)).collect();
        assert_eq!(first, second);
        assert_eq!(catalog.len(), forms.len());
    }

    #[test]
    fn find_index_missing() {
        let catalog = PathCatalog::new();
        assert_eq!(catalog.find_index("/nope"), None);
    }
}
