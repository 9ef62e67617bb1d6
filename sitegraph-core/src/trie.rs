use std::collections::HashMap;

/// Prefix tree keyed by URL path segments.
///
/// Each trie node may carry the hierarchy key of the page living at that
/// prefix. Because matching is per segment, the closest page above a path
/// is unique: `/blog` is never mistaken for an ancestor of `/blogroll/x`.
#[derive(Debug, Clone)]
pub struct PathTrie {
    nodes: Vec<TrieNode>,
}

#[derive(Debug, Clone, Default)]
struct TrieNode {
    children: HashMap<String, usize>,
    page: Option<String>,
}

const ROOT: usize = 0;

impl PathTrie {
    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode::default()],
        }
    }

    /// Register `page` at `segments`. Returns false if a page already lives
    /// there (the first one wins).
    pub fn insert<S: AsRef<str>>(&mut self, segments: &[S], page: String) -> bool {
        let mut current = ROOT;
        for segment in segments {
            let segment = segment.as_ref();
            current = match self.nodes[current].children.get(segment) {
                Some(&next) => next,
                None => {
                    let next = self.nodes.len();
                    self.nodes.push(TrieNode::default());
                    self.nodes[current].children.insert(segment.to_string(), next);
                    next
                }
            };
        }

        let slot = &mut self.nodes[current].page;
        if slot.is_some() {
            return false;
        }
        *slot = Some(page);
        true
    }

    pub fn get<S: AsRef<str>>(&self, segments: &[S]) -> Option<&str> {
        let mut current = ROOT;
        for segment in segments {
            current = *self.nodes[current].children.get(segment.as_ref())?;
        }
        self.nodes[current].page.as_deref()
    }

    pub fn contains<S: AsRef<str>>(&self, segments: &[S]) -> bool {
        self.get(segments).is_some()
    }

    /// The deepest page strictly above `segments`, with its depth.
    /// Depth 0 means the site root `/`.
    pub fn closest_ancestor<S: AsRef<str>>(&self, segments: &[S]) -> Option<(&str, usize)> {
        if segments.is_empty() {
            return None;
        }

        let mut current = ROOT;
        let mut best = self.nodes[ROOT].page.as_deref().map(|page| (page, 0));

        for (depth, segment) in segments[..segments.len() - 1].iter().enumerate() {
            match self.nodes[current].children.get(segment.as_ref()) {
                Some(&next) => current = next,
                None => break,
            }
            if let Some(page) = self.nodes[current].page.as_deref() {
                best = Some((page, depth + 1));
            }
        }

        best
    }

    /// Number of registered pages.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.page.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PathTrie {
    fn default() -> Self {
        Self::new()
    }
}
