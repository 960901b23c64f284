use std::collections::HashMap;

/// Append-only mapping from symbol to a stable vector slot.
///
/// Slots are assigned in first-seen order and never reclaimed, so every
/// vector aligned with the index keeps its meaning across optimizer calls
/// even after a position is closed.
#[derive(Debug, Clone, Default)]
pub struct AssetIndex {
    order: Vec<String>,
    slots: HashMap<String, usize>,
}

impl AssetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot of `symbol`, assigning the next one if it has never been seen.
    /// Returns the slot and whether it was newly created.
    pub fn get_or_insert(&mut self, symbol: &str) -> (usize, bool) {
        if let Some(&idx) = self.slots.get(symbol) {
            return (idx, false);
        }
        let idx = self.order.len();
        self.order.push(symbol.to_string());
        self.slots.insert(symbol.to_string(), idx);
        (idx, true)
    }

    pub fn get(&self, symbol: &str) -> Option<usize> {
        self.slots.get(symbol).copied()
    }

    pub fn symbols(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_seen_order() {
        let mut idx = AssetIndex::new();
        assert_eq!(idx.get_or_insert("AAPL"), (0, true));
        assert_eq!(idx.get_or_insert("MSFT"), (1, true));
        assert_eq!(idx.get_or_insert("AAPL"), (0, false));
        assert_eq!(idx.symbols(), &["AAPL".to_string(), "MSFT".to_string()]);
        assert_eq!(idx.get("MSFT"), Some(1));
        assert_eq!(idx.get("TSLA"), None);
    }
}
