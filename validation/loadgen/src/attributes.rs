//! Large attribute payloads attached to every generated unit.

use rand::Rng;

/// One (name, value) attribute pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// Ordered attribute list shared by every unit of one tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet {
    attributes: Vec<Attribute>,
}

impl AttributeSet {
    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Approximate payload size in bytes (names plus values).
    pub fn byte_size(&self) -> usize {
        self.attributes
            .iter()
            .map(|a| a.name.len() + a.value.len())
            .sum()
    }
}

/// Produces the trailing token of each attribute value.
pub type SuffixFn = fn() -> String;

/// Random v4 UUID: every value is distinct.
pub fn unique_suffix() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Non-negative pseudo-random integer.
pub fn random_suffix() -> String {
    rand::thread_rng().gen_range(0..i64::MAX).to_string()
}

/// Builds attribute sets of a fixed shape. The suffix strategy is picked
/// once per run.
#[derive(Debug, Clone)]
pub struct AttributeFactory {
    count: usize,
    padding: String,
    suffix: SuffixFn,
}

impl AttributeFactory {
    pub fn new(count: usize, size: usize, high_cardinality: bool) -> Self {
        let suffix: SuffixFn = if high_cardinality {
            unique_suffix
        } else {
            random_suffix
        };
        Self::with_suffix(count, size, suffix)
    }

    pub fn with_suffix(count: usize, size: usize, suffix: SuffixFn) -> Self {
        Self {
            count,
            padding: "x".repeat(size),
            suffix,
        }
    }

    /// Fresh set for one tree: `attr_{i}` = `{padding}_worker{id}_attr{i}_{suffix}`.
    pub fn build(&self, worker_id: usize) -> AttributeSet {
        let attributes = (0..self.count)
            .map(|i| Attribute {
                name: format!("attr_{}", i),
                value: format!(
                    "{}_worker{}_attr{}_{}",
                    self.padding,
                    worker_id,
                    i,
                    (self.suffix)()
                ),
            })
            .collect();
        AttributeSet { attributes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_build_shape() {
        let factory = AttributeFactory::new(3, 16, false);
        let set = factory.build(7);

        assert_eq!(set.len(), 3);
        for (i, attr) in set.iter().enumerate() {
            assert_eq!(attr.name, format!("attr_{}", i));
            let prefix = format!("{}_worker7_attr{}_", "x".repeat(16), i);
            assert!(attr.value.starts_with(&prefix), "{}", attr.value);
            let suffix = &attr.value[prefix.len()..];
            assert!(suffix.parse::<i64>().unwrap() >= 0);
        }
    }

    #[test]
    fn test_high_cardinality_uses_uuid() {
        let factory = AttributeFactory::new(1, 4, true);
        let set = factory.build(0);
        let value = &set.iter().next().unwrap().value;
        let suffix = value.rsplit('_').next().unwrap();
        assert!(uuid::Uuid::parse_str(suffix).is_ok());
    }

    #[test]
    fn test_high_cardinality_values_never_repeat() {
        let factory = AttributeFactory::new(4, 8, true);
        let mut seen = HashSet::new();
        for _ in 0..250 {
            for attr in factory.build(1).iter() {
                assert!(seen.insert(attr.value.clone()));
            }
        }
    }

    #[test]
    fn test_custom_suffix_strategy() {
        fn fixed() -> String {
            "fixed".to_string()
        }
        let set = AttributeFactory::with_suffix(2, 0, fixed).build(3);
        let values: Vec<_> = set.iter().map(|a| a.value.as_str()).collect();
        assert_eq!(values, vec!["_worker3_attr0_fixed", "_worker3_attr1_fixed"]);
    }

    #[test]
    fn test_empty_set() {
        let set = AttributeFactory::new(0, 256, false).build(0);
        assert!(set.is_empty());
        assert_eq!(set.byte_size(), 0);
    }

    #[test]
    fn test_byte_size_tracks_padding() {
        let small = AttributeFactory::with_suffix(2, 10, unique_suffix).build(0).byte_size();
        let large = AttributeFactory::with_suffix(2, 1010, unique_suffix).build(0).byte_size();
        assert_eq!(large, small + 2000);
    }
}
