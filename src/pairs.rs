//! Class labels, unordered class pairs and one-vs-one pair enumeration.
//!
//! Pair order is fixed (sorted labels, `i` ascending then `j > i`) so run
//! numbering and artifact names are reproducible for a given label set.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Immutable class identifier, derived from a class directory name.
///
/// Equality is exact: `"Cat"`, `"cat"` and `"cat "` are three labels.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassLabel(String);

impl ClassLabel {
    /// Create a label from any string-like value
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the label text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassLabel {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for ClassLabel {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl AsRef<str> for ClassLabel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Unordered pair of two distinct class labels.
///
/// `ClassPair::new(a, b) == ClassPair::new(b, a)`, and both hash the same.
/// The generation order is still kept in [`first`](Self::first) and
/// [`second`](Self::second) because artifact names encode it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassPair {
    first: ClassLabel,
    second: ClassLabel,
}

impl ClassPair {
    /// Create a pair; returns `None` for a self-pair
    #[must_use]
    pub fn new(first: ClassLabel, second: ClassLabel) -> Option<Self> {
        if first == second {
            return None;
        }
        Some(Self { first, second })
    }

    /// Label listed first in generation order
    #[must_use]
    pub const fn first(&self) -> &ClassLabel {
        &self.first
    }

    /// Label listed second in generation order
    #[must_use]
    pub const fn second(&self) -> &ClassLabel {
        &self.second
    }

    fn ordered(&self) -> (&ClassLabel, &ClassLabel) {
        if self.first <= self.second {
            (&self.first, &self.second)
        } else {
            (&self.second, &self.first)
        }
    }
}

impl PartialEq for ClassPair {
    fn eq(&self, other: &Self) -> bool {
        self.ordered() == other.ordered()
    }
}

impl Eq for ClassPair {}

impl Hash for ClassPair {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ordered().hash(state);
    }
}

impl fmt::Display for ClassPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} vs {}", self.first, self.second)
    }
}

/// Enumerate every unordered pair of distinct labels exactly once.
///
/// Labels are sorted and deduplicated first. Yields `n * (n - 1) / 2` pairs
/// for `n` distinct labels and an empty vector when `n < 2`.
#[must_use]
pub fn generate_pairs(labels: &[ClassLabel]) -> Vec<ClassPair> {
    let mut sorted = labels.to_vec();
    sorted.sort();
    sorted.dedup();

    let mut pairs = Vec::with_capacity(sorted.len() * sorted.len().saturating_sub(1) / 2);
    for i in 0..sorted.len() {
        for j in (i + 1)..sorted.len() {
            pairs.extend(ClassPair::new(sorted[i].clone(), sorted[j].clone()));
        }
    }
    pairs
}

/// Family tag embedded in one-vs-one artifact names
pub const OVO_TAG: &str = "OvO";

/// Normalize a version string to its `v`-prefixed form (`"1"` -> `"v1"`)
#[must_use]
pub fn version_tag(version: &str) -> String {
    if version.starts_with('v') {
        version.to_string()
    } else {
        format!("v{version}")
    }
}

/// Check that a version survives the round trip through an artifact name.
///
/// The `v`-prefixed tag must not start with `vs_`, contain a further `_v`
/// (the parser splits there) or contain a path separator.
#[must_use]
pub fn is_valid_version(version: &str) -> bool {
    let tag = version_tag(version.trim());
    let rest = &tag[1..];
    !rest.is_empty()
        && !rest.starts_with("s_")
        && !rest.contains("_v")
        && !rest.contains(['/', '\\'])
}

/// Artifact file name for one pair's sub-model:
/// `<model>_OvO_<first>_vs_<second>_v<version>.<ext>`
#[must_use]
pub fn artifact_file_name(
    model_name: &str,
    pair: &ClassPair,
    version: &str,
    extension: &str,
) -> String {
    format!(
        "{model_name}_{OVO_TAG}_{}_vs_{}_{}.{extension}",
        pair.first(),
        pair.second(),
        version_tag(version)
    )
}

/// Components recovered from an artifact file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactName {
    /// First class label (as generated)
    pub class_a: ClassLabel,
    /// Second class label (as generated)
    pub class_b: ClassLabel,
    /// Version tag, including its `v` prefix
    pub version: String,
}

impl ArtifactName {
    /// The pair this artifact was trained on
    #[must_use]
    pub fn pair(&self) -> Option<ClassPair> {
        ClassPair::new(self.class_a.clone(), self.class_b.clone())
    }
}

/// Re-derive `(class_a, class_b, version)` from an artifact file name.
///
/// Labels may contain underscores; the first `_vs_` separates them. The
/// version starts at the last `_v`, so it may contain underscores itself.
#[must_use]
pub fn parse_artifact_file_name(file_name: &str, model_name: &str) -> Option<ArtifactName> {
    let rest = file_name.strip_prefix(model_name)?.strip_prefix('_')?;
    let rest = rest.strip_prefix(OVO_TAG)?.strip_prefix('_')?;
    let (stem, _extension) = rest.rsplit_once('.')?;
    let split = stem.rfind("_v")?;
    let (classes, version) = (&stem[..split], &stem[split + 1..]);
    if version.len() < 2 || version.starts_with("vs_") {
        return None;
    }
    let (class_a, class_b) = classes.split_once("_vs_")?;
    if class_a.is_empty() || class_b.is_empty() {
        return None;
    }

    Some(ArtifactName {
        class_a: ClassLabel::new(class_a),
        class_b: ClassLabel::new(class_b),
        version: version.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn labels(names: &[&str]) -> Vec<ClassLabel> {
        names.iter().map(|n| ClassLabel::new(*n)).collect()
    }

    #[test]
    fn test_pair_count_matches_combinations() {
        for n in 2..=8 {
            let names: Vec<String> = (0..n).map(|i| format!("class_{i}")).collect();
            let input: Vec<ClassLabel> = names.iter().map(|s| ClassLabel::new(s.as_str())).collect();
            let pairs = generate_pairs(&input);
            assert_eq!(pairs.len(), n * (n - 1) / 2);

            let unique: HashSet<&ClassPair> = pairs.iter().collect();
            assert_eq!(unique.len(), pairs.len(), "no duplicate combinations");
            assert!(pairs.iter().all(|p| p.first() != p.second()));
        }
    }

    #[test]
    fn test_fewer_than_two_labels_yield_nothing() {
        assert!(generate_pairs(&[]).is_empty());
        assert!(generate_pairs(&labels(&["only"])).is_empty());
        // duplicates collapse to one label
        assert!(generate_pairs(&labels(&["dup", "dup"])).is_empty());
    }

    #[test]
    fn test_generation_order_is_sorted_and_stable() {
        let pairs = generate_pairs(&labels(&["sphynx", "mouth_open", "cat"]));
        let rendered: Vec<String> = pairs.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "cat vs mouth_open",
                "cat vs sphynx",
                "mouth_open vs sphynx"
            ]
        );

        let again = generate_pairs(&labels(&["cat", "sphynx", "mouth_open"]));
        let rendered_again: Vec<String> = again.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, rendered_again);
    }

    #[test]
    fn test_pair_identity_is_order_independent() {
        let ab = ClassPair::new("a".into(), "b".into()).unwrap();
        let ba = ClassPair::new("b".into(), "a".into()).unwrap();
        assert_eq!(ab, ba);

        let set: HashSet<ClassPair> = [ab, ba].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_self_pair_rejected() {
        assert!(ClassPair::new("a".into(), "a".into()).is_none());
    }

    #[test]
    fn test_labels_are_case_and_whitespace_sensitive() {
        let pairs = generate_pairs(&labels(&["Cat", "cat", "cat "]));
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn test_artifact_file_name_format() {
        let pair = ClassPair::new("mouth_open".into(), "sphynx".into()).unwrap();
        assert_eq!(
            artifact_file_name("TestModel", &pair, "v1", "mlmodel"),
            "TestModel_OvO_mouth_open_vs_sphynx_v1.mlmodel"
        );
        assert_eq!(
            artifact_file_name("TestModel", &pair, "2", "mlmodel"),
            "TestModel_OvO_mouth_open_vs_sphynx_v2.mlmodel"
        );
    }

    #[test]
    fn test_artifact_file_name_parses_back() {
        let pair = ClassPair::new("mouth_open".into(), "sphynx".into()).unwrap();
        let name = artifact_file_name("TestModel", &pair, "v3", "mlmodel");
        let parsed = parse_artifact_file_name(&name, "TestModel").unwrap();

        assert_eq!(parsed.class_a.as_str(), "mouth_open");
        assert_eq!(parsed.class_b.as_str(), "sphynx");
        assert_eq!(parsed.version, "v3");
        assert_eq!(parsed.pair().unwrap(), pair);
    }

    #[test]
    fn test_version_with_underscore_parses_back() {
        let pair = ClassPair::new("cat".into(), "dog".into()).unwrap();
        let name = artifact_file_name("M", &pair, "1_0", "mlmodel");
        assert_eq!(name, "M_OvO_cat_vs_dog_v1_0.mlmodel");

        let parsed = parse_artifact_file_name(&name, "M").unwrap();
        assert_eq!(parsed.class_a.as_str(), "cat");
        assert_eq!(parsed.class_b.as_str(), "dog");
        assert_eq!(parsed.version, "v1_0");
    }

    #[test]
    fn test_label_with_v_suffix_parses_back() {
        let pair = ClassPair::new("cat_v2".into(), "dog_vet".into()).unwrap();
        let name = artifact_file_name("M", &pair, "3", "mlmodel");
        let parsed = parse_artifact_file_name(&name, "M").unwrap();
        assert_eq!(parsed.class_a.as_str(), "cat_v2");
        assert_eq!(parsed.class_b.as_str(), "dog_vet");
        assert_eq!(parsed.version, "v3");
    }

    #[test]
    fn test_version_validity() {
        assert!(is_valid_version("1"));
        assert!(is_valid_version("v1_0"));
        assert!(is_valid_version("2.1"));
        assert!(!is_valid_version("v"));
        assert!(!is_valid_version("1_v2"));
        assert!(!is_valid_version("1/2"));
        assert!(!is_valid_version("vs_1"));
    }

    #[test]
    fn test_parse_rejects_foreign_names() {
        assert!(parse_artifact_file_name("Other_OvO_a_vs_b_v1.mlmodel", "TestModel").is_none());
        assert!(parse_artifact_file_name("TestModel_OvA_a_vs_b_v1.mlmodel", "TestModel").is_none());
        assert!(parse_artifact_file_name("TestModel_OvO_a_b_v1.mlmodel", "TestModel").is_none());
        assert!(parse_artifact_file_name("TestModel_OvO_a_vs_b_1.mlmodel", "TestModel").is_none());
        assert!(parse_artifact_file_name("TestModel_OvO_a_vs_b_vs_c.mlmodel", "TestModel").is_none());
    }
}
