use crate::blueprint::ArtifactKind;
use crate::error::Result;
use crate::io;
use crate::paths;
use crate::resolver::{ApplyPlan, ConflictEntry, Resolution};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// UpdateRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// Add a new top-level field; an existing field is left alone.
    AddField,
    /// Replace a named section wholesale.
    OverwriteSection,
    /// Append one entry to a list-valued section.
    AppendEntry,
}

/// One knowledge update from a named source. Transient input to a single
/// merge run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRecord {
    /// Stamped by the adapter; feeds do not carry it themselves.
    #[serde(default)]
    pub source_id: String,
    /// Repository-relative path of the knowledge file to update.
    pub target: String,
    pub kind: UpdateKind,
    /// Top-level mapping key the record addresses.
    pub section: String,
    pub payload: Value,
    /// For overwrite records under the balanced strategy: hash of the
    /// section content the update was generated against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_hash: Option<String>,
    #[serde(default)]
    pub sequence: u64,
}

impl UpdateRecord {
    pub fn payload_hash(&self) -> String {
        let text = serde_yaml::to_string(&self.payload).unwrap_or_default();
        io::sha256_hex(text.as_bytes())
    }
}

/// Hash of a section's current value, in the same form update generators
/// compute `expected_hash` over. Absent sections hash the empty string.
pub fn section_hash(doc: &Mapping, section: &str) -> String {
    match doc.get(&Value::from(section)) {
        Some(value) => {
            let text = serde_yaml::to_string(value).unwrap_or_default();
            io::sha256_hex(text.as_bytes())
        }
        None => io::sha256_hex(b""),
    }
}

// ---------------------------------------------------------------------------
// Source adapters
// ---------------------------------------------------------------------------

/// One update channel. Every adapter is independently failable: a failing
/// source is logged and skipped, it never aborts aggregation of the others.
pub trait SourceAdapter {
    fn id(&self) -> &str;
    fn fetch_since(&self, cursor: Option<u64>) -> Result<Vec<UpdateRecord>>;
}

/// File-based adapter: one YAML feed under `.stencil/updates/`, a list of
/// update records. The file stem is the source id.
pub struct FileSourceAdapter {
    id: String,
    path: PathBuf,
}

impl FileSourceAdapter {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }

    /// All feeds under `.stencil/updates`, sorted by file name.
    pub fn discover(root: &Path) -> Result<Vec<FileSourceAdapter>> {
        let dir = paths::updates_dir(root);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut adapters = Vec::new();
        let mut names: Vec<String> = std::fs::read_dir(&dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".yaml") || n.ends_with(".yml"))
            .collect();
        names.sort();
        for name in names {
            let stem = name
                .trim_end_matches(".yaml")
                .trim_end_matches(".yml")
                .to_string();
            adapters.push(FileSourceAdapter::new(stem, dir.join(&name)));
        }
        Ok(adapters)
    }
}

impl SourceAdapter for FileSourceAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn fetch_since(&self, cursor: Option<u64>) -> Result<Vec<UpdateRecord>> {
        let data = std::fs::read_to_string(&self.path)?;
        let mut records: Vec<UpdateRecord> = serde_yaml::from_str(&data)?;
        for r in &mut records {
            r.source_id = self.id.clone();
        }
        if let Some(after) = cursor {
            records.retain(|r| r.sequence > after);
        }
        Ok(records)
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct Aggregation {
    pub records: Vec<UpdateRecord>,
    pub failed_sources: Vec<String>,
}

/// Collect records from every adapter, isolate per-source failures,
/// deduplicate by (source, target, payload hash) keeping the first, and
/// order by (sequence, source id). The ordering is total and stable so two
/// runs over the same inputs produce byte-identical output.
pub fn aggregate(adapters: &[Box<dyn SourceAdapter>]) -> Aggregation {
    let mut agg = Aggregation::default();

    for adapter in adapters {
        match adapter.fetch_since(None) {
            Ok(records) => agg.records.extend(records),
            Err(e) => {
                tracing::warn!(source = adapter.id(), "update source failed: {e}; skipping");
                agg.failed_sources.push(adapter.id().to_string());
            }
        }
    }

    let mut seen = BTreeSet::new();
    agg.records
        .retain(|r| seen.insert((r.source_id.clone(), r.target.clone(), r.payload_hash())));
    agg.records
        .sort_by(|a, b| a.sequence.cmp(&b.sequence).then_with(|| a.source_id.cmp(&b.source_id)));
    agg
}

// ---------------------------------------------------------------------------
// Merge strategies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Only add-field records; everything else is deferred.
    Conservative,
    /// Add-field and append-entry; overwrites only when the section is
    /// unchanged since the update was generated.
    Balanced,
    /// Everything, unconditionally (pre-images still go to backup).
    Aggressive,
}

impl std::str::FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "conservative" => Ok(MergeStrategy::Conservative),
            "balanced" => Ok(MergeStrategy::Balanced),
            "aggressive" => Ok(MergeStrategy::Aggressive),
            other => Err(format!(
                "unknown merge strategy '{other}' (expected conservative, balanced, or aggressive)"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeferredUpdate {
    pub source_id: String,
    pub target: String,
    pub section: String,
    pub reason: String,
}

#[derive(Debug)]
pub struct MergeOutcome {
    pub plan: ApplyPlan,
    pub deferred: Vec<DeferredUpdate>,
    pub applied_records: usize,
}

// ---------------------------------------------------------------------------
// Merge planning
// ---------------------------------------------------------------------------

/// Fold aggregated records into their target files under `strategy`,
/// producing a plan for the backup & apply engine. Reads the current target
/// contents; writes nothing itself.
pub fn merge_plan(
    root: &Path,
    records: &[UpdateRecord],
    strategy: MergeStrategy,
    dry_run: bool,
) -> Result<MergeOutcome> {
    let mut by_target: BTreeMap<&str, Vec<&UpdateRecord>> = BTreeMap::new();
    for record in records {
        by_target.entry(&record.target).or_default().push(record);
    }

    let mut entries = Vec::new();
    let mut deferred = Vec::new();
    let mut applied_records = 0;

    for (target, target_records) in by_target {
        let full = root.join(target);
        let existing_text = if full.exists() {
            Some(std::fs::read_to_string(&full)?)
        } else {
            None
        };

        let mut doc: Mapping = match &existing_text {
            Some(text) if !text.trim().is_empty() => match serde_yaml::from_str(text) {
                Ok(Value::Mapping(m)) => m,
                _ => {
                    // Not a YAML mapping — nothing we can merge into safely.
                    for r in &target_records {
                        deferred.push(defer(r, "target is not a YAML mapping"));
                    }
                    continue;
                }
            },
            _ => Mapping::new(),
        };

        let mut changed = false;
        for record in &target_records {
            match decide(&doc, record, strategy) {
                Ok(()) => {
                    apply_record(&mut doc, record, strategy);
                    applied_records += 1;
                    changed = true;
                }
                Err(reason) => deferred.push(defer(record, reason)),
            }
        }

        // Only emit a write when a record actually landed; reserializing an
        // untouched document could still change its formatting.
        if changed {
            let new_text = serde_yaml::to_string(&doc)?;
            entries.push(ConflictEntry {
                path: target.to_string(),
                existing_hash: existing_text.as_ref().map(|t| io::sha256_hex(t.as_bytes())),
                candidate_hash: io::sha256_hex(new_text.as_bytes()),
                kind: ArtifactKind::GeneratedOnce,
                resolution: if existing_text.is_some() {
                    Resolution::Replace
                } else {
                    Resolution::Add
                },
                content: new_text,
            });
        }
    }

    Ok(MergeOutcome {
        plan: ApplyPlan { entries, dry_run },
        deferred,
        applied_records,
    })
}

fn defer(record: &UpdateRecord, reason: &str) -> DeferredUpdate {
    DeferredUpdate {
        source_id: record.source_id.clone(),
        target: record.target.clone(),
        section: record.section.clone(),
        reason: reason.to_string(),
    }
}

/// Whether `record` may be applied under `strategy`, with the human-readable
/// deferral reason when not.
fn decide(doc: &Mapping, record: &UpdateRecord, strategy: MergeStrategy) -> std::result::Result<(), &'static str> {
    let key = Value::from(record.section.as_str());
    match (strategy, record.kind) {
        (MergeStrategy::Aggressive, _) => Ok(()),

        (MergeStrategy::Conservative, UpdateKind::AddField)
        | (MergeStrategy::Balanced, UpdateKind::AddField) => {
            if doc.contains_key(&key) {
                Err("field already present")
            } else {
                Ok(())
            }
        }
        (MergeStrategy::Conservative, _) => Err("deferred by conservative strategy"),

        (MergeStrategy::Balanced, UpdateKind::AppendEntry) => match doc.get(&key) {
            None | Some(Value::Sequence(_)) => Ok(()),
            Some(_) => Err("section is not a list"),
        },
        (MergeStrategy::Balanced, UpdateKind::OverwriteSection) => {
            let current = section_hash(doc, &record.section);
            match &record.expected_hash {
                Some(expected) if *expected == current => Ok(()),
                Some(_) => Err("section changed since the update was generated"),
                None => Err("overwrite record carries no expected hash"),
            }
        }
    }
}

fn apply_record(doc: &mut Mapping, record: &UpdateRecord, strategy: MergeStrategy) {
    let key = Value::from(record.section.as_str());
    match record.kind {
        UpdateKind::AddField => {
            if strategy == MergeStrategy::Aggressive || !doc.contains_key(&key) {
                doc.insert(key, record.payload.clone());
            }
        }
        UpdateKind::OverwriteSection => {
            doc.insert(key, record.payload.clone());
        }
        UpdateKind::AppendEntry => {
            if !matches!(doc.get(&key), Some(Value::Sequence(_))) {
                doc.insert(key.clone(), Value::Sequence(Vec::new()));
            }
            if let Some(Value::Sequence(seq)) = doc.get_mut(&key) {
                seq.push(record.payload.clone());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply;
    use tempfile::TempDir;

    fn record(
        source: &str,
        target: &str,
        kind: UpdateKind,
        section: &str,
        payload: Value,
        sequence: u64,
    ) -> UpdateRecord {
        UpdateRecord {
            source_id: source.to_string(),
            target: target.to_string(),
            kind,
            section: section.to_string(),
            payload,
            expected_hash: None,
            sequence,
        }
    }

    struct StaticAdapter {
        id: String,
        records: Vec<UpdateRecord>,
        fail: bool,
    }

    impl SourceAdapter for StaticAdapter {
        fn id(&self) -> &str {
            &self.id
        }
        fn fetch_since(&self, _cursor: Option<u64>) -> Result<Vec<UpdateRecord>> {
            if self.fail {
                return Err(crate::error::StencilError::Io(std::io::Error::other(
                    "source offline",
                )));
            }
            Ok(self.records.clone())
        }
    }

    fn boxed(adapter: StaticAdapter) -> Box<dyn SourceAdapter> {
        Box::new(adapter)
    }

    #[test]
    fn aggregate_dedups_by_payload_hash() {
        // Same (source, target, payload) under different sequence hints —
        // exactly one must survive.
        let a = record("reg", "k.yaml", UpdateKind::AddField, "s", Value::from("v"), 1);
        let b = record("reg", "k.yaml", UpdateKind::AddField, "s", Value::from("v"), 9);
        let agg = aggregate(&[boxed(StaticAdapter {
            id: "reg".to_string(),
            records: vec![a, b],
            fail: false,
        })]);
        assert_eq!(agg.records.len(), 1);
        assert_eq!(agg.records[0].sequence, 1);
    }

    #[test]
    fn aggregate_orders_by_sequence_then_source() {
        let adapters = vec![
            boxed(StaticAdapter {
                id: "zeta".to_string(),
                records: vec![record("zeta", "k.yaml", UpdateKind::AddField, "a", Value::from(1), 5)],
                fail: false,
            }),
            boxed(StaticAdapter {
                id: "alpha".to_string(),
                records: vec![
                    record("alpha", "k.yaml", UpdateKind::AddField, "b", Value::from(2), 5),
                    record("alpha", "k.yaml", UpdateKind::AddField, "c", Value::from(3), 2),
                ],
                fail: false,
            }),
        ];
        let agg = aggregate(&adapters);
        let order: Vec<(u64, &str)> = agg
            .records
            .iter()
            .map(|r| (r.sequence, r.source_id.as_str()))
            .collect();
        assert_eq!(order, vec![(2, "alpha"), (5, "alpha"), (5, "zeta")]);
    }

    #[test]
    fn failing_source_is_isolated() {
        let adapters = vec![
            boxed(StaticAdapter {
                id: "down".to_string(),
                records: vec![],
                fail: true,
            }),
            boxed(StaticAdapter {
                id: "up".to_string(),
                records: vec![record("up", "k.yaml", UpdateKind::AddField, "s", Value::from(1), 1)],
                fail: false,
            }),
        ];
        let agg = aggregate(&adapters);
        assert_eq!(agg.records.len(), 1);
        assert_eq!(agg.failed_sources, vec!["down"]);
    }

    #[test]
    fn conservative_defers_overwrite_and_leaves_target_unchanged() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("know.yaml");
        std::fs::write(&target, "section: original\n").unwrap();
        let before = std::fs::read_to_string(&target).unwrap();

        let records = vec![record(
            "reg",
            "know.yaml",
            UpdateKind::OverwriteSection,
            "section",
            Value::from("new"),
            1,
        )];
        let outcome =
            merge_plan(dir.path(), &records, MergeStrategy::Conservative, false).unwrap();
        assert_eq!(outcome.deferred.len(), 1);
        assert_eq!(outcome.applied_records, 0);
        assert!(outcome.plan.entries.is_empty());

        apply::apply(dir.path(), &outcome.plan).unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), before);
    }

    #[test]
    fn conservative_applies_add_field() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("know.yaml"), "existing: kept\n").unwrap();

        let records = vec![record(
            "reg",
            "know.yaml",
            UpdateKind::AddField,
            "added",
            Value::from("value"),
            1,
        )];
        let outcome =
            merge_plan(dir.path(), &records, MergeStrategy::Conservative, false).unwrap();
        apply::apply(dir.path(), &outcome.plan).unwrap();

        let doc: Mapping =
            serde_yaml::from_str(&std::fs::read_to_string(dir.path().join("know.yaml")).unwrap())
                .unwrap();
        assert_eq!(doc.get(&Value::from("existing")), Some(&Value::from("kept")));
        assert_eq!(doc.get(&Value::from("added")), Some(&Value::from("value")));
    }

    #[test]
    fn balanced_appends_entries() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("know.yaml"), "gotchas:\n- first\n").unwrap();

        let records = vec![record(
            "docs",
            "know.yaml",
            UpdateKind::AppendEntry,
            "gotchas",
            Value::from("second"),
            1,
        )];
        let outcome = merge_plan(dir.path(), &records, MergeStrategy::Balanced, false).unwrap();
        apply::apply(dir.path(), &outcome.plan).unwrap();

        let doc: Mapping =
            serde_yaml::from_str(&std::fs::read_to_string(dir.path().join("know.yaml")).unwrap())
                .unwrap();
        let Some(Value::Sequence(seq)) = doc.get(&Value::from("gotchas")) else {
            panic!("expected sequence");
        };
        assert_eq!(seq.len(), 2);
    }

    #[test]
    fn balanced_overwrite_requires_matching_hash() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("know.yaml"), "section: original\n").unwrap();
        let doc: Mapping = serde_yaml::from_str("section: original\n").unwrap();
        let current = section_hash(&doc, "section");

        // Stale expectation → deferred as a conflict.
        let mut stale = record(
            "reg",
            "know.yaml",
            UpdateKind::OverwriteSection,
            "section",
            Value::from("new"),
            1,
        );
        stale.expected_hash = Some("0".repeat(64));
        let outcome =
            merge_plan(dir.path(), &[stale], MergeStrategy::Balanced, false).unwrap();
        assert_eq!(outcome.deferred.len(), 1);
        assert!(outcome.deferred[0].reason.contains("changed"));

        // Matching expectation → applied.
        let mut fresh = record(
            "reg",
            "know.yaml",
            UpdateKind::OverwriteSection,
            "section",
            Value::from("new"),
            2,
        );
        fresh.expected_hash = Some(current);
        let outcome =
            merge_plan(dir.path(), &[fresh], MergeStrategy::Balanced, false).unwrap();
        assert_eq!(outcome.applied_records, 1);
        apply::apply(dir.path(), &outcome.plan).unwrap();
        let doc: Mapping =
            serde_yaml::from_str(&std::fs::read_to_string(dir.path().join("know.yaml")).unwrap())
                .unwrap();
        assert_eq!(doc.get(&Value::from("section")), Some(&Value::from("new")));
    }

    #[test]
    fn aggressive_applies_everything_with_backup() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("know.yaml"), "section: original\n").unwrap();

        let records = vec![record(
            "reg",
            "know.yaml",
            UpdateKind::OverwriteSection,
            "section",
            Value::from("forced"),
            1,
        )];
        let outcome = merge_plan(dir.path(), &records, MergeStrategy::Aggressive, false).unwrap();
        let report = apply::apply(dir.path(), &outcome.plan).unwrap();

        // Pre-image captured even under the most aggressive strategy.
        let backup =
            apply::Backup::load(dir.path(), report.backup_id.as_deref().unwrap()).unwrap();
        assert_eq!(
            backup.entries[0].pre_image.as_deref(),
            Some("section: original\n")
        );
    }

    #[test]
    fn merge_creates_missing_target() {
        let dir = TempDir::new().unwrap();
        let records = vec![record(
            "reg",
            "fresh.yaml",
            UpdateKind::AddField,
            "topic",
            Value::from("intro"),
            1,
        )];
        let outcome = merge_plan(dir.path(), &records, MergeStrategy::Balanced, false).unwrap();
        assert_eq!(outcome.plan.entries[0].resolution, Resolution::Add);
        apply::apply(dir.path(), &outcome.plan).unwrap();
        assert!(dir.path().join("fresh.yaml").exists());
    }

    #[test]
    fn non_mapping_target_defers_all() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("list.yaml"), "- just\n- a\n- list\n").unwrap();
        let records = vec![record(
            "reg",
            "list.yaml",
            UpdateKind::AddField,
            "s",
            Value::from(1),
            1,
        )];
        let outcome = merge_plan(dir.path(), &records, MergeStrategy::Aggressive, false).unwrap();
        assert_eq!(outcome.deferred.len(), 1);
        assert!(outcome.plan.entries.is_empty());
    }

    #[test]
    fn file_adapter_reads_feed_and_stamps_source() {
        let dir = TempDir::new().unwrap();
        let feed_dir = paths::updates_dir(dir.path());
        crate::io::ensure_dir(&feed_dir).unwrap();
        std::fs::write(
            feed_dir.join("registry.yaml"),
            "- target: know.yaml\n  kind: add_field\n  section: topic\n  payload: intro\n  sequence: 3\n",
        )
        .unwrap();

        let adapters = FileSourceAdapter::discover(dir.path()).unwrap();
        assert_eq!(adapters.len(), 1);
        assert_eq!(adapters[0].id(), "registry");

        let records = adapters[0].fetch_since(None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source_id, "registry");
        assert_eq!(records[0].sequence, 3);

        // Cursor filters already-seen sequences.
        assert!(adapters[0].fetch_since(Some(3)).unwrap().is_empty());
    }
}
