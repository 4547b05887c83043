//! Moving learned knowledge between stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::LocalStorage;
use crate::types::{Identified, Instinct, InstinctSource, MindResult, Pattern, Strategy};

/// A portable snapshot of instincts, patterns, and strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub instincts: Vec<Instinct>,
    #[serde(default)]
    pub patterns: Vec<Pattern>,
    #[serde(default)]
    pub strategies: Vec<Strategy>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
}

/// Append items whose id is not already present. Existing entries are never
/// overwritten.
fn merge_new<T: Identified>(
    existing: &mut Vec<T>,
    incoming: Vec<T>,
    report: &mut ImportReport,
    mut prepare: impl FnMut(&mut T),
) {
    for mut item in incoming {
        if existing.iter().any(|e| e.id() == item.id()) {
            tracing::warn!("Import skipped existing id {}", item.id());
            report.skipped += 1;
            continue;
        }
        prepare(&mut item);
        existing.push(item);
        report.imported += 1;
    }
}

impl LocalStorage {
    pub fn export_bundle(&self) -> ExportBundle {
        let store = self.load();
        ExportBundle {
            version: store.metadata.version,
            exported_at: Utc::now(),
            instincts: store.instincts,
            patterns: store.patterns,
            strategies: store.strategies,
        }
    }

    /// Merge a bundle into this store in a single save. Imported instincts
    /// are re-tagged with [`InstinctSource::Imported`].
    pub fn import_bundle(&self, bundle: ExportBundle) -> MindResult<ImportReport> {
        let report = self.update(|store| {
            let mut report = ImportReport::default();
            merge_new(&mut store.instincts, bundle.instincts, &mut report, |i| {
                i.source = InstinctSource::Imported;
            });
            merge_new(&mut store.patterns, bundle.patterns, &mut report, |_| {});
            merge_new(&mut store.strategies, bundle.strategies, &mut report, |_| {});
            let changed = report.imported > 0;
            (report, changed)
        })?;

        tracing::info!(
            "Imported {} item(s), skipped {}",
            report.imported,
            report.skipped
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompositeConfidence, InstinctStatus};

    fn instinct(id: &str) -> Instinct {
        let now = Utc::now();
        Instinct {
            id: id.to_string(),
            trigger: "When editing".to_string(),
            action: "Read first".to_string(),
            domain: "workflow".to_string(),
            status: InstinctStatus::Active,
            confidence: CompositeConfidence::new(0.7, 0.7, 0.7),
            evidence_count: 4,
            source: InstinctSource::SequenceDetection,
            created_at: now,
            last_seen: now,
            last_applied: None,
            last_verified: None,
            last_decayed: None,
            application_count: 0,
            success_rate: 0.0,
            tags: Some(vec!["editing".to_string()]),
            evolution_parent: None,
        }
    }

    #[test]
    fn test_export_import_between_stores() {
        let src_dir = tempfile::tempdir().unwrap();
        let dst_dir = tempfile::tempdir().unwrap();
        let src = LocalStorage::open(src_dir.path()).unwrap();
        let dst = LocalStorage::open(dst_dir.path()).unwrap();

        src.upsert_instinct(instinct("a")).unwrap();
        src.upsert_instinct(instinct("b")).unwrap();
        dst.upsert_instinct(instinct("b")).unwrap();

        let bundle = src.export_bundle();
        assert_eq!(bundle.instincts.len(), 2);

        let report = dst.import_bundle(bundle).unwrap();
        assert_eq!(report, ImportReport { imported: 1, skipped: 1 });

        let a = dst.get_instinct("a").unwrap();
        assert_eq!(a.source, InstinctSource::Imported);
        assert_eq!(a.tags, Some(vec!["editing".to_string()]));
        // The pre-existing copy is untouched.
        assert_eq!(
            dst.get_instinct("b").unwrap().source,
            InstinctSource::SequenceDetection
        );
    }

    #[test]
    fn test_bundle_json_without_patterns() {
        let json = format!(
            r#"{{"version":"0.1.0","exported_at":"2025-06-01T00:00:00Z","instincts":[{}]}}"#,
            serde_json::to_string(&instinct("x")).unwrap()
        );
        let bundle: ExportBundle = serde_json::from_str(&json).unwrap();
        assert_eq!(bundle.instincts.len(), 1);
        assert!(bundle.patterns.is_empty());
    }

    #[test]
    fn test_import_nothing_new_does_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::open(dir.path()).unwrap();
        let bundle = storage.export_bundle();
        let report = storage.import_bundle(bundle).unwrap();
        assert_eq!(report, ImportReport::default());
        assert!(!storage.instincts_path().exists());
    }
}
