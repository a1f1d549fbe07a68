//! Kometa document generation
//!
//! Renders the collection and overlay YAML files consumed by Kometa. Both
//! documents are regenerated from scratch on every run and written only when
//! their content changes.

use crate::date_format::DateFormatSpec;
use crate::resolver::EligibleShow;
use crate::temp;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// File name of the collection document
pub const COLLECTION_FILE: &str = "UTSK_TV_UPCOMING_SHOWS_COLLECTION.yml";

/// File name of the overlay document
pub const OVERLAY_FILE: &str = "UTSK_TV_UPCOMING_SHOWS_OVERLAYS.yml";

/// Content of the overlay document when nothing is upcoming
const EMPTY_OVERLAY: &str = "#No matching shows found\n";

/// Keys the collection document sets itself; pass-through copies are dropped
const RESERVED_COLLECTION_KEYS: &[&str] = &[
    "summary",
    "sort_title",
    "smart_label",
    "sync_mode",
    "tvdb_show",
];

/// Errors that can occur while rendering or writing a document
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The document could not be serialized
    #[error("Failed to serialize document: {0}")]
    SerializeFailed(#[from] serde_yaml::Error),

    /// The document could not be written to disk
    #[error("Failed to write {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Whether a document on disk was touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStatus {
    Written,
    /// The file already had exactly this content
    Unchanged,
}

/// `collection_upcoming_shows` settings
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSettings {
    /// Collection name, also the label Kometa applies to members
    pub name: String,
    /// Summary template with `{days}` and `{next_premiere}` placeholders
    pub summary: String,
    pub sort_title: Option<String>,
    pub smart_label: String,
    /// Format of `{next_premiere}`
    pub date: DateFormatSpec,
    pub extra: Mapping,
}

/// `backdrop_upcoming_shows` settings
#[derive(Debug, Clone, PartialEq)]
pub struct BackdropSettings {
    pub enable: bool,
    pub extra: Mapping,
}

/// `text_upcoming_shows` settings
#[derive(Debug, Clone, PartialEq)]
pub struct TextSettings {
    pub enable: bool,
    pub date: DateFormatSpec,
    /// Text placed before the date
    pub use_text: String,
    pub capitalize_dates: bool,
    pub extra: Mapping,
}

/// Everything needed to render both documents
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSettings {
    pub future_days: u32,
    pub collection: CollectionSettings,
    pub backdrop: BackdropSettings,
    pub text: TextSettings,
}

/// The two rendered documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Documents {
    pub collection: String,
    pub overlay: String,
}

/// Renders both documents for the given eligible shows
///
/// The shows must already be in resolver order; identical input produces
/// byte-identical output.
pub fn emit(
    shows: &[EligibleShow],
    settings: &DocumentSettings,
) -> Result<Documents, ArtifactError> {
    let shows: Vec<&EligibleShow> = {
        let mut seen = BTreeSet::new();
        shows
            .iter()
            .filter(|entry| entry.show.tvdb_id != 0)
            .filter(|entry| seen.insert(entry.show.tvdb_id))
            .collect()
    };

    Ok(Documents {
        collection: render_collection(&shows, settings)?,
        overlay: render_overlay(&shows, settings)?,
    })
}

fn render_collection(
    shows: &[&EligibleShow],
    settings: &DocumentSettings,
) -> Result<String, ArtifactError> {
    let config = &settings.collection;
    let mut collection = Mapping::new();

    if shows.is_empty() {
        let mut all = Mapping::new();
        all.insert("label".into(), config.name.as_str().into());
        let mut search = Mapping::new();
        search.insert("all".into(), Value::Mapping(all));

        collection.insert("plex_search".into(), Value::Mapping(search));
        collection.insert("item_label.remove".into(), config.name.as_str().into());
        collection.insert("smart_label".into(), config.smart_label.as_str().into());
        collection.insert("build_collection".into(), false.into());
    } else {
        let summary = config
            .summary
            .replace("{days}", &settings.future_days.to_string())
            .replace("{next_premiere}", &config.date.render(shows[0].premiere_date));

        collection.insert("summary".into(), summary.into());
        if let Some(sort_title) = &config.sort_title {
            collection.insert("sort_title".into(), sort_title.as_str().into());
        }
        for (key, value) in &config.extra {
            if key.as_str().is_some_and(|k| RESERVED_COLLECTION_KEYS.contains(&k)) {
                continue;
            }
            collection.insert(key.clone(), value.clone());
        }
        collection.insert("smart_label".into(), config.smart_label.as_str().into());
        collection.insert("sync_mode".into(), "sync".into());
        collection.insert(
            "tvdb_show".into(),
            id_list(shows.iter().map(|e| e.show.tvdb_id)).into(),
        );
    }

    let mut collections = Mapping::new();
    collections.insert(config.name.as_str().into(), Value::Mapping(collection));
    let mut root = Mapping::new();
    root.insert("collections".into(), Value::Mapping(collections));

    Ok(serde_yaml::to_string(&root)?)
}

fn render_overlay(
    shows: &[&EligibleShow],
    settings: &DocumentSettings,
) -> Result<String, ArtifactError> {
    if shows.is_empty() {
        return Ok(EMPTY_OVERLAY.to_string());
    }

    let mut overlays = Mapping::new();

    if settings.backdrop.enable {
        let mut overlay = Mapping::new();
        overlay.insert("name".into(), "backdrop".into());
        extend_without_name(&mut overlay, &settings.backdrop.extra);

        let mut entry = Mapping::new();
        entry.insert("overlay".into(), Value::Mapping(overlay));
        entry.insert(
            "tvdb_show".into(),
            id_list(shows.iter().map(|e| e.show.tvdb_id)).into(),
        );
        overlays.insert("backdrop".into(), Value::Mapping(entry));
    }

    if settings.text.enable {
        let text = &settings.text;
        for entry in shows {
            let mut date = text.date.render(entry.premiere_date);
            if text.capitalize_dates {
                date = date.to_uppercase();
            }

            let mut overlay = Mapping::new();
            overlay.insert(
                "name".into(),
                format!("text({} {})", text.use_text, date).into(),
            );
            extend_without_name(&mut overlay, &text.extra);

            let mut block = Mapping::new();
            block.insert("overlay".into(), Value::Mapping(overlay));
            block.insert("tvdb_show".into(), entry.show.tvdb_id.to_string().into());

            overlays.insert(
                format!("UTSK_{}", entry.show.tvdb_id).into(),
                Value::Mapping(block),
            );
        }
    }

    let mut root = Mapping::new();
    root.insert("overlays".into(), Value::Mapping(overlays));

    Ok(serde_yaml::to_string(&root)?)
}

fn extend_without_name(target: &mut Mapping, extra: &Mapping) {
    for (key, value) in extra {
        if key.as_str() == Some("name") {
            continue;
        }
        target.insert(key.clone(), value.clone());
    }
}

/// Ascending, comma separated ids as Kometa expects them
fn id_list(ids: impl Iterator<Item = u32>) -> String {
    ids.collect::<BTreeSet<_>>()
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Writes a document unless the file already has exactly this content
///
/// The content is written to a hidden sibling file first and renamed over
/// the target, so readers never observe a partially written document.
pub fn write_artifact(path: &Path, contents: &str) -> Result<ArtifactStatus, ArtifactError> {
    if let Ok(existing) = fs::read(path) {
        if existing == contents.as_bytes() {
            debug!(path = %path.display(), "Document unchanged");
            return Ok(ArtifactStatus::Unchanged);
        }
    }

    let write_failed = |source: io::Error| ArtifactError::WriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(write_failed)?;

    let staged = temp::create_temp_file_in(parent, "kometa", "yml").map_err(write_failed)?;
    fs::write(staged.path(), contents).map_err(write_failed)?;
    staged.persist(path).map_err(write_failed)?;

    debug!(path = %path.display(), "Document written");
    Ok(ArtifactStatus::Written)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::trailer::tests::show;
    use chrono::{NaiveDate, TimeZone, Utc};

    pub(crate) fn document_settings() -> DocumentSettings {
        DocumentSettings {
            future_days: 30,
            collection: CollectionSettings {
                name: "Upcoming Shows".to_string(),
                summary: "Shows with their first episode premiering within {days} days".to_string(),
                sort_title: None,
                smart_label: "random".to_string(),
                date: DateFormatSpec::parse("yyyy-mm-dd", None).unwrap(),
                extra: Mapping::new(),
            },
            backdrop: BackdropSettings {
                enable: true,
                extra: Mapping::new(),
            },
            text: TextSettings {
                enable: true,
                date: DateFormatSpec::parse("yyyy-mm-dd", None).unwrap(),
                use_text: "Coming Soon".to_string(),
                capitalize_dates: true,
                extra: Mapping::new(),
            },
        }
    }

    fn eligible(id: u32, title: &str, y: i32, m: u32, d: u32) -> EligibleShow {
        EligibleShow {
            show: show(id, title, Path::new("/tv")),
            premiere: Utc.with_ymd_and_hms(y, m, d, 20, 0, 0).unwrap(),
            premiere_date: NaiveDate::from_ymd_opt(y, m, d).unwrap(),
        }
    }

    fn keys(mapping: &Mapping) -> Vec<&str> {
        mapping.keys().filter_map(Value::as_str).collect()
    }

    fn parse(document: &str) -> Mapping {
        serde_yaml::from_str(document).unwrap()
    }

    #[test]
    fn test_collection_document() {
        let mut settings = document_settings();
        settings.collection.sort_title = Some("+1_Upcoming".to_string());
        settings.collection.summary = "Premieres within {days} days, next on {next_premiere}".to_string();
        settings
            .collection
            .extra
            .insert("visible_home".into(), true.into());
        settings
            .collection
            .extra
            .insert("sync_mode".into(), "append".into());

        // Resolver order: earlier premiere first
        let shows = vec![eligible(2, "Second", 2025, 3, 5), eligible(1, "First", 2025, 3, 10)];
        let documents = emit(&shows, &settings).unwrap();

        let root = parse(&documents.collection);
        let collection = root["collections"]["Upcoming Shows"].as_mapping().unwrap();

        assert_eq!(
            keys(collection),
            vec!["summary", "sort_title", "visible_home", "smart_label", "sync_mode", "tvdb_show"]
        );
        assert_eq!(
            collection["summary"].as_str(),
            Some("Premieres within 30 days, next on 2025-03-05")
        );
        assert_eq!(collection["sort_title"].as_str(), Some("+1_Upcoming"));
        assert_eq!(collection["sync_mode"].as_str(), Some("sync"));
        assert_eq!(collection["tvdb_show"].as_str(), Some("400001, 400002"));
    }

    #[test]
    fn test_empty_collection_removes_label() {
        let documents = emit(&[], &document_settings()).unwrap();

        let root = parse(&documents.collection);
        let collection = root["collections"]["Upcoming Shows"].as_mapping().unwrap();

        assert_eq!(
            keys(collection),
            vec!["plex_search", "item_label.remove", "smart_label", "build_collection"]
        );
        assert_eq!(
            collection["plex_search"]["all"]["label"].as_str(),
            Some("Upcoming Shows")
        );
        assert_eq!(collection["build_collection"].as_bool(), Some(false));
        assert_eq!(documents.overlay, "#No matching shows found\n");
    }

    #[test]
    fn test_overlay_document() {
        let mut settings = document_settings();
        settings.text.date = DateFormatSpec::parse("mmm d", None).unwrap();
        settings.text.extra.insert("font_size".into(), 35.into());
        settings
            .backdrop
            .extra
            .insert("back_color".into(), "#1E1E1E".into());

        let shows = vec![eligible(7, "Early", 2025, 3, 5), eligible(3, "Late", 2025, 3, 10)];
        let documents = emit(&shows, &settings).unwrap();

        let root = parse(&documents.overlay);
        let overlays = root["overlays"].as_mapping().unwrap();

        assert_eq!(keys(overlays), vec!["backdrop", "UTSK_400007", "UTSK_400003"]);

        assert_eq!(overlays["backdrop"]["overlay"]["name"].as_str(), Some("backdrop"));
        assert_eq!(
            overlays["backdrop"]["overlay"]["back_color"].as_str(),
            Some("#1E1E1E")
        );
        assert_eq!(
            overlays["backdrop"]["tvdb_show"].as_str(),
            Some("400003, 400007")
        );

        let early = &overlays["UTSK_400007"];
        assert_eq!(early["overlay"]["name"].as_str(), Some("text(Coming Soon MAR 5)"));
        assert_eq!(early["overlay"]["font_size"].as_u64(), Some(35));
        assert_eq!(early["tvdb_show"].as_str(), Some("400007"));
    }

    #[test]
    fn test_overlay_sections_can_be_disabled() {
        let mut settings = document_settings();
        settings.backdrop.enable = false;
        settings.text.capitalize_dates = false;
        settings.text.date = DateFormatSpec::parse("mmmm d", None).unwrap();

        let documents = emit(&[eligible(1, "Only", 2025, 3, 5)], &settings).unwrap();
        let root = parse(&documents.overlay);
        let overlays = root["overlays"].as_mapping().unwrap();

        assert_eq!(keys(overlays), vec!["UTSK_400001"]);
        assert_eq!(
            overlays["UTSK_400001"]["overlay"]["name"].as_str(),
            Some("text(Coming Soon March 5)")
        );
    }

    #[test]
    fn test_emit_is_deterministic() {
        let shows = vec![eligible(1, "A", 2025, 3, 5), eligible(2, "B", 2025, 3, 6)];
        let first = emit(&shows, &document_settings()).unwrap();
        let second = emit(&shows, &document_settings()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_write_artifact_skips_identical_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Kometa").join(COLLECTION_FILE);

        assert_eq!(write_artifact(&path, "a: 1\n").unwrap(), ArtifactStatus::Written);
        assert_eq!(write_artifact(&path, "a: 1\n").unwrap(), ArtifactStatus::Unchanged);
        assert_eq!(write_artifact(&path, "a: 2\n").unwrap(), ArtifactStatus::Written);

        assert_eq!(fs::read_to_string(&path).unwrap(), "a: 2\n");
        // No staging files are left behind
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 1);
    }
}
