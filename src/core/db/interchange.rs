//! `.calcprojet` files: one project subtree plus the notes that mention it,
//! moved between devices as JSON.

use std::{future::Future, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use tokio::fs as async_fs;

use crate::core::db::{Note, Project, note::retain_valid_images, util};

pub const INTERCHANGE_VERSION: &str = "1.0";
pub const INTERCHANGE_EXTENSION: &str = "calcprojet";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectExport {
    pub version: String,
    pub project: Project,
    #[serde(default)]
    pub related_notes: Vec<Note>,
}

impl ProjectExport {
    pub fn new(project: Project, related_notes: Vec<Note>) -> Self {
        Self {
            version: INTERCHANGE_VERSION.to_string(),
            project,
            related_notes,
        }
    }

    /// Parse an interchange document, with a readable reason on rejection.
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let value: Value = serde_json::from_str(text).context("File is not valid JSON")?;
        let Some(document) = value.as_object() else {
            anyhow::bail!("File does not contain a project export object");
        };
        match document.get("version") {
            Some(Value::String(version)) if !version.trim().is_empty() => {}
            _ => anyhow::bail!("Project export has no version"),
        }
        if !document.get("project").is_some_and(Value::is_object) {
            anyhow::bail!("Project export has no project");
        }
        serde_json::from_value(value).context("Project export has an invalid structure")
    }

    /// `<project name>.calcprojet` with path separators and other unsafe
    /// characters replaced, so it always names a file in the current
    /// directory. Falls back to the project id when nothing usable is left.
    pub fn default_file_name(&self) -> String {
        let stem: String = self
            .project
            .name
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let stem = stem.trim();
        let stem = if stem.chars().any(char::is_alphanumeric) {
            stem
        } else {
            self.project.id.as_str()
        };
        format!("{}.{}", stem, INTERCHANGE_EXTENSION)
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize project export")
    }

    pub async fn read_from<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = async_fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read project export {:?}", path))?;
        Self::from_json(&text).with_context(|| format!("Rejected project export {:?}", path))
    }

    pub async fn write_to<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        async_fs::write(path, self.to_json()?)
            .await
            .with_context(|| format!("Failed to write project export {:?}", path))
    }
}

/// What an import added to the store, under the new ids.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedProject {
    pub project: Project,
    pub notes: Vec<Note>,
}

pub trait InterchangeRepository {
    /// Project subtree plus every note whose title, content, location or
    /// tags mention the project or one of its buildings, zones or shutters.
    fn export_project(&self, project_id: &str) -> Option<ProjectExport>;
    /// Append a copy of the exported project under fresh ids at every
    /// level, then its notes. Not atomic: if the notes fail to persist the
    /// project stays imported.
    fn try_import_project(
        &self,
        export: ProjectExport,
    ) -> impl Future<Output = anyhow::Result<ImportedProject>>;
    /// Same as [`InterchangeRepository::try_import_project`], reporting
    /// failure as `false`.
    fn import_project(&self, export: ProjectExport) -> impl Future<Output = bool>;
}

/// Deep copy under new ids, parent references rewired to the new ids.
pub(crate) fn reassign_ids(mut project: Project, now: OffsetDateTime) -> Project {
    project.id = util::new_id();
    project.updated_at = now;
    for building in &mut project.buildings {
        building.id = util::new_id();
        building.project_id = project.id.clone();
        for zone in &mut building.functional_zones {
            zone.id = util::new_id();
            zone.building_id = building.id.clone();
            for shutter in &mut zone.shutters {
                shutter.id = util::new_id();
                shutter.zone_id = zone.id.clone();
            }
        }
    }
    project
}

pub(crate) fn reassign_note_id(mut note: Note, now: OffsetDateTime) -> Note {
    note.id = util::new_id();
    note.updated_at = now;
    note.images = note.images.map(retain_valid_images);
    note
}

pub(crate) fn select_related_notes(project: &Project, notes: &[Note]) -> Vec<Note> {
    let mut names = vec![project.name.to_lowercase()];
    for building in &project.buildings {
        names.push(building.name.to_lowercase());
        for zone in &building.functional_zones {
            names.push(zone.name.to_lowercase());
            names.extend(zone.shutters.iter().map(|s| s.name.to_lowercase()));
        }
    }
    names.retain(|name| !name.trim().is_empty());

    notes
        .iter()
        .filter(|note| {
            note.text_fields().any(|field| {
                let field = field.to_lowercase();
                names.iter().any(|name| field.contains(name.as_str()))
            })
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_documents_without_version_or_project() {
        let err = ProjectExport::from_json("[1, 2]").unwrap_err();
        assert!(err.to_string().contains("project export object"));

        let err = ProjectExport::from_json(r#"{"project": {"id": "p", "name": "P"}}"#).unwrap_err();
        assert!(err.to_string().contains("no version"));

        let err = ProjectExport::from_json(r#"{"version": "1.0"}"#).unwrap_err();
        assert!(err.to_string().contains("no project"));

        let err = ProjectExport::from_json("{not json").unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[test]
    fn parses_minimal_document() {
        let export = ProjectExport::from_json(
            r#"{
                "version": "1.0",
                "project": {
                    "id": "p",
                    "name": "Tour",
                    "createdAt": "2024-05-01T08:00:00.000Z",
                    "buildings": [{
                        "id": "b",
                        "projectId": "p",
                        "name": "A",
                        "functionalZones": [{
                            "id": "z",
                            "buildingId": "b",
                            "name": "Hall",
                            "shutters": [{
                                "id": "s",
                                "zoneId": "z",
                                "name": "V1",
                                "type": "low",
                                "referenceFlow": 5000,
                                "measuredFlow": 4800
                            }]
                        }]
                    }]
                }
            }"#,
        )
        .unwrap();
        assert!(export.related_notes.is_empty());
        let shutter = &export.project.buildings[0].functional_zones[0].shutters[0];
        assert_eq!(shutter.shutter_type, crate::core::db::ShutterType::Low);
        assert_eq!(shutter.measured_flow, 4800.0);
    }

    fn named(name: &str) -> ProjectExport {
        ProjectExport::from_json(&format!(
            r#"{{"version": "1.0", "project": {{"id": "p-42", "name": {}}}}}"#,
            serde_json::to_string(name).unwrap()
        ))
        .unwrap()
    }

    #[test]
    fn default_file_name_stays_in_current_directory() {
        assert_eq!(named("Résidence Les Tilleuls").default_file_name(), "Résidence Les Tilleuls.calcprojet");
        assert_eq!(named("../../etc/passwd").default_file_name(), "______etc_passwd.calcprojet");
        assert_eq!(named("Bloc A/B").default_file_name(), "Bloc A_B.calcprojet");
        assert_eq!(named("..").default_file_name(), "p-42.calcprojet");
        assert_eq!(named("  ").default_file_name(), "p-42.calcprojet");
        for name in ["../x", "a\\b", "/abs"] {
            let file_name = named(name).default_file_name();
            assert_eq!(std::path::Path::new(&file_name).components().count(), 1);
        }
    }

    #[test]
    fn reassigned_ids_are_fresh_and_linked() {
        let export = ProjectExport::from_json(
            r#"{"version":"1.0","project":{"id":"p","name":"Tour","buildings":[
                {"id":"b","projectId":"p","name":"A","functionalZones":[
                    {"id":"z","buildingId":"b","name":"Hall","shutters":[
                        {"id":"s","zoneId":"z","name":"V1","type":"high"}]}]}]}}"#,
        )
        .unwrap();
        let copy = reassign_ids(export.project, util::now());
        let building = &copy.buildings[0];
        let zone = &building.functional_zones[0];
        let shutter = &zone.shutters[0];
        assert_ne!(copy.id, "p");
        assert_ne!(building.id, "b");
        assert_ne!(zone.id, "z");
        assert_ne!(shutter.id, "s");
        assert_eq!(building.project_id, copy.id);
        assert_eq!(zone.building_id, building.id);
        assert_eq!(shutter.zone_id, zone.id);
        assert_eq!(shutter.name, "V1");
    }
}
