use std::collections::HashMap;

use indexmap::IndexMap;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::core::db::{
    Building, FunctionalZone, Project, Shutter, ShutterMatch, model::EntityKind, util,
};

// Stored entities keep their child vectors empty; children live in their
// own map and are linked by id.

#[derive(Debug, Clone)]
struct ProjectNode {
    project: Project,
    building_ids: Vec<String>,
}

#[derive(Debug, Clone)]
struct BuildingNode {
    building: Building,
    zone_ids: Vec<String>,
}

#[derive(Debug, Clone)]
struct ZoneNode {
    zone: FunctionalZone,
    shutter_ids: Vec<String>,
}

/// Arena holding every project subtree, indexed by id at each level.
#[derive(Debug, Clone, Default)]
pub(crate) struct Tree {
    projects: IndexMap<String, ProjectNode>,
    buildings: HashMap<String, BuildingNode>,
    zones: HashMap<String, ZoneNode>,
    shutters: HashMap<String, Shutter>,
}

/// Ids removed by one cascading delete.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Removed {
    pub projects: Vec<String>,
    pub buildings: Vec<String>,
    pub zones: Vec<String>,
    pub shutters: Vec<String>,
    pub notes: Vec<String>,
}

impl Removed {
    pub fn note(id: &str) -> Self {
        Self {
            notes: vec![id.to_string()],
            ..Self::default()
        }
    }

    pub fn ids(&self, kind: EntityKind) -> &[String] {
        match kind {
            EntityKind::Project => &self.projects,
            EntityKind::Building => &self.buildings,
            EntityKind::FunctionalZone => &self.zones,
            EntityKind::Shutter => &self.shutters,
            EntityKind::Note => &self.notes,
        }
    }
}

impl Tree {
    /// Build the arena from the persisted nested form. Child records whose
    /// parent reference disagrees with their owner are re-parented.
    pub fn from_projects(projects: Vec<Project>) -> Self {
        let mut tree = Self::default();
        for project in projects {
            tree.insert_project(project);
        }
        tree
    }

    /// Insert a whole project subtree. Returns false if the id is taken.
    pub fn insert_project(&mut self, mut project: Project) -> bool {
        if self.projects.contains_key(&project.id) {
            warn!(project_id = %project.id, "Skipping project with duplicate id");
            return false;
        }
        let buildings = std::mem::take(&mut project.buildings);
        let project_id = project.id.clone();
        self.projects.insert(
            project_id.clone(),
            ProjectNode {
                project,
                building_ids: Vec::new(),
            },
        );
        for building in buildings {
            self.attach_building(&project_id, building);
        }
        true
    }

    /// Append a building subtree to a project. Returns false if the
    /// project is unknown or the building id is taken.
    pub fn attach_building(&mut self, project_id: &str, mut building: Building) -> bool {
        if self.buildings.contains_key(&building.id) {
            warn!(building_id = %building.id, "Skipping building with duplicate id");
            return false;
        }
        let Some(parent) = self.projects.get_mut(project_id) else {
            return false;
        };
        if building.project_id != project_id {
            debug!(building_id = %building.id, "Repairing building parent reference");
            building.project_id = project_id.to_string();
        }
        let zones = std::mem::take(&mut building.functional_zones);
        let building_id = building.id.clone();
        parent.building_ids.push(building_id.clone());
        self.buildings.insert(
            building_id.clone(),
            BuildingNode {
                building,
                zone_ids: Vec::new(),
            },
        );
        for zone in zones {
            self.attach_zone(&building_id, zone);
        }
        true
    }

    pub fn attach_zone(&mut self, building_id: &str, mut zone: FunctionalZone) -> bool {
        if self.zones.contains_key(&zone.id) {
            warn!(zone_id = %zone.id, "Skipping zone with duplicate id");
            return false;
        }
        let Some(parent) = self.buildings.get_mut(building_id) else {
            return false;
        };
        if zone.building_id != building_id {
            debug!(zone_id = %zone.id, "Repairing zone parent reference");
            zone.building_id = building_id.to_string();
        }
        let shutters = std::mem::take(&mut zone.shutters);
        let zone_id = zone.id.clone();
        parent.zone_ids.push(zone_id.clone());
        self.zones.insert(
            zone_id.clone(),
            ZoneNode {
                zone,
                shutter_ids: Vec::new(),
            },
        );
        for shutter in shutters {
            self.attach_shutter(&zone_id, shutter);
        }
        true
    }

    pub fn attach_shutter(&mut self, zone_id: &str, mut shutter: Shutter) -> bool {
        if self.shutters.contains_key(&shutter.id) {
            warn!(shutter_id = %shutter.id, "Skipping shutter with duplicate id");
            return false;
        }
        let Some(parent) = self.zones.get_mut(zone_id) else {
            return false;
        };
        if shutter.zone_id != zone_id {
            debug!(shutter_id = %shutter.id, "Repairing shutter parent reference");
            shutter.zone_id = zone_id.to_string();
        }
        parent.shutter_ids.push(shutter.id.clone());
        self.shutters.insert(shutter.id.clone(), shutter);
        true
    }

    /// Every project with its subtree, in insertion order.
    pub fn projects(&self) -> Vec<Project> {
        self.projects
            .values()
            .map(|node| self.assemble_project(node))
            .collect()
    }

    pub fn project(&self, id: &str) -> Option<Project> {
        self.projects.get(id).map(|node| self.assemble_project(node))
    }

    fn assemble_project(&self, node: &ProjectNode) -> Project {
        let mut project = node.project.clone();
        project.buildings = node
            .building_ids
            .iter()
            .filter_map(|id| self.building(id))
            .collect();
        project
    }

    pub fn building(&self, id: &str) -> Option<Building> {
        let node = self.buildings.get(id)?;
        let mut building = node.building.clone();
        building.functional_zones = node
            .zone_ids
            .iter()
            .filter_map(|id| self.functional_zone(id))
            .collect();
        Some(building)
    }

    pub fn functional_zone(&self, id: &str) -> Option<FunctionalZone> {
        let node = self.zones.get(id)?;
        let mut zone = node.zone.clone();
        zone.shutters = node
            .shutter_ids
            .iter()
            .filter_map(|id| self.shutters.get(id).cloned())
            .collect();
        Some(zone)
    }

    pub fn shutter(&self, id: &str) -> Option<&Shutter> {
        self.shutters.get(id)
    }

    pub fn project_mut(&mut self, id: &str) -> Option<&mut Project> {
        self.projects.get_mut(id).map(|node| &mut node.project)
    }

    pub fn building_mut(&mut self, id: &str) -> Option<&mut Building> {
        self.buildings.get_mut(id).map(|node| &mut node.building)
    }

    pub fn zone_mut(&mut self, id: &str) -> Option<&mut FunctionalZone> {
        self.zones.get_mut(id).map(|node| &mut node.zone)
    }

    pub fn shutter_mut(&mut self, id: &str) -> Option<&mut Shutter> {
        self.shutters.get_mut(id)
    }

    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        match kind {
            EntityKind::Project => self.projects.contains_key(id),
            EntityKind::Building => self.buildings.contains_key(id),
            EntityKind::FunctionalZone => self.zones.contains_key(id),
            EntityKind::Shutter => self.shutters.contains_key(id),
            EntityKind::Note => false,
        }
    }

    /// Id of the project whose subtree holds the entity.
    pub fn owning_project(&self, kind: EntityKind, id: &str) -> Option<String> {
        match kind {
            EntityKind::Project => self.projects.contains_key(id).then(|| id.to_string()),
            EntityKind::Building => self
                .buildings
                .get(id)
                .map(|node| node.building.project_id.clone()),
            EntityKind::FunctionalZone => {
                let building_id = &self.zones.get(id)?.zone.building_id;
                self.owning_project(EntityKind::Building, building_id)
            }
            EntityKind::Shutter => {
                let zone_id = &self.shutters.get(id)?.zone_id;
                self.owning_project(EntityKind::FunctionalZone, zone_id)
            }
            EntityKind::Note => None,
        }
    }

    pub fn touch_project(&mut self, id: &str, at: OffsetDateTime) {
        if let Some(project) = self.project_mut(id) {
            project.updated_at = at;
        }
    }

    /// Detach an entity and everything below it.
    pub fn remove(&mut self, kind: EntityKind, id: &str) -> Option<Removed> {
        let mut removed = Removed::default();
        match kind {
            EntityKind::Project => {
                if !self.projects.contains_key(id) {
                    return None;
                }
                self.drop_project(id, &mut removed);
            }
            EntityKind::Building => {
                let project_id = self.buildings.get(id)?.building.project_id.clone();
                if let Some(parent) = self.projects.get_mut(&project_id) {
                    parent.building_ids.retain(|child| child != id);
                }
                self.drop_building(id, &mut removed);
            }
            EntityKind::FunctionalZone => {
                let building_id = self.zones.get(id)?.zone.building_id.clone();
                if let Some(parent) = self.buildings.get_mut(&building_id) {
                    parent.zone_ids.retain(|child| child != id);
                }
                self.drop_zone(id, &mut removed);
            }
            EntityKind::Shutter => {
                let zone_id = self.shutters.get(id)?.zone_id.clone();
                if let Some(parent) = self.zones.get_mut(&zone_id) {
                    parent.shutter_ids.retain(|child| child != id);
                }
                self.drop_shutter(id, &mut removed);
            }
            EntityKind::Note => return None,
        }
        Some(removed)
    }

    fn drop_project(&mut self, id: &str, removed: &mut Removed) {
        let Some(node) = self.projects.shift_remove(id) else {
            return;
        };
        removed.projects.push(id.to_string());
        for building_id in node.building_ids {
            self.drop_building(&building_id, removed);
        }
    }

    fn drop_building(&mut self, id: &str, removed: &mut Removed) {
        let Some(node) = self.buildings.remove(id) else {
            return;
        };
        removed.buildings.push(id.to_string());
        for zone_id in node.zone_ids {
            self.drop_zone(&zone_id, removed);
        }
    }

    fn drop_zone(&mut self, id: &str, removed: &mut Removed) {
        let Some(node) = self.zones.remove(id) else {
            return;
        };
        removed.zones.push(id.to_string());
        for shutter_id in node.shutter_ids {
            self.drop_shutter(&shutter_id, removed);
        }
    }

    fn drop_shutter(&mut self, id: &str, removed: &mut Removed) {
        if self.shutters.remove(id).is_some() {
            removed.shutters.push(id.to_string());
        }
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }

    pub fn building_count(&self) -> usize {
        self.buildings.len()
    }

    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    pub fn shutter_count(&self) -> usize {
        self.shutters.len()
    }

    /// Walk project → building → zone → shutter in stored order and
    /// collect every shutter matching all tokens.
    pub fn search_shutters(&self, tokens: &[String]) -> Vec<ShutterMatch> {
        let mut hits = Vec::new();
        if tokens.is_empty() {
            return hits;
        }
        for project_node in self.projects.values() {
            let project = &project_node.project;
            for building_node in project_node
                .building_ids
                .iter()
                .filter_map(|id| self.buildings.get(id))
            {
                let building = &building_node.building;
                for zone_node in building_node
                    .zone_ids
                    .iter()
                    .filter_map(|id| self.zones.get(id))
                {
                    let zone = &zone_node.zone;
                    for shutter in zone_node
                        .shutter_ids
                        .iter()
                        .filter_map(|id| self.shutters.get(id))
                    {
                        let fields = [
                            Some(shutter.name.as_str()),
                            Some(zone.name.as_str()),
                            Some(building.name.as_str()),
                            Some(project.name.as_str()),
                            project.city.as_deref(),
                            shutter.remarks.as_deref(),
                        ];
                        if util::matches_all_tokens(tokens, fields) {
                            hits.push(ShutterMatch {
                                shutter: shutter.clone(),
                                zone: zone.clone(),
                                building: building.clone(),
                                project: project.clone(),
                            });
                        }
                    }
                }
            }
        }
        hits
    }
}
