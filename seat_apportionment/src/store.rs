//! Scenario management.
//!
//! Every owner has a book of scenarios. All the changes to a book happen
//! under the book's write lock, so a reader never sees a roster halfway
//! replaced, or two active scenarios.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use uuid::Uuid;

use crate::config::*;

/// The id of the baseline scenario of every owner.
pub const BASE_SCENARIO_ID: &str = "base";
pub const BASE_SCENARIO_NAME: &str = "Base scenario";
const BASE_SCENARIO_DESCRIPTION: &str = "Original state of the party lists";

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioKind {
    Base,
    Simulation,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub kind: ScenarioKind,
    pub electoral_quotient: u64,
    #[serde(default)]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A scenario together with its party lists.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRecord {
    #[serde(flatten)]
    pub scenario: Scenario,
    #[serde(default)]
    pub parties: Vec<Party>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerSnapshot {
    pub owner: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_quotient: Option<u64>,
    #[serde(default)]
    pub scenarios: Vec<ScenarioRecord>,
}

/// The full content of a store, for saving it somewhere.
#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    #[serde(default)]
    pub owners: Vec<OwnerSnapshot>,
}

#[derive(Eq, PartialEq, Debug, Clone, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    #[snafu(display("Invalid value for {field}: {reason}"))]
    Validation { field: String, reason: String },
    #[snafu(display("Scenario {scenario_id} not found for owner {owner}"))]
    ScenarioNotFound { owner: String, scenario_id: String },
    #[snafu(display("Invalid operation on scenario {scenario_id}: {reason}"))]
    InvalidOperation { scenario_id: String, reason: String },
}

#[derive(Debug, Clone)]
struct StoredScenario {
    id: String,
    name: String,
    description: Option<String>,
    kind: ScenarioKind,
    electoral_quotient: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    parties: Vec<Party>,
}

// The active scenario is a pointer rather than a flag on each scenario:
// there can never be two of them.
#[derive(Debug, Clone, Default)]
struct OwnerBook {
    scenarios: Vec<StoredScenario>,
    active: Option<String>,
    default_quotient: Option<u64>,
}

impl OwnerBook {
    fn find(&self, scenario_id: &str) -> Option<&StoredScenario> {
        self.scenarios.iter().find(|s| s.id == scenario_id)
    }

    fn find_mut(&mut self, scenario_id: &str) -> Option<&mut StoredScenario> {
        self.scenarios.iter_mut().find(|s| s.id == scenario_id)
    }

    fn scenario(&self, s: &StoredScenario) -> Scenario {
        Scenario {
            id: s.id.clone(),
            name: s.name.clone(),
            description: s.description.clone(),
            kind: s.kind,
            electoral_quotient: s.electoral_quotient,
            active: self.active.as_deref() == Some(s.id.as_str()),
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }

    fn record(&self, s: &StoredScenario) -> ScenarioRecord {
        ScenarioRecord {
            scenario: self.scenario(s),
            parties: s.parties.clone(),
        }
    }

    // Base first, then the most recent ones.
    fn sorted(&self) -> Vec<Scenario> {
        let mut res: Vec<Scenario> = self.scenarios.iter().map(|s| self.scenario(s)).collect();
        res.sort_by(|a, b| {
            let a_base = a.id == BASE_SCENARIO_ID;
            let b_base = b.id == BASE_SCENARIO_ID;
            b_base.cmp(&a_base).then(b.created_at.cmp(&a.created_at))
        });
        res
    }

    fn active_record(&self) -> Option<ScenarioRecord> {
        let active = self.active.as_deref().and_then(|id| self.find(id));
        active
            .or_else(|| self.find(BASE_SCENARIO_ID))
            .map(|s| self.record(s))
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = format!("sim-{}", Uuid::new_v4().simple());
            if id != BASE_SCENARIO_ID && self.find(&id).is_none() {
                return id;
            }
        }
    }
}

fn validate_quotient(electoral_quotient: u64) -> Result<(), StoreError> {
    ensure!(
        electoral_quotient > 0,
        ValidationSnafu {
            field: "electoralQuotient",
            reason: "the electoral quotient must be positive",
        }
    );
    Ok(())
}

fn validate_roster(parties: &[Party]) -> Result<(), StoreError> {
    for (idx, p) in parties.iter().enumerate() {
        ensure!(
            !p.name.trim().is_empty(),
            ValidationSnafu {
                field: format!("parties[{}].name", idx),
                reason: "party names may not be empty",
            }
        );
        ensure!(
            !parties[..idx]
                .iter()
                .any(|other| other.name.to_lowercase() == p.name.to_lowercase()),
            ValidationSnafu {
                field: format!("parties[{}].name", idx),
                reason: format!(
                    "party {} appears more than once (names are compared ignoring case)",
                    p.name
                ),
            }
        );
        for (cidx, c) in p.candidates.iter().enumerate() {
            ensure!(
                !c.name.trim().is_empty(),
                ValidationSnafu {
                    field: format!("parties[{}].candidates[{}].name", idx, cidx),
                    reason: "candidate names may not be empty",
                }
            );
        }
    }
    Ok(())
}

/// Owns the scenarios of all the owners.
///
/// The store is meant to be shared between threads behind an `Arc`.
#[derive(Debug, Default)]
pub struct ScenarioStore {
    owners: RwLock<HashMap<String, Arc<RwLock<OwnerBook>>>>,
}

impl ScenarioStore {
    pub fn new() -> ScenarioStore {
        ScenarioStore::default()
    }

    fn book(&self, owner: &str) -> Option<Arc<RwLock<OwnerBook>>> {
        self.owners.read().get(owner).cloned()
    }

    fn book_or_insert(&self, owner: &str) -> Arc<RwLock<OwnerBook>> {
        if let Some(book) = self.book(owner) {
            return book;
        }
        self.owners
            .write()
            .entry(owner.to_string())
            .or_default()
            .clone()
    }

    // Runs a change under the write lock of the owner. The owner is created
    // if needed.
    fn write_book_or_insert<T>(
        &self,
        owner: &str,
        f: impl FnOnce(&mut OwnerBook) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let book = self.book_or_insert(owner);
        let mut guard = book.write();
        f(&mut guard)
    }

    // Runs a change on the scenarios of a known owner. An unknown owner has
    // no `scenario_id` and is left out of the store.
    fn write_book<T>(
        &self,
        owner: &str,
        scenario_id: &str,
        f: impl FnOnce(&mut OwnerBook) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let book = self.book(owner).context(ScenarioNotFoundSnafu {
            owner,
            scenario_id,
        })?;
        let mut guard = book.write();
        f(&mut guard)
    }

    fn read_book<T>(&self, owner: &str, f: impl FnOnce(&OwnerBook) -> T) -> Option<T> {
        let book = self.book(owner)?;
        let guard = book.read();
        Some(f(&guard))
    }

    /// Creates or replaces the base scenario of the owner, and makes it the
    /// active scenario.
    pub fn create_base(
        &self,
        owner: &str,
        parties: Vec<Party>,
        electoral_quotient: u64,
    ) -> Result<String, StoreError> {
        validate_quotient(electoral_quotient)?;
        validate_roster(&parties)?;
        let now = Utc::now();
        info!(
            "create_base: owner {:?}: {:?} parties, quotient {:?}",
            owner,
            parties.len(),
            electoral_quotient
        );
        self.write_book_or_insert(owner, |book| {
            match book.find_mut(BASE_SCENARIO_ID) {
                Some(base) => {
                    base.name = BASE_SCENARIO_NAME.to_string();
                    base.description = Some(BASE_SCENARIO_DESCRIPTION.to_string());
                    base.electoral_quotient = electoral_quotient;
                    base.parties = parties;
                    base.updated_at = now;
                }
                None => {
                    book.scenarios.push(StoredScenario {
                        id: BASE_SCENARIO_ID.to_string(),
                        name: BASE_SCENARIO_NAME.to_string(),
                        description: Some(BASE_SCENARIO_DESCRIPTION.to_string()),
                        kind: ScenarioKind::Base,
                        electoral_quotient,
                        created_at: now,
                        updated_at: now,
                        parties,
                    });
                }
            }
            book.active = Some(BASE_SCENARIO_ID.to_string());
            Ok(BASE_SCENARIO_ID.to_string())
        })
    }

    /// Creates a simulation scenario as a copy of an existing one.
    /// The new scenario is not active.
    pub fn clone_scenario(
        &self,
        owner: &str,
        name: &str,
        description: Option<&str>,
        source_id: &str,
    ) -> Result<String, StoreError> {
        ensure!(
            !name.trim().is_empty(),
            ValidationSnafu {
                field: "name",
                reason: "scenario names may not be empty",
            }
        );
        let now = Utc::now();
        self.write_book(owner, source_id, |book| {
            let source = book.find(source_id).context(ScenarioNotFoundSnafu {
                owner,
                scenario_id: source_id,
            })?;
            let id = book.fresh_id();
            let copy = StoredScenario {
                id: id.clone(),
                name: name.to_string(),
                description: description.map(|s| s.to_string()),
                kind: ScenarioKind::Simulation,
                electoral_quotient: source.electoral_quotient,
                created_at: now,
                updated_at: now,
                parties: source.parties.clone(),
            };
            info!(
                "clone_scenario: owner {:?}: {:?} -> {:?} ({:?} parties)",
                owner,
                source_id,
                id,
                copy.parties.len()
            );
            book.scenarios.push(copy);
            Ok(id)
        })
    }

    /// Replaces the roster and the quotient of a scenario.
    ///
    /// The scenario also becomes the active scenario of the owner.
    pub fn update(
        &self,
        owner: &str,
        scenario_id: &str,
        parties: Vec<Party>,
        electoral_quotient: u64,
    ) -> Result<(), StoreError> {
        validate_quotient(electoral_quotient)?;
        validate_roster(&parties)?;
        let now = Utc::now();
        self.write_book(owner, scenario_id, |book| {
            let s = book.find_mut(scenario_id).context(ScenarioNotFoundSnafu {
                owner,
                scenario_id,
            })?;
            debug!(
                "update: owner {:?}: scenario {:?}: {:?} -> {:?} parties",
                owner,
                scenario_id,
                s.parties.len(),
                parties.len()
            );
            s.parties = parties;
            s.electoral_quotient = electoral_quotient;
            s.updated_at = now;
            book.active = Some(scenario_id.to_string());
            Ok(())
        })
    }

    /// Deletes a scenario and its roster. The base scenario cannot be deleted.
    pub fn delete(&self, owner: &str, scenario_id: &str) -> Result<(), StoreError> {
        ensure!(
            scenario_id != BASE_SCENARIO_ID,
            InvalidOperationSnafu {
                scenario_id,
                reason: "the base scenario cannot be deleted",
            }
        );
        self.write_book(owner, scenario_id, |book| {
            let idx = book
                .scenarios
                .iter()
                .position(|s| s.id == scenario_id)
                .context(ScenarioNotFoundSnafu {
                    owner,
                    scenario_id,
                })?;
            let removed = book.scenarios.remove(idx);
            if book.active.as_deref() == Some(scenario_id) {
                book.active = None;
            }
            info!(
                "delete: owner {:?}: removed scenario {:?} and its {:?} parties",
                owner,
                scenario_id,
                removed.parties.len()
            );
            Ok(())
        })
    }

    /// Activates or deactivates a scenario. Activating a scenario
    /// deactivates all the others of the same owner.
    pub fn set_active(&self, owner: &str, scenario_id: &str, active: bool) -> Result<(), StoreError> {
        let now = Utc::now();
        self.write_book(owner, scenario_id, |book| {
            ensure!(
                book.find(scenario_id).is_some(),
                ScenarioNotFoundSnafu {
                    owner,
                    scenario_id,
                }
            );
            let previous = book.active.clone();
            if active {
                book.active = Some(scenario_id.to_string());
            } else if previous.as_deref() == Some(scenario_id) {
                book.active = None;
            }
            if previous != book.active {
                for s in book.scenarios.iter_mut() {
                    if previous.as_deref() == Some(s.id.as_str()) || s.id == scenario_id {
                        s.updated_at = now;
                    }
                }
            }
            debug!(
                "set_active: owner {:?}: active scenario {:?} -> {:?}",
                owner, previous, book.active
            );
            Ok(())
        })
    }

    /// The active scenario of the owner, or its base scenario if none is active.
    /// Returns `None` if the owner has neither.
    pub fn get_active(&self, owner: &str) -> Option<ScenarioRecord> {
        self.read_book(owner, |book| book.active_record()).flatten()
    }

    pub fn get(&self, owner: &str, scenario_id: &str) -> Result<ScenarioRecord, StoreError> {
        self.read_book(owner, |book| book.find(scenario_id).map(|s| book.record(s)))
            .flatten()
            .context(ScenarioNotFoundSnafu {
                owner,
                scenario_id,
            })
    }

    pub fn roster(&self, owner: &str, scenario_id: &str) -> Result<Vec<Party>, StoreError> {
        self.get(owner, scenario_id).map(|r| r.parties)
    }

    /// All the scenarios of the owner, the base scenario first.
    pub fn list(&self, owner: &str) -> Vec<Scenario> {
        self.read_book(owner, |book| book.sorted())
            .unwrap_or_default()
    }

    /// The scenarios and the active scenario, read together.
    pub fn list_with_active(&self, owner: &str) -> (Vec<Scenario>, Option<ScenarioRecord>) {
        self.read_book(owner, |book| (book.sorted(), book.active_record()))
            .unwrap_or_default()
    }

    pub fn has_scenarios(&self, owner: &str) -> bool {
        self.read_book(owner, |book| !book.scenarios.is_empty())
            .unwrap_or(false)
    }

    /// Saves the quotient used for new scenarios of this owner.
    pub fn set_default_quotient(&self, owner: &str, electoral_quotient: u64) -> Result<(), StoreError> {
        validate_quotient(electoral_quotient)?;
        self.write_book_or_insert(owner, |book| {
            book.default_quotient = Some(electoral_quotient);
            Ok(())
        })
    }

    pub fn default_quotient(&self, owner: &str) -> Option<u64> {
        self.read_book(owner, |book| book.default_quotient).flatten()
    }

    pub fn owners(&self) -> Vec<String> {
        let mut res: Vec<String> = self.owners.read().keys().cloned().collect();
        res.sort();
        res
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let owners = self
            .owners()
            .iter()
            .filter_map(|owner| {
                self.read_book(owner, |book| OwnerSnapshot {
                    owner: owner.clone(),
                    default_quotient: book.default_quotient,
                    scenarios: book.scenarios.iter().map(|s| book.record(s)).collect(),
                })
            })
            .collect();
        StoreSnapshot { owners }
    }

    /// Rebuilds a store from a snapshot.
    ///
    /// If several scenarios of an owner are marked active, the first one
    /// stays active.
    pub fn restore(snapshot: &StoreSnapshot) -> Result<ScenarioStore, StoreError> {
        let mut owners: HashMap<String, Arc<RwLock<OwnerBook>>> = HashMap::new();
        for os in snapshot.owners.iter() {
            ensure!(
                !owners.contains_key(&os.owner),
                ValidationSnafu {
                    field: "owners.owner",
                    reason: format!("owner {} appears more than once", os.owner),
                }
            );
            if let Some(q) = os.default_quotient {
                validate_quotient(q)?;
            }
            let mut book = OwnerBook {
                default_quotient: os.default_quotient,
                ..OwnerBook::default()
            };
            for rec in os.scenarios.iter() {
                let s = &rec.scenario;
                validate_quotient(s.electoral_quotient)?;
                validate_roster(&rec.parties)?;
                ensure!(
                    book.find(&s.id).is_none(),
                    ValidationSnafu {
                        field: "scenarios.id",
                        reason: format!("scenario {} appears more than once", s.id),
                    }
                );
                let is_base = s.id == BASE_SCENARIO_ID;
                ensure!(
                    !is_base || s.kind == ScenarioKind::Base,
                    InvalidOperationSnafu {
                        scenario_id: s.id.clone(),
                        reason: "the base scenario must be of kind base",
                    }
                );
                ensure!(
                    is_base || s.kind == ScenarioKind::Simulation,
                    ValidationSnafu {
                        field: "scenarios.kind",
                        reason: format!("only the base scenario may be of kind base, not {}", s.id),
                    }
                );
                if s.active {
                    if let Some(current) = book.active.as_ref() {
                        warn!(
                            "restore: owner {:?}: scenario {:?} is also marked active, keeping {:?}",
                            os.owner, s.id, current
                        );
                    } else {
                        book.active = Some(s.id.clone());
                    }
                }
                book.scenarios.push(StoredScenario {
                    id: s.id.clone(),
                    name: s.name.clone(),
                    description: s.description.clone(),
                    kind: s.kind,
                    electoral_quotient: s.electoral_quotient,
                    created_at: s.created_at,
                    updated_at: s.updated_at,
                    parties: rec.parties.clone(),
                });
            }
            owners.insert(os.owner.clone(), Arc::new(RwLock::new(book)));
        }
        Ok(ScenarioStore {
            owners: RwLock::new(owners),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use std::thread;

    const OWNER: &str = "campaign-1";

    fn roster() -> Vec<Party> {
        Builder::new()
            .party("PT")
            .and_then(|b| b.candidate("ZÉ", 120000))
            .and_then(|b| b.candidate("F COSTA", 120000))
            .and_then(|b| b.party("REPUBLICANOS"))
            .and_then(|b| b.candidate("JADYEL", 120000))
            .and_then(|b| b.candidate("CHARLES", 40000))
            .unwrap()
            .build()
    }

    fn store_with_base() -> ScenarioStore {
        let store = ScenarioStore::new();
        store.create_base(OWNER, roster(), 190000).unwrap();
        store
    }

    fn active_count(store: &ScenarioStore) -> usize {
        store.list(OWNER).iter().filter(|s| s.active).count()
    }

    #[test]
    fn create_base_is_an_upsert() {
        let store = store_with_base();
        let first = store.get(OWNER, BASE_SCENARIO_ID).unwrap();
        assert_eq!(first.scenario.kind, ScenarioKind::Base);
        assert!(first.scenario.active);

        let smaller = roster().into_iter().take(1).collect();
        store.create_base(OWNER, smaller, 200000).unwrap();
        let second = store.get(OWNER, BASE_SCENARIO_ID).unwrap();
        assert_eq!(store.list(OWNER).len(), 1);
        assert_eq!(second.parties.len(), 1);
        assert_eq!(second.scenario.electoral_quotient, 200000);
        assert_eq!(second.scenario.created_at, first.scenario.created_at);
    }

    #[test]
    fn clone_is_independent() {
        let store = store_with_base();
        let id = store
            .clone_scenario(OWNER, "Strong PT", Some("What if"), BASE_SCENARIO_ID)
            .unwrap();
        assert_ne!(id, BASE_SCENARIO_ID);
        let copy = store.get(OWNER, &id).unwrap();
        assert_eq!(copy.scenario.kind, ScenarioKind::Simulation);
        assert!(!copy.scenario.active);
        assert_eq!(copy.parties, roster());

        let mut changed = copy.parties.clone();
        changed[0].candidates[0].votes = 500000;
        store.update(OWNER, &id, changed, 150000).unwrap();

        let base = store.get(OWNER, BASE_SCENARIO_ID).unwrap();
        assert_eq!(base.parties, roster());
        assert_eq!(base.scenario.electoral_quotient, 190000);
    }

    #[test]
    fn clone_unknown_source() {
        let store = store_with_base();
        let res = store.clone_scenario(OWNER, "x", None, "nope");
        assert_eq!(
            res,
            Err(StoreError::ScenarioNotFound {
                owner: OWNER.to_string(),
                scenario_id: "nope".to_string()
            })
        );
        assert_eq!(store.list(OWNER).len(), 1);
    }

    #[test]
    fn update_activates_the_scenario() {
        let store = store_with_base();
        let a = store.clone_scenario(OWNER, "A", None, BASE_SCENARIO_ID).unwrap();
        let b = store.clone_scenario(OWNER, "B", None, BASE_SCENARIO_ID).unwrap();
        store.update(OWNER, &b, roster(), 190000).unwrap();
        assert_eq!(store.get_active(OWNER).unwrap().scenario.id, b);
        assert_eq!(active_count(&store), 1);
        store.update(OWNER, &a, roster(), 190000).unwrap();
        assert_eq!(store.get_active(OWNER).unwrap().scenario.id, a);
        assert_eq!(active_count(&store), 1);
    }

    #[test]
    fn update_validates_before_writing() {
        let store = store_with_base();
        let mut bad = roster();
        bad[1].name = "PT".to_string();
        let res = store.update(OWNER, BASE_SCENARIO_ID, bad, 190000);
        assert!(matches!(res, Err(StoreError::Validation { field, .. }) if field == "parties[1].name"));
        let res = store.update(OWNER, BASE_SCENARIO_ID, roster(), 0);
        assert!(matches!(res, Err(StoreError::Validation { field, .. }) if field == "electoralQuotient"));
        assert_eq!(store.get(OWNER, BASE_SCENARIO_ID).unwrap().parties, roster());
    }

    #[test]
    fn delete_cascades() {
        let store = store_with_base();
        let id = store.clone_scenario(OWNER, "A", None, BASE_SCENARIO_ID).unwrap();
        store.set_active(OWNER, &id, true).unwrap();
        store.delete(OWNER, &id).unwrap();
        assert!(matches!(
            store.roster(OWNER, &id),
            Err(StoreError::ScenarioNotFound { .. })
        ));
        // Nothing is active anymore: reads fall back to the base.
        assert_eq!(active_count(&store), 0);
        assert_eq!(store.get_active(OWNER).unwrap().scenario.id, BASE_SCENARIO_ID);
        assert!(matches!(
            store.delete(OWNER, &id),
            Err(StoreError::ScenarioNotFound { .. })
        ));
    }

    #[test]
    fn base_cannot_be_deleted() {
        let store = store_with_base();
        let before = store.snapshot();
        let res = store.delete(OWNER, BASE_SCENARIO_ID);
        assert!(matches!(res, Err(StoreError::InvalidOperation { .. })));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn single_active_scenario() {
        let store = store_with_base();
        let a = store.clone_scenario(OWNER, "A", None, BASE_SCENARIO_ID).unwrap();
        let b = store.clone_scenario(OWNER, "B", None, BASE_SCENARIO_ID).unwrap();
        store.set_active(OWNER, &a, true).unwrap();
        assert_eq!(store.get_active(OWNER).unwrap().scenario.id, a);
        assert_eq!(active_count(&store), 1);
        store.set_active(OWNER, &b, true).unwrap();
        assert_eq!(store.get_active(OWNER).unwrap().scenario.id, b);
        assert_eq!(active_count(&store), 1);

        // Deactivating another scenario changes nothing.
        store.set_active(OWNER, &a, false).unwrap();
        assert_eq!(store.get_active(OWNER).unwrap().scenario.id, b);
        store.set_active(OWNER, &b, false).unwrap();
        assert_eq!(active_count(&store), 0);
        assert_eq!(store.get_active(OWNER).unwrap().scenario.id, BASE_SCENARIO_ID);

        assert!(matches!(
            store.set_active(OWNER, "nope", true),
            Err(StoreError::ScenarioNotFound { .. })
        ));
    }

    #[test]
    fn base_is_listed_first() {
        let store = store_with_base();
        store.clone_scenario(OWNER, "A", None, BASE_SCENARIO_ID).unwrap();
        store.clone_scenario(OWNER, "B", None, BASE_SCENARIO_ID).unwrap();
        let list = store.list(OWNER);
        assert_eq!(list.len(), 3);
        assert_eq!(list[0].id, BASE_SCENARIO_ID);
        let (list2, active) = store.list_with_active(OWNER);
        assert_eq!(list, list2);
        assert_eq!(active.unwrap().scenario.id, BASE_SCENARIO_ID);
    }

    #[test]
    fn unknown_owner() {
        let store = store_with_base();
        assert!(store.get_active("other").is_none());
        assert!(store.list("other").is_empty());
        assert!(!store.has_scenarios("other"));
        assert!(store.has_scenarios(OWNER));
    }

    #[test]
    fn failed_changes_do_not_create_owners() {
        let store = ScenarioStore::new();
        let missing = |res: Result<(), StoreError>| {
            matches!(res, Err(StoreError::ScenarioNotFound { owner, .. }) if owner == "ghost")
        };
        assert!(missing(
            store
                .clone_scenario("ghost", "A", None, BASE_SCENARIO_ID)
                .map(|_| ())
        ));
        assert!(missing(store.update("ghost", BASE_SCENARIO_ID, roster(), 190000)));
        assert!(missing(store.delete("ghost", "sim-1")));
        assert!(missing(store.set_active("ghost", BASE_SCENARIO_ID, true)));
        assert!(store.owners().is_empty());
        assert!(store.snapshot().owners.is_empty());

        // Creating the base still registers the owner.
        store.create_base("ghost", roster(), 190000).unwrap();
        assert_eq!(store.owners(), vec!["ghost".to_string()]);
    }

    #[test]
    fn party_names_differing_by_case_are_rejected() {
        let store = store_with_base();
        let mut bad = roster();
        bad[1].name = "pt".to_string();
        let res = store.update(OWNER, BASE_SCENARIO_ID, bad.clone(), 190000);
        assert!(matches!(res, Err(StoreError::Validation { field, .. }) if field == "parties[1].name"));
        let res = ScenarioStore::new().create_base(OWNER, bad, 190000);
        assert!(matches!(res, Err(StoreError::Validation { .. })));
        assert_eq!(store.get(OWNER, BASE_SCENARIO_ID).unwrap().parties, roster());
    }

    #[test]
    fn owners_are_isolated() {
        let store = store_with_base();
        store.create_base("other", vec![], 100000).unwrap();
        let id = store.clone_scenario("other", "A", None, BASE_SCENARIO_ID).unwrap();
        store.set_active("other", &id, true).unwrap();
        assert_eq!(store.get_active(OWNER).unwrap().scenario.id, BASE_SCENARIO_ID);
        assert!(store.get(OWNER, &id).is_err());
    }

    #[test]
    fn default_quotient_setting() {
        let store = ScenarioStore::new();
        assert_eq!(store.default_quotient(OWNER), None);
        store.set_default_quotient(OWNER, 185000).unwrap();
        assert_eq!(store.default_quotient(OWNER), Some(185000));
        assert!(store.set_default_quotient(OWNER, 0).is_err());
        // Settings alone do not make scenarios.
        assert!(!store.has_scenarios(OWNER));
    }

    #[test]
    fn restore_keeps_the_first_active_scenario() {
        let _ = env_logger::try_init();
        let store = store_with_base();
        let a = store.clone_scenario(OWNER, "A", None, BASE_SCENARIO_ID).unwrap();
        let mut snap = store.snapshot();
        // Mark everything as active.
        for rec in snap.owners[0].scenarios.iter_mut() {
            rec.scenario.active = true;
        }
        let restored = ScenarioStore::restore(&snap).unwrap();
        assert_eq!(
            restored.get_active(OWNER).unwrap().scenario.id,
            BASE_SCENARIO_ID
        );
        assert_eq!(
            restored.list(OWNER).iter().filter(|s| s.active).count(),
            1
        );
        assert!(restored.get(OWNER, &a).is_ok());
    }

    #[test]
    fn restore_rejects_a_simulation_base() {
        let store = store_with_base();
        let mut snap = store.snapshot();
        snap.owners[0].scenarios[0].scenario.kind = ScenarioKind::Simulation;
        assert!(matches!(
            ScenarioStore::restore(&snap),
            Err(StoreError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn concurrent_readers_never_see_partial_updates() {
        let store = Arc::new(store_with_base());
        let ids: Vec<String> = (0..3)
            .map(|i| {
                store
                    .clone_scenario(OWNER, &format!("S{}", i), None, BASE_SCENARIO_ID)
                    .unwrap()
            })
            .collect();

        let writer = {
            let store = store.clone();
            let ids = ids.clone();
            thread::spawn(move || {
                for round in 0..200 {
                    let id = &ids[round % ids.len()];
                    store.update(OWNER, id, roster(), 190000).unwrap();
                    store.set_active(OWNER, id, true).unwrap();
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..200 {
                        let (list, active) = store.list_with_active(OWNER);
                        let n_active = list.iter().filter(|s| s.active).count();
                        assert!(n_active <= 1);
                        let active = active.unwrap();
                        assert_eq!(active.parties.len(), 2);
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(active_count(&store), 1);
    }
}
