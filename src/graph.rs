use std::collections::{BTreeMap, HashMap, HashSet};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::descendants::descendants;
use crate::error::{GraphError, GraphResult};

pub const DEFAULT_TYPE_TAG: &str = "company";

/// A company or team in the ownership graph.
///
/// `parent_ids[0]` is the primary parent used for the tree layout; every
/// later entry is a secondary parent drawn as an extra edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default = "default_type_tag")]
    pub type_tag: String,
    #[serde(default, deserialize_with = "id_list")]
    pub parent_ids: Vec<String>,
    /// Percentage held by each parent. Informational only.
    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "ownership_map"
    )]
    pub parent_ownership: BTreeMap<String, f64>,
}

impl Company {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            type_tag: default_type_tag(),
            parent_ids: Vec::new(),
            parent_ownership: BTreeMap::new(),
        }
    }

    pub fn with_parents<I, S>(mut self, parents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parent_ids = parents.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_type(mut self, type_tag: impl Into<String>) -> Self {
        self.type_tag = type_tag.into();
        self
    }

    pub fn primary_parent(&self) -> Option<&str> {
        self.parent_ids.first().map(String::as_str)
    }

    pub fn secondary_parents(&self) -> &[String] {
        self.parent_ids.get(1..).unwrap_or(&[])
    }

    pub fn has_parent(&self, parent_id: &str) -> bool {
        self.parent_ids.iter().any(|id| id == parent_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(deserialize_with = "id_string")]
    pub company_id: String,
}

impl Person {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        role: impl Into<String>,
        company_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
            company_id: company_id.into(),
        }
    }
}

/// The persisted `{companies, people}` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub companies: Vec<Company>,
    pub people: Vec<Person>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSummary {
    pub companies: Vec<String>,
    pub people: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSummary {
    pub added_companies: usize,
    pub added_people: usize,
    /// Incoming ids that collided with existing ones, mapped to their new ids.
    pub remapped: BTreeMap<String, String>,
}

impl Graph {
    pub fn new(companies: Vec<Company>, people: Vec<Person>) -> Self {
        Self { companies, people }
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(source: &str) -> GraphResult<Self> {
        let value: Value = serde_json::from_str(source)
            .map_err(|err| GraphError::Structure(format!("invalid JSON format: {err}")))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> GraphResult<Self> {
        let graph = Self::decode_value(value)?;
        graph.validate()?;
        Ok(graph)
    }

    /// Checks the document shape and decodes the records without cross-record
    /// validation. Merge payloads go through here because they may refer to
    /// companies that only exist in the graph they are merged into.
    pub fn decode_value(value: Value) -> GraphResult<Self> {
        let Value::Object(map) = &value else {
            return Err(GraphError::Structure(
                "payload must be an object with 'companies' and 'people'".to_string(),
            ));
        };
        for key in ["companies", "people"] {
            match map.get(key) {
                Some(Value::Array(_)) => {}
                Some(_) => {
                    return Err(GraphError::Structure(format!("'{key}' must be an array")));
                }
                None => {
                    return Err(GraphError::Structure(format!("'{key}' is missing")));
                }
            }
        }
        let mut graph: Graph =
            serde_json::from_value(value).map_err(|err| GraphError::Structure(err.to_string()))?;
        graph.drop_stale_ownership();
        Ok(graph)
    }

    /// Ownership is informational, so an entry for a parent that is no longer
    /// listed, or a share outside 0..=100, is dropped on ingest rather than
    /// failing the whole document.
    fn drop_stale_ownership(&mut self) {
        for company in &mut self.companies {
            let Company {
                id,
                parent_ids,
                parent_ownership,
                ..
            } = company;
            parent_ownership.retain(|parent, share| {
                let keep = parent_ids.contains(parent)
                    && share.is_finite()
                    && (0.0..=100.0).contains(&*share);
                if !keep {
                    debug!(%id, %parent, share = *share, "stale ownership entry dropped");
                }
                keep
            });
        }
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Checks every graph invariant that an edit must never break.
    ///
    /// Dangling parent references and cycles are tolerated; layout copes with both.
    pub fn validate(&self) -> GraphResult<()> {
        let mut ids = HashSet::with_capacity(self.companies.len());
        for company in &self.companies {
            if !ids.insert(company.id.as_str()) {
                return Err(GraphError::DuplicateId(company.id.clone()));
            }
        }

        for company in &self.companies {
            let mut seen = HashSet::with_capacity(company.parent_ids.len());
            for parent in &company.parent_ids {
                if *parent == company.id {
                    return Err(GraphError::SelfParent(company.id.clone()));
                }
                if !seen.insert(parent.as_str()) {
                    return Err(GraphError::DuplicateParent {
                        id: company.id.clone(),
                        parent: parent.clone(),
                    });
                }
            }
            for (parent, value) in &company.parent_ownership {
                if !company.has_parent(parent) {
                    return Err(GraphError::NotAParent {
                        id: company.id.clone(),
                        parent: parent.clone(),
                    });
                }
                check_ownership(&company.id, parent, *value)?;
            }
        }

        let mut person_ids = HashSet::with_capacity(self.people.len());
        for person in &self.people {
            if !person_ids.insert(person.id.as_str()) {
                return Err(GraphError::DuplicateId(person.id.clone()));
            }
            if !ids.contains(person.company_id.as_str()) {
                return Err(GraphError::Structure(format!(
                    "person '{}' references unknown company '{}'",
                    person.id, person.company_id
                )));
            }
        }

        Ok(())
    }

    pub fn company(&self, id: &str) -> Option<&Company> {
        self.companies.iter().find(|company| company.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.company(id).is_some()
    }

    fn company_mut(&mut self, id: &str) -> GraphResult<&mut Company> {
        self.companies
            .iter_mut()
            .find(|company| company.id == id)
            .ok_or_else(|| GraphError::UnknownCompany(id.to_string()))
    }

    pub fn person(&self, id: &str) -> Option<&Person> {
        self.people.iter().find(|person| person.id == id)
    }

    pub fn members<'a>(&'a self, company_id: &'a str) -> impl Iterator<Item = &'a Person> + 'a {
        self.people
            .iter()
            .filter(move |person| person.company_id == company_id)
    }

    pub fn member_counts(&self) -> HashMap<&str, usize> {
        let mut counts = HashMap::new();
        for person in &self.people {
            *counts.entry(person.company_id.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Companies that list `id` among their parents, in graph order.
    pub fn children<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Company> + 'a {
        self.companies
            .iter()
            .filter(move |company| company.has_parent(id))
    }

    pub fn add_company(&mut self, name: &str, type_tag: Option<&str>) -> GraphResult<String> {
        let name = non_empty(name)?;
        let id = fresh_id();
        let mut company = Company::new(id.clone(), name);
        if let Some(tag) = type_tag {
            company.type_tag = tag.to_string();
        }
        self.companies.push(company);
        debug!(%id, "company added");
        Ok(id)
    }

    /// Adds a company whose primary parent is `parent_id`.
    pub fn add_child_company(
        &mut self,
        parent_id: &str,
        name: &str,
        type_tag: Option<&str>,
    ) -> GraphResult<String> {
        if !self.contains(parent_id) {
            return Err(GraphError::UnknownCompany(parent_id.to_string()));
        }
        let id = self.add_company(name, type_tag)?;
        self.company_mut(&id)?.parent_ids.push(parent_id.to_string());
        Ok(id)
    }

    pub fn rename_company(&mut self, id: &str, name: &str) -> GraphResult<()> {
        let name = non_empty(name)?;
        self.company_mut(id)?.name = name;
        Ok(())
    }

    pub fn set_type(&mut self, id: &str, type_tag: &str) -> GraphResult<()> {
        self.company_mut(id)?.type_tag = type_tag.trim().to_string();
        Ok(())
    }

    /// Appends `parent_id` to the parent list of `id`.
    ///
    /// The first parent a company receives becomes its primary parent.
    pub fn add_parent(
        &mut self,
        id: &str,
        parent_id: &str,
        ownership: Option<f64>,
    ) -> GraphResult<()> {
        if id == parent_id {
            return Err(GraphError::SelfParent(id.to_string()));
        }
        if !self.contains(parent_id) {
            return Err(GraphError::UnknownCompany(parent_id.to_string()));
        }
        if let Some(value) = ownership {
            check_ownership(id, parent_id, value)?;
        }
        let company = self.company_mut(id)?;
        if company.has_parent(parent_id) {
            return Err(GraphError::DuplicateParent {
                id: id.to_string(),
                parent: parent_id.to_string(),
            });
        }
        company.parent_ids.push(parent_id.to_string());
        if let Some(value) = ownership {
            company.parent_ownership.insert(parent_id.to_string(), value);
        }
        debug!(%id, parent = %parent_id, "parent link added");
        Ok(())
    }

    pub fn remove_parent(&mut self, id: &str, parent_id: &str) -> GraphResult<()> {
        let company = self.company_mut(id)?;
        let before = company.parent_ids.len();
        company.parent_ids.retain(|parent| parent != parent_id);
        if company.parent_ids.len() == before {
            return Err(GraphError::NotAParent {
                id: id.to_string(),
                parent: parent_id.to_string(),
            });
        }
        company.parent_ownership.remove(parent_id);
        debug!(%id, parent = %parent_id, "parent link removed");
        Ok(())
    }

    /// Replaces the whole parent list. Ownership entries survive for parents
    /// that are still listed.
    pub fn set_parents(&mut self, id: &str, parents: Vec<String>) -> GraphResult<()> {
        let mut seen = HashSet::with_capacity(parents.len());
        for parent in &parents {
            if parent == id {
                return Err(GraphError::SelfParent(id.to_string()));
            }
            if !seen.insert(parent.as_str()) {
                return Err(GraphError::DuplicateParent {
                    id: id.to_string(),
                    parent: parent.clone(),
                });
            }
            if !self.contains(parent) {
                return Err(GraphError::UnknownCompany(parent.clone()));
            }
        }
        let company = self.company_mut(id)?;
        company
            .parent_ownership
            .retain(|parent, _| seen.contains(parent.as_str()));
        company.parent_ids = parents;
        Ok(())
    }

    /// Moves an existing parent to the front of the list.
    pub fn set_primary_parent(&mut self, id: &str, parent_id: &str) -> GraphResult<()> {
        let company = self.company_mut(id)?;
        let index = company
            .parent_ids
            .iter()
            .position(|parent| parent == parent_id)
            .ok_or_else(|| GraphError::NotAParent {
                id: id.to_string(),
                parent: parent_id.to_string(),
            })?;
        let parent = company.parent_ids.remove(index);
        company.parent_ids.insert(0, parent);
        Ok(())
    }

    /// Sets or clears (`None`) the percentage `parent_id` holds in `id`.
    pub fn set_ownership(
        &mut self,
        id: &str,
        parent_id: &str,
        value: Option<f64>,
    ) -> GraphResult<()> {
        let company = self.company_mut(id)?;
        if !company.has_parent(parent_id) {
            return Err(GraphError::NotAParent {
                id: id.to_string(),
                parent: parent_id.to_string(),
            });
        }
        match value {
            Some(value) => {
                check_ownership(id, parent_id, value)?;
                company.parent_ownership.insert(parent_id.to_string(), value);
            }
            None => {
                company.parent_ownership.remove(parent_id);
            }
        }
        Ok(())
    }

    pub fn add_person(&mut self, company_id: &str, name: &str, role: &str) -> GraphResult<String> {
        let name = non_empty(name)?;
        if !self.contains(company_id) {
            return Err(GraphError::UnknownCompany(company_id.to_string()));
        }
        let id = fresh_id();
        self.people
            .push(Person::new(id.clone(), name, role.trim(), company_id));
        Ok(id)
    }

    pub fn remove_person(&mut self, id: &str) -> GraphResult<Person> {
        let index = self
            .people
            .iter()
            .position(|person| person.id == id)
            .ok_or_else(|| GraphError::UnknownPerson(id.to_string()))?;
        Ok(self.people.remove(index))
    }

    /// Deletes `id`, every transitive descendant, and all of their people.
    ///
    /// References to deleted companies are stripped from the survivors.
    pub fn delete_company(&mut self, id: &str) -> GraphResult<DeleteSummary> {
        if !self.contains(id) {
            return Err(GraphError::UnknownCompany(id.to_string()));
        }
        let mut doomed = descendants(id, &self.companies);
        doomed.insert(id.to_string());

        let mut summary = DeleteSummary::default();
        self.companies.retain(|company| {
            if doomed.contains(&company.id) {
                summary.companies.push(company.id.clone());
                false
            } else {
                true
            }
        });
        self.people.retain(|person| {
            if doomed.contains(&person.company_id) {
                summary.people.push(person.id.clone());
                false
            } else {
                true
            }
        });
        for company in &mut self.companies {
            company.parent_ids.retain(|parent| !doomed.contains(parent));
            company
                .parent_ownership
                .retain(|parent, _| !doomed.contains(parent));
        }

        info!(
            %id,
            companies = summary.companies.len(),
            people = summary.people.len(),
            "cascading delete"
        );
        Ok(summary)
    }

    /// Swaps in `payload` wholesale after validating it.
    pub fn replace(&mut self, payload: Graph) -> GraphResult<()> {
        payload.validate()?;
        *self = payload;
        Ok(())
    }

    /// Adds the companies and people of `payload` to this graph.
    ///
    /// Incoming ids that already exist here are given fresh ids and every
    /// reference inside the payload follows them. Nothing is applied unless
    /// the merged graph validates.
    pub fn merge(&mut self, payload: Graph) -> GraphResult<MergeSummary> {
        let company_ids: HashSet<&str> = self.companies.iter().map(|c| c.id.as_str()).collect();
        let person_ids: HashSet<&str> = self.people.iter().map(|p| p.id.as_str()).collect();

        let mut remapped = BTreeMap::new();
        for company in &payload.companies {
            if company_ids.contains(company.id.as_str()) && !remapped.contains_key(&company.id) {
                remapped.insert(company.id.clone(), fresh_id());
            }
        }
        let rename = |id: &String| remapped.get(id).cloned().unwrap_or_else(|| id.clone());

        let mut merged = self.clone();
        let added_companies = payload.companies.len();
        let added_people = payload.people.len();

        for mut company in payload.companies {
            company.id = rename(&company.id);
            company.parent_ids = company.parent_ids.iter().map(rename).collect();
            company.parent_ownership = company
                .parent_ownership
                .iter()
                .map(|(parent, value)| (rename(parent), *value))
                .collect();
            merged.companies.push(company);
        }
        for mut person in payload.people {
            person.company_id = rename(&person.company_id);
            if person_ids.contains(person.id.as_str()) {
                person.id = fresh_id();
            }
            merged.people.push(person);
        }

        merged.validate()?;
        *self = merged;
        info!(
            companies = added_companies,
            people = added_people,
            remapped = remapped.len(),
            "payload merged"
        );
        Ok(MergeSummary {
            added_companies,
            added_people,
            remapped,
        })
    }
}

fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_type_tag() -> String {
    DEFAULT_TYPE_TAG.to_string()
}

fn non_empty(name: &str) -> GraphResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(GraphError::EmptyName);
    }
    Ok(trimmed.to_string())
}

fn check_ownership(id: &str, parent: &str, value: f64) -> GraphResult<()> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(GraphError::InvalidOwnership {
            id: id.to_string(),
            parent: parent.to_string(),
            value,
        });
    }
    Ok(())
}

fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_id(&value)
        .ok_or_else(|| D::Error::custom(format!("expected a string id, found {value}")))
}

fn id_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                value_to_id(item)
                    .ok_or_else(|| D::Error::custom(format!("expected a parent id, found {item}")))
            })
            .collect(),
        other => Err(D::Error::custom(format!(
            "parentIds must be an array, found {other}"
        ))),
    }
}

fn ownership_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(BTreeMap::new()),
        Value::Object(entries) => entries
            .into_iter()
            .map(|(parent, value)| {
                value
                    .as_f64()
                    .map(|pct| (parent.clone(), pct))
                    .ok_or_else(|| {
                        D::Error::custom(format!("ownership for '{parent}' must be a number"))
                    })
            })
            .collect(),
        other => Err(D::Error::custom(format!(
            "parentOwnership must be an object, found {other}"
        ))),
    }
}
