//! Distributions: the ordered set of activation instances for one video

use crate::{ActivationId, Error, Position, Result, TimeWindow, DEFAULT_SLOT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashSet};

/// One activation placed on the timeline through an ordered list of windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationInstance {
    pub external_id: ActivationId,
    #[serde(rename = "timeWindows")]
    pub windows: Vec<TimeWindow>,
}

impl ActivationInstance {
    /// Creates a new activation instance
    pub fn new(external_id: ActivationId, windows: Vec<TimeWindow>) -> Self {
        Self {
            external_id,
            windows,
        }
    }

    /// All windows containing `position`, in declared order
    pub fn active_windows(&self, position: Position) -> impl Iterator<Item = &TimeWindow> + '_ {
        self.windows.iter().filter(move |w| w.contains(position))
    }

    /// The first declared window containing `position`
    pub fn current_window(&self, position: Position) -> Option<&TimeWindow> {
        self.active_windows(position).next()
    }

    /// Checks if any window of this instance contains `position`
    pub fn is_active_at(&self, position: Position) -> bool {
        self.current_window(position).is_some()
    }

    /// The first declared window for `slot` containing `position`
    pub fn window_for(&self, slot: &str, position: Position) -> Option<&TimeWindow> {
        self.active_windows(position).find(|w| w.slot() == slot)
    }
}

/// A named, ordered collection of activation instances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDistribution")]
pub struct Distribution {
    id: u64,
    name: String,
    instances: Vec<ActivationInstance>,
}

#[derive(Deserialize)]
struct RawDistribution {
    id: u64,
    name: String,
    instances: Vec<ActivationInstance>,
}

impl TryFrom<RawDistribution> for Distribution {
    type Error = Error;

    fn try_from(raw: RawDistribution) -> Result<Self> {
        Self::new(raw.id, raw.name, raw.instances)
    }
}

// Platform response shape:
// {"data": [{"id", "name", "data": {"timeline": {"activations": {"items": [...]}}}}]}
#[derive(Deserialize)]
struct ApiResponse {
    data: Vec<ApiDistribution>,
}

#[derive(Deserialize)]
struct ApiDistribution {
    id: u64,
    name: String,
    data: ApiDistributionData,
}

#[derive(Deserialize)]
struct ApiDistributionData {
    timeline: ApiTimeline,
}

#[derive(Deserialize)]
struct ApiTimeline {
    activations: ApiActivations,
}

#[derive(Deserialize)]
struct ApiActivations {
    items: Vec<ApiItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiItem {
    external_id: ActivationId,
    instances: Vec<ApiInstance>,
}

#[derive(Deserialize)]
struct ApiInstance {
    when: ApiWhen,
    #[serde(default)]
    settings: Value,
    #[serde(default)]
    position: Option<String>,
}

#[derive(Deserialize)]
struct ApiWhen {
    start: Position,
    end: Position,
}

impl Distribution {
    /// Creates a distribution, rejecting repeated external ids
    pub fn new(id: u64, name: impl Into<String>, instances: Vec<ActivationInstance>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(instances.len());
        for instance in &instances {
            if !seen.insert(instance.external_id) {
                return Err(Error::DuplicateInstance(instance.external_id));
            }
        }
        Ok(Self {
            id,
            name: name.into(),
            instances,
        })
    }

    /// Parses the flat distribution document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parses the platform response envelope, keeping the first distribution.
    /// Windows without a position land in [`DEFAULT_SLOT`].
    pub fn from_api_response(json: &str) -> Result<Self> {
        let response: ApiResponse = serde_json::from_str(json)?;
        let api = response
            .data
            .into_iter()
            .next()
            .ok_or(Error::EmptyResponse("distribution"))?;

        let instances = api
            .data
            .timeline
            .activations
            .items
            .into_iter()
            .map(|item| {
                let windows = item
                    .instances
                    .into_iter()
                    .map(|i| {
                        let slot = i.position.unwrap_or_else(|| DEFAULT_SLOT.to_string());
                        TimeWindow::new(i.when.start, i.when.end, slot, i.settings)
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(ActivationInstance::new(item.external_id, windows))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(api.id, api.name, instances)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instances in declared order
    pub fn instances(&self) -> &[ActivationInstance] {
        &self.instances
    }

    /// Gets an instance by its external id
    pub fn instance(&self, id: ActivationId) -> Option<&ActivationInstance> {
        self.instances.iter().find(|i| i.external_id == id)
    }

    /// Every slot name referenced by any window
    pub fn slot_names(&self) -> BTreeSet<&str> {
        self.instances
            .iter()
            .flat_map(|i| i.windows.iter().map(TimeWindow::slot))
            .collect()
    }

    /// Total number of windows across all instances
    pub fn window_count(&self) -> usize {
        self.instances.iter().map(|i| i.windows.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(start: Position, end: Position, slot: &str) -> TimeWindow {
        TimeWindow::new(start, end, slot, Value::Null).unwrap()
    }

    #[test]
    fn test_active_windows_keep_declared_order() {
        let instance = ActivationInstance::new(
            ActivationId(1),
            vec![
                window(0, 100, "top"),
                window(50, 150, "bottom"),
                window(40, 60, "top"),
            ],
        );

        let slots: Vec<_> = instance.active_windows(55).map(|w| w.slot()).collect();
        assert_eq!(slots, vec!["top", "bottom", "top"]);
        assert_eq!(instance.current_window(55).unwrap().start(), 0);
        assert_eq!(instance.window_for("bottom", 55).unwrap().start(), 50);
        assert!(instance.window_for("bottom", 20).is_none());
        assert!(!instance.is_active_at(150));
    }

    #[test]
    fn test_duplicate_external_ids_rejected() {
        let err = Distribution::new(
            1,
            "dup",
            vec![
                ActivationInstance::new(ActivationId(7), vec![]),
                ActivationInstance::new(ActivationId(7), vec![]),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateInstance(ActivationId(7))));
    }

    #[test]
    fn test_parse_flat_document() {
        let json = r#"{
            "id": 3,
            "name": "Episode 1",
            "instances": [
                {"externalId": 10, "timeWindows": [
                    {"start": 0, "end": 5000, "slotName": "top"},
                    {"start": 9000, "end": 12000, "slotName": "bottom", "settings": {"x": 1}}
                ]},
                {"externalId": 11, "timeWindows": []}
            ]
        }"#;
        let distribution = Distribution::from_json(json).unwrap();
        assert_eq!(distribution.id(), 3);
        assert_eq!(distribution.name(), "Episode 1");
        assert_eq!(distribution.instances().len(), 2);
        assert_eq!(distribution.window_count(), 2);
        assert_eq!(
            distribution.slot_names().into_iter().collect::<Vec<_>>(),
            vec!["bottom", "top"]
        );
        let second = &distribution.instance(ActivationId(10)).unwrap().windows[1];
        assert_eq!(second.settings()["x"], 1);
    }

    #[test]
    fn test_parse_rejects_bad_window() {
        let json = r#"{"id": 1, "name": "n", "instances": [
            {"externalId": 1, "timeWindows": [{"start": 10, "end": 10}]}
        ]}"#;
        assert!(matches!(
            Distribution::from_json(json),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_api_response() {
        let json = r#"{"data": [{
            "id": 99,
            "name": "Remote",
            "data": {"timeline": {"activations": {"items": [
                {"externalId": 5, "instances": [
                    {"when": {"start": 1000, "end": 2000}},
                    {"when": {"start": 3000, "end": 4000}, "position": "bottom", "settings": {}}
                ]}
            ]}}}
        }]}"#;
        let distribution = Distribution::from_api_response(json).unwrap();
        assert_eq!(distribution.id(), 99);
        let instance = distribution.instance(ActivationId(5)).unwrap();
        assert_eq!(instance.windows[0].slot(), DEFAULT_SLOT);
        assert_eq!(instance.windows[1].slot(), "bottom");

        let empty = Distribution::from_api_response(r#"{"data": []}"#).unwrap_err();
        assert!(matches!(empty, Error::EmptyResponse("distribution")));

        let inverted = r#"{"data": [{"id": 1, "name": "n", "data": {"timeline": {"activations": {"items": [
            {"externalId": 5, "instances": [{"when": {"start": 9, "end": 1}}]}
        ]}}}}]}"#;
        assert!(matches!(
            Distribution::from_api_response(inverted),
            Err(Error::InvalidWindow { start: 9, end: 1 })
        ));
    }

    #[test]
    fn test_api_response_serializes_to_flat_form() {
        let json = r#"{"data": [{
            "id": 12,
            "name": "Final",
            "data": {"timeline": {"activations": {"items": [
                {"externalId": 3, "instances": [
                    {"when": {"start": 0, "end": 500}},
                    {"when": {"start": 800, "end": 900}, "position": "bottom", "settings": {"x": 1}}
                ]},
                {"externalId": 4, "instances": [{"when": {"start": 100, "end": 200}}]}
            ]}}}
        }]}"#;
        let distribution = Distribution::from_api_response(json).unwrap();

        let flat = serde_json::to_value(&distribution).unwrap();
        assert_eq!(flat["instances"][0]["externalId"], 3);
        assert_eq!(flat["instances"][0]["timeWindows"][1]["slotName"], "bottom");
        assert_eq!(flat["instances"][0]["timeWindows"][1]["settings"]["x"], 1);

        let reparsed = Distribution::from_json(&flat.to_string()).unwrap();
        assert_eq!(reparsed, distribution);
    }
}
