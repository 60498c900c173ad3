//! Declarative field tables.
//!
//! Each kind describes its attributes as a list of [`Field`]s. A field knows
//! where its value lives in the Kubernetes object body and how to convert it
//! between the snake_case state document and the camelCase API object, so no
//! kind needs hand-written conversion code.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use inflector::Inflector;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Conversion applied between the state value and the object body value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Copied verbatim.
    Scalar,
    /// String map with keys kept verbatim.
    Map,
    /// String map holding plain text in state and base64 in the object.
    Base64Map,
    /// String map of resource quantities, compared by value (`1000m` equals `1`).
    Quantities,
    /// Structured subtree; keys are converted between snake_case and camelCase.
    Nested,
}

/// How a field takes part in the resource lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Written on create and update.
    Optional,
    /// Written on create; a change forces replacement.
    ForceNew,
    /// Populated by the server, never written.
    Computed,
}

/// One attribute of a kind: the getter/setter pair for a path in the object body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub attribute: &'static str,
    pub path: &'static [&'static str],
    pub codec: Codec,
    pub mode: Mode,
}

impl Field {
    pub const fn optional(attribute: &'static str, path: &'static [&'static str], codec: Codec) -> Self {
        Self {
            attribute,
            path,
            codec,
            mode: Mode::Optional,
        }
    }

    pub const fn force_new(attribute: &'static str, path: &'static [&'static str], codec: Codec) -> Self {
        Self {
            attribute,
            path,
            codec,
            mode: Mode::ForceNew,
        }
    }

    pub const fn computed(attribute: &'static str, path: &'static [&'static str], codec: Codec) -> Self {
        Self {
            attribute,
            path,
            codec,
            mode: Mode::Computed,
        }
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self.mode, Mode::Computed)
    }

    /// Read this field from an object body and convert it to its state form.
    pub fn get(&self, body: &Value) -> Result<Option<Value>> {
        let mut current = body;
        for segment in self.path {
            match current.get(segment) {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        if current.is_null() {
            return Ok(None);
        }

        let value = match self.codec {
            Codec::Scalar => current.clone(),
            Codec::Map | Codec::Quantities => Value::Object(self.string_map(current)?),
            Codec::Base64Map => {
                let mut decoded = Map::new();
                for (key, value) in self.string_map(current)? {
                    let bytes = STANDARD
                        .decode(value.as_str().unwrap_or_default())
                        .map_err(|e| self.invalid(format!("key {key:?} is not base64: {e}")))?;
                    // Binary payloads decode lossily; `set_if_changed` keeps their wire bytes.
                    let text = String::from_utf8_lossy(&bytes).into_owned();
                    decoded.insert(key, Value::String(text));
                }
                Value::Object(decoded)
            }
            Codec::Nested => convert_keys(current, Case::Snake),
        };
        Ok(Some(value))
    }

    /// Write a state value into an object body. `None` and `null` remove the field.
    pub fn set(&self, body: &mut Value, value: Option<&Value>) -> Result<()> {
        let Some((last, parents)) = self.path.split_last() else {
            return Ok(());
        };

        let value = match value {
            None | Some(Value::Null) => {
                if let Some(parent) = self.walk(body, parents, false)? {
                    parent.remove(*last);
                }
                return Ok(());
            }
            Some(value) => value,
        };

        let encoded = match self.codec {
            Codec::Scalar => value.clone(),
            Codec::Map | Codec::Quantities => Value::Object(self.string_map(value)?),
            Codec::Base64Map => Value::Object(
                self.string_map(value)?
                    .into_iter()
                    .map(|(key, value)| {
                        let text = value.as_str().unwrap_or_default();
                        (key, Value::String(STANDARD.encode(text)))
                    })
                    .collect(),
            ),
            Codec::Nested => convert_keys(value, Case::Camel),
        };

        if let Some(parent) = self.walk(body, parents, true)? {
            parent.insert((*last).to_string(), encoded);
        }
        Ok(())
    }

    /// Whether `proposed` asks for nothing beyond what `prior` already holds.
    ///
    /// Nested subtrees only compare the keys present in `proposed`; anything
    /// else was filled in by the API server. An unset nested attribute is
    /// left to the server entirely. Maps compare exactly, so removing a key
    /// is a change.
    pub fn is_unchanged(&self, prior: Option<&Value>, proposed: Option<&Value>) -> bool {
        match (self.codec, prior, proposed) {
            (Codec::Nested, _, None) => true,
            (Codec::Nested, Some(prior), Some(proposed)) => covers(proposed, prior),
            (Codec::Quantities, Some(Value::Object(prior)), Some(Value::Object(proposed))) => {
                prior.len() == proposed.len()
                    && proposed.iter().all(|(key, value)| {
                        prior
                            .get(key)
                            .is_some_and(|current| same_quantity(current, value))
                    })
            }
            _ => prior == proposed,
        }
    }

    /// Write `planned` into a live object body unless it matches `prior`.
    ///
    /// For base64 maps, entries the change leaves alone keep the live wire
    /// value, so binary data that state only holds lossily is not rewritten.
    pub fn set_if_changed(
        &self,
        body: &mut Value,
        prior: Option<&Value>,
        planned: Option<&Value>,
    ) -> Result<()> {
        if self.is_unchanged(prior, planned) {
            return Ok(());
        }
        let live = match self.codec {
            Codec::Base64Map => self.raw(body).and_then(Value::as_object).cloned(),
            _ => None,
        };
        self.set(body, planned)?;

        let (Some(live), Some(prior), Some(planned)) = (
            live,
            prior.and_then(Value::as_object),
            planned.and_then(Value::as_object),
        ) else {
            return Ok(());
        };
        let Some((last, parents)) = self.path.split_last() else {
            return Ok(());
        };
        let written = self
            .walk(body, parents, false)?
            .and_then(|parent| parent.get_mut(*last))
            .and_then(Value::as_object_mut);
        if let Some(written) = written {
            for (key, value) in written.iter_mut() {
                if let Some(wire) = live.get(key).filter(|_| prior.get(key) == planned.get(key)) {
                    *value = wire.clone();
                }
            }
        }
        Ok(())
    }

    fn raw<'a>(&self, body: &'a Value) -> Option<&'a Value> {
        self.path
            .iter()
            .try_fold(body, |current, segment| current.get(segment))
    }

    fn walk<'a>(
        &self,
        body: &'a mut Value,
        parents: &[&str],
        create: bool,
    ) -> Result<Option<&'a mut Map<String, Value>>> {
        let mut current = body;
        for segment in parents {
            let object = current
                .as_object_mut()
                .ok_or_else(|| self.invalid(format!("cannot descend into {segment:?}")))?;
            if !object.contains_key(*segment) {
                if !create {
                    return Ok(None);
                }
                object.insert((*segment).to_string(), Value::Object(Map::new()));
            }
            current = object
                .get_mut(*segment)
                .ok_or_else(|| self.invalid(format!("missing {segment:?}")))?;
        }
        if current.is_null() && create {
            *current = Value::Object(Map::new());
        }
        match current.as_object_mut() {
            Some(object) => Ok(Some(object)),
            None if create => Err(self.invalid("parent is not an object".to_string())),
            None => Ok(None),
        }
    }

    fn string_map(&self, value: &Value) -> Result<Map<String, Value>> {
        let object = value
            .as_object()
            .ok_or_else(|| self.invalid("must be a map of strings".to_string()))?;
        for (key, value) in object {
            if !value.is_string() {
                return Err(self.invalid(format!("value for key {key:?} must be a string")));
            }
        }
        Ok(object.clone())
    }

    fn invalid(&self, message: String) -> Error {
        Error::InvalidAttribute {
            attribute: self.attribute,
            message,
        }
    }
}

/// Maps whose keys are user data rather than schema field names.
const VERBATIM_MAPS: &[&str] = &[
    "labels",
    "annotations",
    "match_labels",
    "capacity",
    "allocatable",
    "hard",
    "used",
    "volume_attributes",
    "deprecated_topology",
    "parameters",
    "options",
];

/// Acronyms the generic conversion gets wrong, as (snake_case, camelCase).
const KEY_OVERRIDES: &[(&str, &str)] = &[
    ("non_resource_urls", "nonResourceURLs"),
    ("volume_id", "volumeID"),
    ("disk_uri", "diskURI"),
    ("target_wwns", "targetWWNs"),
    ("pod_cidr", "podCIDR"),
    ("pod_cidrs", "podCIDRs"),
    ("provider_id", "providerID"),
    ("machine_id", "machineID"),
    ("system_uuid", "systemUUID"),
    ("boot_id", "bootID"),
    ("host_ip", "hostIP"),
    ("pd_id", "pdID"),
    ("storage_policy_id", "storagePolicyID"),
    ("scale_io", "scaleIO"),
    ("dataset_uuid", "datasetUUID"),
];

/// `configured` is contained in `actual`. Keys absent from `configured` are
/// ignored, except inside user maps, which must match exactly.
fn covers(configured: &Value, actual: &Value) -> bool {
    match (configured, actual) {
        (Value::Object(configured), Value::Object(actual)) => {
            configured.iter().all(|(key, value)| match (value, actual.get(key)) {
                (Value::Null, _) => true,
                (_, None) => false,
                (value, Some(current)) if VERBATIM_MAPS.contains(&key.as_str()) => value == current,
                (value, Some(current)) => covers(value, current),
            })
        }
        (Value::Array(configured), Value::Array(actual)) => {
            configured.len() == actual.len()
                && configured
                    .iter()
                    .zip(actual)
                    .all(|(configured, actual)| covers(configured, actual))
        }
        (Value::Number(configured), Value::Number(actual)) => configured.as_f64() == actual.as_f64(),
        _ => configured == actual,
    }
}

fn same_quantity(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a.as_str().and_then(parse_quantity), b.as_str().and_then(parse_quantity)) {
        (Some(a), Some(b)) => (a - b).abs() <= f64::EPSILON * a.abs().max(b.abs()) * 4.0,
        _ => false,
    }
}

/// Parse a Kubernetes resource quantity (`500m`, `2Gi`, `1e3`, `4k`) into its value.
fn parse_quantity(quantity: &str) -> Option<f64> {
    const BINARY: &[(&str, i32)] = &[("Ki", 1), ("Mi", 2), ("Gi", 3), ("Ti", 4), ("Pi", 5), ("Ei", 6)];
    const DECIMAL: &[(&str, i32)] = &[
        ("n", -9),
        ("u", -6),
        ("m", -3),
        ("k", 3),
        ("M", 6),
        ("G", 9),
        ("T", 12),
        ("P", 15),
        ("E", 18),
    ];

    let quantity = quantity.trim();
    for (suffix, power) in BINARY {
        if let Some(number) = quantity.strip_suffix(suffix) {
            return number.parse::<f64>().ok().map(|n| n * 1024f64.powi(*power));
        }
    }
    if let Ok(number) = quantity.parse::<f64>() {
        return Some(number);
    }
    DECIMAL.iter().find_map(|(suffix, power)| {
        quantity
            .strip_suffix(suffix)
            .and_then(|number| number.parse::<f64>().ok())
            .map(|n| n * 10f64.powi(*power))
    })
}

#[derive(Debug, Clone, Copy)]
enum Case {
    Snake,
    Camel,
}

fn convert_key(key: &str, case: Case) -> String {
    let overridden = KEY_OVERRIDES.iter().find_map(|(snake, camel)| match case {
        Case::Snake if *camel == key => Some(*snake),
        Case::Camel if *snake == key => Some(*camel),
        _ => None,
    });
    match (overridden, case) {
        (Some(key), _) => key.to_string(),
        (None, Case::Snake) => key.to_snake_case(),
        (None, Case::Camel) => key.to_camel_case(),
    }
}

fn convert_keys(value: &Value, case: Case) -> Value {
    match value {
        Value::Object(object) => Value::Object(
            object
                .iter()
                .map(|(key, value)| {
                    let converted = convert_key(key, case);
                    let snake = match case {
                        Case::Snake => converted.as_str(),
                        Case::Camel => key.as_str(),
                    };
                    let value = if VERBATIM_MAPS.contains(&snake) {
                        value.clone()
                    } else {
                        convert_keys(value, case)
                    };
                    (converted, value)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(|item| convert_keys(item, case)).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Codec, Field};
    use crate::error::Error;

    #[test]
    fn scalar_get_and_set() {
        let field = Field::optional("immutable", &["immutable"], Codec::Scalar);
        let mut body = json!({});
        field.set(&mut body, Some(&json!(true))).unwrap();
        assert_eq!(body, json!({"immutable": true}));
        assert_eq!(field.get(&body).unwrap(), Some(json!(true)));

        field.set(&mut body, None).unwrap();
        assert_eq!(body, json!({}));
        assert_eq!(field.get(&body).unwrap(), None);
    }

    #[test]
    fn nested_path_is_created_on_set() {
        let field = Field::optional("hard", &["spec", "hard"], Codec::Map);
        let mut body = json!({});
        field
            .set(&mut body, Some(&json!({"requests.cpu": "1", "pods": "4"})))
            .unwrap();
        assert_eq!(body, json!({"spec": {"hard": {"requests.cpu": "1", "pods": "4"}}}));

        // removing from a missing parent is a no-op
        let mut empty = json!({});
        field.set(&mut empty, Some(&json!(null))).unwrap();
        assert_eq!(empty, json!({}));
    }

    #[test]
    fn map_rejects_non_string_values() {
        let field = Field::optional("data", &["data"], Codec::Map);
        let mut body = json!({});
        let err = field.set(&mut body, Some(&json!({"a": 1}))).unwrap_err();
        assert!(matches!(err, Error::InvalidAttribute { attribute: "data", .. }));
    }

    #[test]
    fn base64_map_encodes_on_the_wire() {
        let field = Field::optional("data", &["data"], Codec::Base64Map);
        let mut body = json!({});
        field
            .set(&mut body, Some(&json!({"username": "admin", "password": "P4ssw0rd"})))
            .unwrap();
        assert_eq!(
            body,
            json!({"data": {"username": "YWRtaW4=", "password": "UDRzc3cwcmQ="}})
        );
        assert_eq!(
            field.get(&body).unwrap(),
            Some(json!({"username": "admin", "password": "P4ssw0rd"}))
        );
    }

    #[test]
    fn base64_map_rejects_garbage() {
        let field = Field::optional("data", &["data"], Codec::Base64Map);
        let body = json!({"data": {"key": "!!!"}});
        assert!(field.get(&body).is_err());
    }

    #[test]
    fn nested_converts_keys_but_not_user_maps() {
        let field = Field::optional("webhook", &["webhooks"], Codec::Nested);
        let state = json!([{
            "name": "example.acme.com",
            "admission_review_versions": ["v1"],
            "side_effects": "None",
            "namespace_selector": {
                "match_labels": {"app.kubernetes.io/name": "web"}
            }
        }]);
        let mut body = json!({});
        field.set(&mut body, Some(&state)).unwrap();
        assert_eq!(
            body,
            json!({"webhooks": [{
                "name": "example.acme.com",
                "admissionReviewVersions": ["v1"],
                "sideEffects": "None",
                "namespaceSelector": {
                    "matchLabels": {"app.kubernetes.io/name": "web"}
                }
            }]})
        );
        assert_eq!(field.get(&body).unwrap(), Some(state));
    }

    #[test]
    fn nested_uses_acronym_overrides() {
        let field = Field::optional("rule", &["rules"], Codec::Nested);
        let body = json!({"rules": [{"nonResourceURLs": ["/healthz"], "verbs": ["get"]}]});
        let state = field.get(&body).unwrap().unwrap();
        assert_eq!(state, json!([{"non_resource_urls": ["/healthz"], "verbs": ["get"]}]));

        let mut written = json!({});
        field.set(&mut written, Some(&state)).unwrap();
        assert_eq!(written, body);
    }

    #[test]
    fn base64_map_tolerates_binary_values() {
        let field = Field::optional("data", &["data"], Codec::Base64Map);
        let body = json!({"data": {"keystore.jks": "/u3+7QAAAAI=", "alias": "c2VydmVy"}});
        let state = field.get(&body).unwrap().unwrap();
        assert_eq!(state["alias"], "server");
        assert!(state["keystore.jks"].as_str().unwrap().contains('\u{FFFD}'));
    }

    #[test]
    fn base64_map_update_keeps_untouched_wire_bytes() {
        let field = Field::optional("data", &["data"], Codec::Base64Map);
        let mut body = json!({"data": {"keystore.jks": "/u3+7QAAAAI=", "alias": "c2VydmVy"}});
        let prior = field.get(&body).unwrap().unwrap();
        let mut planned = prior.clone();
        planned["alias"] = json!("client");

        field
            .set_if_changed(&mut body, Some(&prior), Some(&planned))
            .unwrap();
        assert_eq!(
            body,
            json!({"data": {"keystore.jks": "/u3+7QAAAAI=", "alias": "Y2xpZW50"}})
        );
    }

    #[test]
    fn nested_comparison_ignores_server_filled_keys() {
        let field = Field::optional("webhook", &["webhooks"], Codec::Nested);
        let configured = json!([{"name": "a.example.com", "side_effects": "None"}]);
        let live = json!([{
            "name": "a.example.com",
            "side_effects": "None",
            "failure_policy": "Fail",
            "timeout_seconds": 10,
            "namespace_selector": {}
        }]);
        assert!(field.is_unchanged(Some(&live), Some(&configured)));
        assert!(field.is_unchanged(Some(&live), None));

        let retimed = json!([{"name": "a.example.com", "timeout_seconds": 5}]);
        assert!(!field.is_unchanged(Some(&live), Some(&retimed)));

        let fewer = json!([]);
        assert!(!field.is_unchanged(Some(&live), Some(&fewer)));
    }

    #[test]
    fn nested_comparison_is_exact_inside_user_maps() {
        let field = Field::optional("webhook", &["webhooks"], Codec::Nested);
        let live = json!([{"object_selector": {"match_labels": {"app": "web", "tier": "front"}}}]);
        let configured = json!([{"object_selector": {"match_labels": {"app": "web"}}}]);
        assert!(!field.is_unchanged(Some(&live), Some(&configured)));
    }

    #[test]
    fn quantities_compare_by_value() {
        let field = Field::optional("hard", &["spec", "hard"], Codec::Quantities);
        let live = json!({"requests.cpu": "1", "requests.memory": "1Gi", "pods": "10"});
        let configured = json!({"requests.cpu": "1000m", "requests.memory": "1024Mi", "pods": "10"});
        assert!(field.is_unchanged(Some(&live), Some(&configured)));

        let raised = json!({"requests.cpu": "2", "requests.memory": "1Gi", "pods": "10"});
        assert!(!field.is_unchanged(Some(&live), Some(&raised)));

        let dropped = json!({"requests.cpu": "1", "requests.memory": "1Gi"});
        assert!(!field.is_unchanged(Some(&live), Some(&dropped)));
    }

    #[test]
    fn persistent_volume_sources_round_trip() {
        let field = Field::optional("spec", &["spec"], Codec::Nested);
        let body = json!({"spec": {
            "photonPersistentDisk": {"pdID": "disk-1", "fsType": "ext4"},
            "vsphereVolume": {"volumePath": "[ds] vol.vmdk", "storagePolicyID": "p-1"},
            "scaleIO": {"gateway": "https://gw", "system": "sio"},
            "flocker": {"datasetUUID": "5f1c"},
            "flexVolume": {"driver": "acme/nfs", "options": {"mountMode": "rw", "share_name": "data"}}
        }});
        let state = field.get(&body).unwrap().unwrap();
        assert_eq!(state["photon_persistent_disk"]["pd_id"], "disk-1");
        assert_eq!(state["vsphere_volume"]["storage_policy_id"], "p-1");
        assert_eq!(state["scale_io"]["gateway"], "https://gw");
        assert_eq!(state["flocker"]["dataset_uuid"], "5f1c");
        assert_eq!(
            state["flex_volume"]["options"],
            json!({"mountMode": "rw", "share_name": "data"})
        );

        let mut written = json!({});
        field.set(&mut written, Some(&state)).unwrap();
        assert_eq!(written, body);
    }
}
