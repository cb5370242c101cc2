//! Persisted comparison state.
//!
//! The panel's fields ride along inside a larger, externally owned workflow
//! record:
//!
//! ```json
//! {
//!   "id": 7,
//!   "slider_pos": 0.5,
//!   "isManuallyResized": false,
//!   "properties": { "blend_mode": "normal" }
//! }
//! ```
//!
//! Writing only touches these three keys. Reading yields a [`StatePatch`]
//! whose absent or malformed fields leave the live state unchanged.

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::compositor::BlendMode;

pub const SLIDER_POS_KEY: &str = "slider_pos";
pub const MANUAL_RESIZE_KEY: &str = "isManuallyResized";
pub const PROPERTIES_KEY: &str = "properties";
pub const BLEND_MODE_KEY: &str = "blend_mode";

/// Snapshot of the panel's persisted fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompareState {
    pub slider_pos: f32,
    pub is_manually_resized: bool,
    pub blend_mode: BlendMode,
}

impl CompareState {
    /// Merge these fields into `record`, keeping every other key as is.
    pub fn write_into(&self, record: &mut Map<String, Value>) {
        record.insert(SLIDER_POS_KEY.to_string(), Value::from(self.slider_pos));
        record.insert(
            MANUAL_RESIZE_KEY.to_string(),
            Value::Bool(self.is_manually_resized),
        );

        let properties = record
            .entry(PROPERTIES_KEY.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !properties.is_object() {
            *properties = Value::Object(Map::new());
        }
        if let Value::Object(properties) = properties {
            properties.insert(
                BLEND_MODE_KEY.to_string(),
                Value::String(self.blend_mode.as_str().to_string()),
            );
        }
    }

    /// Standalone record holding only the panel's fields.
    pub fn to_record(&self) -> Value {
        let mut record = Map::new();
        self.write_into(&mut record);
        Value::Object(record)
    }
}

/// Fields found in a record; `None` means "not present, keep current".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatePatch {
    pub slider_pos: Option<f32>,
    pub is_manually_resized: Option<bool>,
    pub blend_mode: Option<BlendMode>,
}

impl StatePatch {
    /// Read every panel field present in `record`.
    ///
    /// Fields are read independently: one that is present but malformed is
    /// logged and skipped while the others still apply.
    pub fn from_record(record: &Value) -> Self {
        let properties = record.get(PROPERTIES_KEY);
        if properties.is_some_and(|p| !p.is_object() && !p.is_null()) {
            warn!("ignoring non-object '{}' in state record", PROPERTIES_KEY);
        }

        let patch = Self {
            slider_pos: field(record.get(SLIDER_POS_KEY), SLIDER_POS_KEY),
            is_manually_resized: field(record.get(MANUAL_RESIZE_KEY), MANUAL_RESIZE_KEY),
            blend_mode: field(
                properties.and_then(|p| p.get(BLEND_MODE_KEY)),
                BLEND_MODE_KEY,
            ),
        };
        debug!("read state patch {:?}", patch);
        patch
    }

    pub fn is_empty(&self) -> bool {
        self.slider_pos.is_none() && self.is_manually_resized.is_none() && self.blend_mode.is_none()
    }
}

fn field<T: DeserializeOwned>(value: Option<&Value>, key: &str) -> Option<T> {
    let value = value.filter(|v| !v.is_null())?;
    match T::deserialize(value) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!("ignoring invalid '{}' in state record: {}", key, err);
            None
        }
    }
}
