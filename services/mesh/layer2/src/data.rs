//! Origin tagged metric values.

use serde::Serialize;

use crate::isonumber::format_value;
use crate::metadata::{DataKind, Metadata};
use crate::origin::{may_overwrite, OriginId, OriginRef};

/// A metric value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Layer2Value {
    /// Fixed point integer, see [`Metadata::fraction`]
    Integer(i64),
    /// Flag
    Boolean(bool),
}

impl Layer2Value {
    /// Kind of this value
    pub fn kind(&self) -> DataKind {
        match self {
            Layer2Value::Integer(_) => DataKind::Integer,
            Layer2Value::Boolean(_) => DataKind::Boolean,
        }
    }

    /// Human readable text using the metric's unit and scale
    pub fn format(&self, meta: &Metadata, raw: bool) -> String {
        match self {
            Layer2Value::Integer(v) => format_value(*v, meta.unit, meta.fraction, meta.binary, raw),
            Layer2Value::Boolean(b) => b.to_string(),
        }
    }
}

/// One metric slot: a value and the origin that wrote it
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Layer2Data {
    value: Option<Layer2Value>,
    origin: Option<OriginRef>,
}

impl Layer2Data {
    /// Current value
    pub fn value(&self) -> Option<Layer2Value> {
        self.value
    }

    /// Whether a value is set
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Origin of the current value
    pub fn origin(&self) -> Option<OriginRef> {
        self.origin
    }

    /// Integer value, if set and an integer
    pub fn integer(&self) -> Option<i64> {
        match self.value {
            Some(Layer2Value::Integer(v)) => Some(v),
            _ => None,
        }
    }

    /// Boolean value, if set and a boolean
    pub fn boolean(&self) -> Option<bool> {
        match self.value {
            Some(Layer2Value::Boolean(b)) => Some(b),
            _ => None,
        }
    }

    /// Write `value` if `origin` may overwrite the slot. Returns whether the
    /// stored value changed.
    pub fn set(&mut self, origin: OriginRef, value: Layer2Value) -> bool {
        if !may_overwrite(self.origin, origin) {
            return false;
        }
        let changed = self.value != Some(value);
        self.value = Some(value);
        self.origin = Some(origin);
        changed
    }

    /// Clear the slot
    pub fn reset(&mut self) {
        self.value = None;
        self.origin = None;
    }

    /// Clear the slot if `origin` owns it. Returns whether it was cleared.
    pub fn reset_if(&mut self, origin: OriginId) -> bool {
        if self.is_owned_by(origin) {
            self.reset();
            return true;
        }
        false
    }

    /// Hand the slot over from `old` to `new`
    pub fn relabel(&mut self, new: OriginRef, old: OriginId) {
        if self.is_owned_by(old) {
            self.origin = Some(new);
        }
    }

    fn is_owned_by(&self, origin: OriginId) -> bool {
        self.origin.map(|o| o.id) == Some(origin)
    }
}
