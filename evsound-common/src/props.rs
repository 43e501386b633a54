//! Property bags
//!
//! A property bag is an immutable mapping of string keys to string or
//! numeric values describing one sound event or the application context.
//! Well-known keys live in [`keys`]; unknown keys are passed through to the
//! backend uninterpreted.
//!
//! Only shape is validated here (key alphabet, NUL-free strings, finite
//! numbers). Meaning is left to the backend.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// Well-known property keys
pub mod keys {
    pub const MEDIA_NAME: &str = "media.name";
    pub const MEDIA_TITLE: &str = "media.title";
    pub const MEDIA_ARTIST: &str = "media.artist";
    pub const MEDIA_LANGUAGE: &str = "media.language";
    pub const MEDIA_FILENAME: &str = "media.filename";
    pub const MEDIA_ICON: &str = "media.icon";
    pub const MEDIA_ICON_NAME: &str = "media.icon_name";
    pub const MEDIA_ROLE: &str = "media.role";

    pub const EVENT_ID: &str = "event.id";
    pub const EVENT_DESCRIPTION: &str = "event.description";
    pub const EVENT_MOUSE_X: &str = "event.mouse.x";
    pub const EVENT_MOUSE_Y: &str = "event.mouse.y";
    pub const EVENT_MOUSE_HPOS: &str = "event.mouse.hpos";
    pub const EVENT_MOUSE_VPOS: &str = "event.mouse.vpos";
    pub const EVENT_MOUSE_BUTTON: &str = "event.mouse.button";

    pub const WINDOW_NAME: &str = "window.name";
    pub const WINDOW_ID: &str = "window.id";
    pub const WINDOW_ICON: &str = "window.icon";
    pub const WINDOW_ICON_NAME: &str = "window.icon_name";
    pub const WINDOW_X11_DISPLAY: &str = "window.x11.display";
    pub const WINDOW_X11_SCREEN: &str = "window.x11.screen";
    pub const WINDOW_X11_MONITOR: &str = "window.x11.monitor";
    pub const WINDOW_X11_XID: &str = "window.x11.xid";

    pub const APPLICATION_NAME: &str = "application.name";
    pub const APPLICATION_ID: &str = "application.id";
    pub const APPLICATION_VERSION: &str = "application.version";
    pub const APPLICATION_ICON: &str = "application.icon";
    pub const APPLICATION_ICON_NAME: &str = "application.icon_name";
    pub const APPLICATION_LANGUAGE: &str = "application.language";
    pub const APPLICATION_PROCESS_ID: &str = "application.process.id";
    pub const APPLICATION_PROCESS_BINARY: &str = "application.process.binary";
    pub const APPLICATION_PROCESS_USER: &str = "application.process.user";
    pub const APPLICATION_PROCESS_HOST: &str = "application.process.host";

    pub const CANBERRA_CACHE_CONTROL: &str = "canberra.cache-control";
    pub const CANBERRA_VOLUME: &str = "canberra.volume";
    pub const CANBERRA_XDG_THEME_NAME: &str = "canberra.xdg-theme.name";
    pub const CANBERRA_XDG_THEME_OUTPUT_PROFILE: &str = "canberra.xdg-theme.output-profile";
    pub const CANBERRA_ENABLE: &str = "canberra.enable";
}

/// A single property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl PropValue {
    /// Value as the backend sees it (everything crosses as a string)
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            PropValue::Text(s) => Cow::Borrowed(s),
            PropValue::Integer(i) => Cow::Owned(i.to_string()),
            PropValue::Float(f) => Cow::Owned(f.to_string()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropValue::Text(s) => Some(s),
            _ => None,
        }
    }

    fn validate(&self, key: &str) -> Result<()> {
        match self {
            PropValue::Text(s) if s.contains('\0') => Err(Error::InvalidPropertyValue {
                key: key.to_string(),
                reason: "string contains NUL".to_string(),
            }),
            PropValue::Float(f) if !f.is_finite() => Err(Error::InvalidPropertyValue {
                key: key.to_string(),
                reason: format!("number {} is not finite", f),
            }),
            _ => Ok(()),
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        PropValue::Text(s.to_string())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        PropValue::Text(s)
    }
}

impl From<i64> for PropValue {
    fn from(i: i64) -> Self {
        PropValue::Integer(i)
    }
}

impl From<i32> for PropValue {
    fn from(i: i32) -> Self {
        PropValue::Integer(i64::from(i))
    }
}

impl From<u32> for PropValue {
    fn from(i: u32) -> Self {
        PropValue::Integer(i64::from(i))
    }
}

impl From<f64> for PropValue {
    fn from(f: f64) -> Self {
        PropValue::Float(f)
    }
}

impl std::fmt::Display for PropValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_text())
    }
}

/// Whether `name` is an acceptable property key.
///
/// Keys are non-empty and made of ASCII alphanumerics, `.`, `-` and `_`.
pub fn is_valid_key(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'-' | b'_'))
}

/// Immutable, validated property mapping
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PropertyBag {
    entries: BTreeMap<String, PropValue>,
}

impl PropertyBag {
    /// Empty bag
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> PropertyBagBuilder {
        PropertyBagBuilder::default()
    }

    /// Build from arbitrary key/value pairs, validating each one
    pub fn from_pairs<K, V, I>(pairs: I) -> Result<Self>
    where
        K: Into<String>,
        V: Into<PropValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut builder = Self::builder();
        for (key, value) in pairs {
            builder = builder.set(key, value);
        }
        builder.build()
    }

    /// Build from a JSON object, the shape scripting callers hand over.
    ///
    /// Values must be strings or numbers.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let object = value.as_object().ok_or_else(|| {
            Error::InvalidInput("property bag must be a JSON object".to_string())
        })?;

        let mut builder = Self::builder();
        for (key, value) in object {
            let value = match value {
                serde_json::Value::String(s) => PropValue::Text(s.clone()),
                serde_json::Value::Number(n) => match n.as_i64() {
                    Some(i) => PropValue::Integer(i),
                    None => PropValue::Float(n.as_f64().unwrap_or(f64::NAN)),
                },
                other => {
                    return Err(Error::InvalidPropertyValue {
                        key: key.clone(),
                        reason: format!("value must be a string or number, got {}", other),
                    })
                }
            };
            builder = builder.set(key.clone(), value);
        }
        builder.build()
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.entries.get(key)
    }

    /// Text value for `key`, if present and a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(PropValue::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// New bag with `other`'s entries layered over this one
    pub fn merged(&self, other: &PropertyBag) -> PropertyBag {
        let mut entries = self.entries.clone();
        for (key, value) in &other.entries {
            entries.insert(key.clone(), value.clone());
        }
        PropertyBag { entries }
    }

    /// `event.id` shortcut, mostly for logging
    pub fn event_id(&self) -> Option<&str> {
        self.get_str(keys::EVENT_ID)
    }

    /// False when `canberra.enable` switches sounds off
    pub fn sounds_enabled(&self) -> bool {
        match self.entries.get(keys::CANBERRA_ENABLE) {
            Some(PropValue::Text(s)) => {
                !matches!(s.trim().to_ascii_lowercase().as_str(), "0" | "false" | "no")
            }
            Some(PropValue::Integer(i)) => *i != 0,
            Some(PropValue::Float(f)) => *f != 0.0,
            None => true,
        }
    }
}

impl<'a> IntoIterator for &'a PropertyBag {
    type Item = (&'a String, &'a PropValue);
    type IntoIter = std::collections::btree_map::Iter<'a, String, PropValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Typed builder for [`PropertyBag`].
///
/// Validation errors are deferred to [`build`](PropertyBagBuilder::build)
/// so setters can be chained.
#[derive(Debug, Default)]
pub struct PropertyBagBuilder {
    entries: BTreeMap<String, PropValue>,
    error: Option<Error>,
}

impl PropertyBagBuilder {
    /// Set any key, including keys outside the well-known vocabulary
    pub fn set(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        if self.error.is_some() {
            return self;
        }
        let key = key.into();
        let value = value.into();

        if !is_valid_key(&key) {
            self.error = Some(Error::InvalidPropertyName(key));
            return self;
        }
        if let Err(e) = value.validate(&key) {
            self.error = Some(e);
            return self;
        }

        self.entries.insert(key, value);
        self
    }

    pub fn event_id(self, id: impl Into<String>) -> Self {
        self.set(keys::EVENT_ID, id.into())
    }

    pub fn event_description(self, description: impl Into<String>) -> Self {
        self.set(keys::EVENT_DESCRIPTION, description.into())
    }

    pub fn media_filename(self, path: impl Into<String>) -> Self {
        self.set(keys::MEDIA_FILENAME, path.into())
    }

    pub fn media_role(self, role: impl Into<String>) -> Self {
        self.set(keys::MEDIA_ROLE, role.into())
    }

    pub fn application_name(self, name: impl Into<String>) -> Self {
        self.set(keys::APPLICATION_NAME, name.into())
    }

    pub fn application_id(self, id: impl Into<String>) -> Self {
        self.set(keys::APPLICATION_ID, id.into())
    }

    pub fn application_icon_name(self, icon: impl Into<String>) -> Self {
        self.set(keys::APPLICATION_ICON_NAME, icon.into())
    }

    pub fn application_language(self, locale: impl Into<String>) -> Self {
        self.set(keys::APPLICATION_LANGUAGE, locale.into())
    }

    pub fn window_id(self, id: impl Into<String>) -> Self {
        self.set(keys::WINDOW_ID, id.into())
    }

    pub fn mouse_position(self, x: i64, y: i64) -> Self {
        self.set(keys::EVENT_MOUSE_X, x).set(keys::EVENT_MOUSE_Y, y)
    }

    /// Volume in dB, as the backend expects it
    pub fn volume_db(self, db: f64) -> Self {
        self.set(keys::CANBERRA_VOLUME, db)
    }

    pub fn cache_control(self, control: CacheControl) -> Self {
        self.set(keys::CANBERRA_CACHE_CONTROL, control.as_str())
    }

    pub fn enabled(self, enabled: bool) -> Self {
        self.set(keys::CANBERRA_ENABLE, if enabled { "1" } else { "0" })
    }

    pub fn build(self) -> Result<PropertyBag> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(PropertyBag {
                entries: self.entries,
            }),
        }
    }
}

/// Values understood by `canberra.cache-control`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheControl {
    Never,
    Permanent,
    Volatile,
}

impl CacheControl {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheControl::Never => "never",
            CacheControl::Permanent => "permanent",
            CacheControl::Volatile => "volatile",
        }
    }
}
