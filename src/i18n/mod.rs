//! Interface strings in English, French and German, with the active
//! language persisted between runs.

use crate::error::{Error, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Mutex, RwLock};

pub const LANGUAGE_KEY: &str = "tvlp-lang";

const EN_TABLE: &str = include_str!("locales/en.json");
const FR_TABLE: &str = include_str!("locales/fr.json");
const DE_TABLE: &str = include_str!("locales/de.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    En,
    Fr,
    De,
}

impl Lang {
    pub const ALL: [Lang; 3] = [Lang::En, Lang::Fr, Lang::De];

    pub fn code(&self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Fr => "fr",
            Lang::De => "de",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Lang::En => "English",
            Lang::Fr => "Français",
            Lang::De => "Deutsch",
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Lang {
    type Err = Error;

    fn from_str(code: &str) -> Result<Self> {
        match code {
            "en" => Ok(Lang::En),
            "fr" => Ok(Lang::Fr),
            "de" => Ok(Lang::De),
            other => Err(Error::ValidationError(format!("Unsupported language '{}'", other))),
        }
    }
}

/// Client-side key/value storage for preferences.
pub trait PreferenceStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&self, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|e| Error::InternalError(e.to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| Error::InternalError(e.to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSON object on disk, rewritten on every save.
#[derive(Debug, Clone)]
pub struct FilePreferences {
    path: PathBuf,
}

impl FilePreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_all(&self) -> Result<Map<String, Value>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl PreferenceStore for FilePreferences {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .read_all()?
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    fn save(&self, key: &str, value: &str) -> Result<()> {
        let mut all = self.read_all().unwrap_or_default();
        all.insert(key.to_string(), Value::String(value.to_string()));
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(&all)?)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Translations {
    tables: HashMap<Lang, Value>,
}

impl Translations {
    /// The tables compiled into the binary.
    pub fn embedded() -> Result<Self> {
        let mut tables = HashMap::new();
        tables.insert(Lang::En, serde_json::from_str(EN_TABLE)?);
        tables.insert(Lang::Fr, serde_json::from_str(FR_TABLE)?);
        tables.insert(Lang::De, serde_json::from_str(DE_TABLE)?);
        Ok(Self { tables })
    }

    pub fn from_tables(tables: HashMap<Lang, Value>) -> Self {
        Self { tables }
    }

    pub fn table(&self, lang: Lang) -> Option<&Value> {
        self.tables.get(&lang)
    }

    fn walk<'a>(&'a self, lang: Lang, key: &str) -> Option<&'a Value> {
        let mut value = self.tables.get(&lang)?;
        for segment in key.split('.') {
            value = match value {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(value)
    }

    /// Resolves a dotted key: the requested table first, then English.
    fn resolve<'a>(&'a self, lang: Lang, key: &str) -> Option<&'a Value> {
        self.walk(lang, key).or_else(|| {
            debug!("Missing translation '{}' for {}, falling back to en", key, lang);
            self.walk(Lang::En, key)
        })
    }

    pub fn t(&self, lang: Lang, key: &str) -> String {
        match self.resolve(lang, key) {
            Some(Value::String(text)) => text.clone(),
            _ => key.to_string(),
        }
    }

    pub fn list(&self, lang: Lang, key: &str) -> Vec<String> {
        match self.resolve(lang, key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Active language plus lookup. Shared by everything that shows text.
pub struct LanguageStore {
    current: RwLock<Lang>,
    translations: Translations,
    prefs: Box<dyn PreferenceStore>,
}

impl LanguageStore {
    pub fn open(translations: Translations, prefs: Box<dyn PreferenceStore>) -> Self {
        let current = match prefs.load(LANGUAGE_KEY) {
            Ok(Some(code)) => code.parse().unwrap_or_else(|_| {
                warn!("Ignoring stored language '{}'", code);
                Lang::En
            }),
            Ok(None) => Lang::En,
            Err(e) => {
                warn!("Failed to read language preference: {}", e);
                Lang::En
            }
        };

        Self {
            current: RwLock::new(current),
            translations,
            prefs,
        }
    }

    /// Embedded tables with an in-memory preference store.
    pub fn in_memory() -> Result<Self> {
        Ok(Self::open(Translations::embedded()?, Box::new(MemoryPreferences::new())))
    }

    pub fn current_language(&self) -> Lang {
        self.current.read().map(|lang| *lang).unwrap_or_default()
    }

    pub fn change_language(&self, lang: Lang) {
        if let Ok(mut current) = self.current.write() {
            *current = lang;
        }
        if let Err(e) = self.prefs.save(LANGUAGE_KEY, lang.code()) {
            warn!("Failed to persist language preference: {}", e);
        }
    }

    pub fn translations(&self) -> &Translations {
        &self.translations
    }

    pub fn t(&self, key: &str) -> String {
        self.translations.t(self.current_language(), key)
    }

    /// `t` with `{name}` placeholders replaced.
    pub fn t_with(&self, key: &str, args: &[(&str, &str)]) -> String {
        let mut text = self.t(key);
        for (name, value) in args {
            text = text.replace(&format!("{{{}}}", name), value);
        }
        text
    }

    pub fn list(&self, key: &str) -> Vec<String> {
        self.translations.list(self.current_language(), key)
    }
}
