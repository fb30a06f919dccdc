//! Internationalisation.
//!
//! The runtime only needs to tell the translator which language the host
//! site speaks; modules then look their strings up through the same
//! [`Translator`]. [`Catalog`] is a plain in-memory implementation with a
//! fallback language.

use std::collections::HashMap;

use parking_lot::RwLock;

/// String lookup by key in the current language.
pub trait Translator: Send + Sync + 'static {
    /// Switches the current language.
    fn set_language(&self, code: &str);

    /// Current language code.
    fn language(&self) -> String;

    /// Text for `key` in the current language, falling back to the default
    /// language.
    fn lookup(&self, key: &str) -> Option<String>;
}

/// In-memory [`Translator`].
///
/// # Example
/// ```
/// use pagevisor::{Catalog, Translator};
///
/// let catalog = Catalog::new("en")
///     .with("en", "greeting", "Hello")
///     .with("fr", "greeting", "Bonjour")
///     .with("en", "bye", "Bye");
///
/// catalog.set_language("fr");
/// assert_eq!(catalog.lookup("greeting").as_deref(), Some("Bonjour"));
/// assert_eq!(catalog.lookup("bye").as_deref(), Some("Bye"));
/// assert_eq!(catalog.lookup("missing"), None);
/// ```
#[derive(Debug)]
pub struct Catalog {
    fallback: String,
    current: RwLock<String>,
    texts: RwLock<HashMap<String, HashMap<String, String>>>,
}

impl Catalog {
    /// Creates an empty catalog whose current and fallback language is
    /// `fallback`.
    pub fn new(fallback: impl Into<String>) -> Self {
        let fallback = fallback.into();
        Self {
            current: RwLock::new(fallback.clone()),
            fallback,
            texts: RwLock::new(HashMap::new()),
        }
    }

    /// Adds one text (builder style).
    pub fn with(self, language: &str, key: &str, text: &str) -> Self {
        self.insert(language, key, text);
        self
    }

    /// Adds one text.
    pub fn insert(&self, language: &str, key: &str, text: &str) {
        self.texts
            .write()
            .entry(language.to_string())
            .or_default()
            .insert(key.to_string(), text.to_string());
    }
}

impl Translator for Catalog {
    fn set_language(&self, code: &str) {
        *self.current.write() = code.to_string();
    }

    fn language(&self) -> String {
        self.current.read().clone()
    }

    fn lookup(&self, key: &str) -> Option<String> {
        let texts = self.texts.read();
        let current = self.current.read();
        let in_language = |lang: &str| texts.get(lang).and_then(|t| t.get(key)).cloned();
        in_language(current.as_str()).or_else(|| in_language(self.fallback.as_str()))
    }
}
