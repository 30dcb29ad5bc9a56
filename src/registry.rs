//! Grammar registry.
//!
//! Maps language names and aliases to compiled grammars. A registry is an
//! ordinary value: the [`Highlighter`](crate::Highlighter) owns one, tests build
//! their own, and registration needs `&mut` while scanning only reads.
//!
//! A failing registration never corrupts the registry. In permissive mode the
//! name is bound to a plain-text stub (no rules, excluded from detection) and
//! the failure is still reported to the caller; in strict mode nothing is bound.

use crate::engine::CompiledLanguage;
use crate::error::{BoxError, RegistrationError};
use crate::grammar::Language;
use crate::grammar::common::{CommonModes, common_modes};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug)]
struct Entry {
    name: String,
    /// Authored form, kept to recompile when options change. `None` for stubs.
    definition: Option<Language>,
    compiled: Arc<CompiledLanguage>,
}

#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<Entry>,
    /// Lowercased name -> index into `entries`.
    by_name: HashMap<String, usize>,
    /// Lowercased alias -> language name.
    aliases: HashMap<String, String>,
    force_case_insensitive: bool,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a grammar with `factory` and register it under `name`.
    ///
    /// With `strict` unset, a failure binds `name` to a plain-text stub before
    /// the error is returned.
    pub fn register<F, E>(&mut self, name: &str, factory: F, strict: bool) -> Result<Arc<CompiledLanguage>, RegistrationError>
    where
        F: FnOnce(&CommonModes) -> Result<Language, E>,
        E: Into<BoxError>,
    {
        let mut language = match factory(common_modes()) {
            Ok(language) => language,
            Err(source) => {
                let source = source.into();
                tracing::warn!(language = name, error = %source, stub = !strict, "language factory failed");
                if !strict {
                    self.bind_stub(name);
                }
                return Err(RegistrationError::Factory { name: name.to_string(), source });
            }
        };
        language.name = name.to_string();
        self.add(language, strict)
    }

    /// Register an already built grammar under its own name.
    pub fn add(&mut self, language: Language, strict: bool) -> Result<Arc<CompiledLanguage>, RegistrationError> {
        let name = language.name.clone();
        match CompiledLanguage::compile(&language, self.force_case_insensitive) {
            Ok(compiled) => {
                let compiled = Arc::new(compiled);
                let aliases = language.aliases.clone();
                tracing::debug!(language = %name, aliases = ?aliases, "registered language");
                self.bind(Entry { name: name.clone(), definition: Some(language), compiled: compiled.clone() });
                for alias in aliases {
                    self.aliases.insert(alias.to_lowercase(), name.clone());
                }
                Ok(compiled)
            }
            Err(source) => {
                tracing::warn!(language = %name, error = %source, stub = !strict, "language failed to compile");
                if !strict {
                    self.bind_stub(&name);
                }
                Err(RegistrationError::Compile { name, source })
            }
        }
    }

    fn bind_stub(&mut self, name: &str) {
        let compiled = Arc::new(CompiledLanguage::plaintext(name));
        self.bind(Entry { name: name.to_string(), definition: None, compiled });
    }

    fn bind(&mut self, entry: Entry) {
        let key = entry.name.to_lowercase();
        match self.by_name.get(&key) {
            Some(&index) => self.entries[index] = entry,
            None => {
                self.by_name.insert(key, self.entries.len());
                self.entries.push(entry);
            }
        }
    }

    /// Make each of `aliases` resolve to `language`.
    pub fn register_aliases<S: AsRef<str>>(&mut self, aliases: &[S], language: &str) {
        for alias in aliases {
            self.aliases.insert(alias.as_ref().to_lowercase(), language.to_string());
        }
    }

    /// Remove a language and every alias pointing at it.
    pub fn unregister(&mut self, name: &str) -> bool {
        let Some(index) = self.by_name.remove(&name.to_lowercase()) else { return false };
        let removed = self.entries.remove(index);
        self.aliases.retain(|_, target| !target.eq_ignore_ascii_case(&removed.name));
        self.reindex();
        true
    }

    fn reindex(&mut self) {
        self.by_name = self.entries.iter().enumerate().map(|(i, e)| (e.name.to_lowercase(), i)).collect();
    }

    /// Look up a language by name or alias, ignoring case.
    pub fn get(&self, name: &str) -> Option<Arc<CompiledLanguage>> {
        self.index_of(name).map(|i| self.entries[i].compiled.clone())
    }

    /// The authored grammar behind `name`; `None` for unknown names and stubs.
    pub fn definition(&self, name: &str) -> Option<&Language> {
        self.index_of(name).and_then(|i| self.entries[i].definition.as_ref())
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        let key = name.to_lowercase();
        if let Some(&index) = self.by_name.get(&key) {
            return Some(index);
        }
        let target = self.aliases.get(&key)?;
        self.by_name.get(&target.to_lowercase()).copied()
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Languages to consider for detection: `subset` in its own order (unknown
    /// names skipped), or everything in registration order.
    pub(crate) fn candidates(&self, subset: Option<&[String]>) -> Vec<Arc<CompiledLanguage>> {
        match subset {
            Some(names) => names.iter().filter_map(|n| self.get(n)).collect(),
            None => self.entries.iter().map(|e| e.compiled.clone()).collect(),
        }
    }

    /// Recompile every grammar with the given case-insensitivity override.
    pub fn set_case_insensitive(&mut self, force: bool) {
        if self.force_case_insensitive == force {
            return;
        }
        self.force_case_insensitive = force;

        for entry in &mut self.entries {
            let Some(definition) = &entry.definition else { continue };
            match CompiledLanguage::compile(definition, force) {
                Ok(compiled) => entry.compiled = Arc::new(compiled),
                Err(error) => {
                    tracing::warn!(language = %entry.name, %error, "recompilation failed; keeping previous build");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::Mode;
    use std::convert::Infallible;

    fn simple(name: &'static str) -> impl FnOnce(&CommonModes) -> Result<Language, Infallible> {
        move |common| Ok(Language::new(name).alias(format!("{name}-alias")).contains([common.number.clone()]))
    }

    #[test]
    fn names_and_aliases_resolve_case_insensitively() {
        let mut registry = Registry::new();
        registry.register("Inner", simple("ignored"), false).unwrap();

        assert_eq!(registry.get("inner").unwrap().name(), "Inner");
        assert_eq!(registry.get("IGNORED-ALIAS").unwrap().name(), "Inner");
        registry.register_aliases(&["in"], "inner");
        assert!(registry.get("in").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn failing_factory_binds_a_stub_in_permissive_mode() {
        let mut registry = Registry::new();
        let err = registry.register("broken", |_| Err::<Language, _>("factory exploded"), false).unwrap_err();
        assert!(matches!(err, RegistrationError::Factory { ref name, .. } if name == "broken"));

        let stub = registry.get("broken").unwrap();
        assert_eq!(stub.mode_count(), 1);
        assert!(stub.disable_autodetect());
        assert!(registry.definition("broken").is_none());
    }

    #[test]
    fn failing_compile_binds_nothing_in_strict_mode() {
        let mut registry = Registry::new();
        registry.register("good", simple("good"), true).unwrap();
        let err = registry
            .register("bad", |_| Ok::<_, Infallible>(Language::new("bad").contains([Mode::new().begin("(")])), true)
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Compile { .. }));
        assert!(registry.get("bad").is_none());
        assert_eq!(registry.names(), vec!["good"]);
    }

    #[test]
    fn reregistering_replaces_in_place() {
        let mut registry = Registry::new();
        registry.register("a", simple("a"), false).unwrap();
        registry.register("b", simple("b"), false).unwrap();
        registry.register("a", simple("a"), false).unwrap();
        assert_eq!(registry.names(), vec!["a", "b"]);
    }

    #[test]
    fn unregister_drops_aliases_and_reindexes() {
        let mut registry = Registry::new();
        registry.register("a", simple("a"), false).unwrap();
        registry.register("b", simple("b"), false).unwrap();
        assert!(registry.unregister("A"));
        assert!(registry.get("a-alias").is_none());
        assert_eq!(registry.get("b").unwrap().name(), "b");
        assert!(!registry.unregister("a"));
    }

    #[test]
    fn case_override_recompiles() {
        let mut registry = Registry::new();
        registry.register("a", simple("a"), false).unwrap();
        assert!(!registry.get("a").unwrap().case_insensitive());
        registry.set_case_insensitive(true);
        assert!(registry.get("a").unwrap().case_insensitive());
    }
}
