//! CPE applicability resolution (§4.5): decides whether a Rule or Group's
//! platform references match the system under evaluation, caching
//! sessions by content href.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::PolicyError;

/// A loaded piece of CPE/OVAL platform-applicability content.
///
/// Implementations own whatever parsed representation they need; the
/// core only ever asks `matches` and relies on `Drop` for teardown, the
/// same contract the registered [`crate::registry::CheckEngine`]s use for
/// their own content handles.
pub trait CpeSession: Send {
    /// True when the named platform CPE is applicable to the system
    /// under evaluation, per this content.
    fn matches(&self, cpe_name: &str) -> bool;
}

/// Loads CPE/OVAL content by href into a live [`CpeSession`].
pub trait CpeContentLoader: Send + Sync {
    /// Load and return a session for `href`, or an error if the content
    /// cannot be found or parsed.
    fn load(&self, href: &str) -> Result<Box<dyn CpeSession>, PolicyError>;
}

/// Caches [`CpeSession`]s by href so repeated applicability checks against
/// the same content reuse one loaded session (§4.5).
///
/// Wrapped in a `Mutex` rather than `RefCell` so the whole resolver stays
/// `Send`, matching how the checking-engine registry is shared across a
/// run.
struct CpeSource {
    loader: Box<dyn CpeContentLoader>,
    cache: Mutex<HashMap<String, Box<dyn CpeSession>>>,
}

impl CpeSource {
    fn new(loader: Box<dyn CpeContentLoader>) -> Self {
        Self { loader, cache: Mutex::new(HashMap::new()) }
    }

    /// True when `cpe_name` is applicable according to the content at
    /// `href`, loading and caching a session for `href` on first use.
    ///
    /// A load failure is surfaced as [`PolicyError::ContentUnloadable`];
    /// callers treat that as "not applicable from this source" and move
    /// on to the next one rather than aborting resolution (§4.5 failure
    /// policy).
    fn matches(&self, href: &str, cpe_name: &str) -> Result<bool, PolicyError> {
        let mut cache = self.cache.lock().expect("cpe session cache poisoned");
        if !cache.contains_key(href) {
            let session = self.loader.load(href)?;
            cache.insert(href.to_string(), session);
        }
        Ok(cache.get(href).expect("just inserted").matches(cpe_name))
    }
}

/// Resolves CPE platform applicability across up to four ordered content
/// sources (§4.5): an embedded Benchmark CPE language model, external
/// language models, an embedded CPE dictionary, and external CPE
/// dictionaries. Each is optional; the first applicable source wins.
pub struct CpeResolver {
    embedded_language_model: Option<CpeSource>,
    external_language_models: Option<CpeSource>,
    embedded_dictionary: Option<CpeSource>,
    external_dictionaries: Option<CpeSource>,
}

impl CpeResolver {
    /// Build a resolver backed by a single embedded CPE dictionary
    /// loader — the common case for a Benchmark with no separate
    /// language-model content. Use the `with_*` builders to add the
    /// remaining sources.
    #[must_use]
    pub fn new(embedded_dictionary: Box<dyn CpeContentLoader>) -> Self {
        Self {
            embedded_language_model: None,
            external_language_models: None,
            embedded_dictionary: Some(CpeSource::new(embedded_dictionary)),
            external_dictionaries: None,
        }
    }

    /// Add the embedded Benchmark CPE language model, tried first for
    /// `#`-prefixed platform references.
    #[must_use]
    pub fn with_embedded_language_model(mut self, loader: Box<dyn CpeContentLoader>) -> Self {
        self.embedded_language_model = Some(CpeSource::new(loader));
        self
    }

    /// Add external CPE language models, tried after the embedded one
    /// for `#`-prefixed platform references.
    #[must_use]
    pub fn with_external_language_models(mut self, loader: Box<dyn CpeContentLoader>) -> Self {
        self.external_language_models = Some(CpeSource::new(loader));
        self
    }

    /// Add external CPE dictionaries, tried after the embedded one for
    /// plain CPE-name platform references.
    #[must_use]
    pub fn with_external_dictionaries(mut self, loader: Box<dyn CpeContentLoader>) -> Self {
        self.external_dictionaries = Some(CpeSource::new(loader));
        self
    }

    /// True when `platforms` is empty (unconditionally applicable) or at
    /// least one platform reference is applicable to the system under
    /// evaluation.
    pub fn any_platform_applies(
        &self,
        default_href: &str,
        platforms: &[String],
    ) -> Result<bool, PolicyError> {
        if platforms.is_empty() {
            return Ok(true);
        }
        for platform in platforms {
            if self.platform_applies(default_href, platform)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Resolve one platform reference against its relevant source pair,
    /// in order, skipping a source that reports
    /// [`PolicyError::ContentUnloadable`] rather than treating it as
    /// fatal (§4.5).
    ///
    /// A platform string prefixed with `#` references the CPE
    /// language-model sources; any other platform string is a bare CPE
    /// name checked against the dictionary sources.
    fn platform_applies(&self, default_href: &str, platform: &str) -> Result<bool, PolicyError> {
        let (name, sources): (&str, [Option<&CpeSource>; 2]) =
            if let Some(stripped) = platform.strip_prefix('#') {
                (stripped, [self.embedded_language_model.as_ref(), self.external_language_models.as_ref()])
            } else {
                (platform, [self.embedded_dictionary.as_ref(), self.external_dictionaries.as_ref()])
            };

        for source in sources.into_iter().flatten() {
            match source.matches(default_href, name) {
                Ok(true) => return Ok(true),
                Ok(false) => continue,
                Err(PolicyError::ContentUnloadable(_)) => continue,
                Err(other) => return Err(other),
            }
        }
        Ok(false)
    }
}
