use std::{collections::HashMap, io::ErrorKind, path::Path, sync::Arc};

use serde_json::Value;
use tracing::{info, warn};

use crate::infra::error::InfraError;

use super::{Locale, LocaleSet};

/// Translation bundles keyed by locale, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct MessageCatalog {
    bundles: HashMap<Locale, Arc<Value>>,
}

impl MessageCatalog {
    /// Load `{dir}/{locale}.json` for every configured locale.
    ///
    /// A missing file yields an empty bundle; malformed JSON is an error.
    pub async fn load(dir: &Path, locales: &LocaleSet) -> Result<Self, InfraError> {
        let mut bundles = HashMap::with_capacity(locales.len());

        for locale in locales.iter() {
            let path = dir.join(format!("{locale}.json"));
            let bundle = match tokio::fs::read(&path).await {
                Ok(bytes) => serde_json::from_slice::<Value>(&bytes).map_err(|err| {
                    InfraError::configuration(format!(
                        "message bundle `{}` is not valid JSON: {err}",
                        path.display()
                    ))
                })?,
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    warn!(
                        target = "kami::i18n::messages",
                        locale = %locale,
                        path = %path.display(),
                        "message bundle missing; serving empty bundle"
                    );
                    Value::Object(Default::default())
                }
                Err(err) => return Err(InfraError::Io(err)),
            };

            bundles.insert(locale.clone(), Arc::new(bundle));
        }

        info!(
            target = "kami::i18n::messages",
            bundles = bundles.len(),
            dir = %dir.display(),
            "message bundles loaded"
        );

        Ok(Self { bundles })
    }

    pub fn from_bundles(bundles: impl IntoIterator<Item = (Locale, Value)>) -> Self {
        Self {
            bundles: bundles
                .into_iter()
                .map(|(locale, bundle)| (locale, Arc::new(bundle)))
                .collect(),
        }
    }

    /// Bundle for `locale`, or an empty object when none was loaded.
    pub fn bundle(&self, locale: &Locale) -> Arc<Value> {
        self.bundles
            .get(locale)
            .cloned()
            .unwrap_or_else(|| Arc::new(Value::Object(Default::default())))
    }

    /// Look up a dotted key such as `error.noData`.
    pub fn translate(&self, locale: &Locale, key: &str) -> Option<String> {
        let bundle = self.bundles.get(locale)?;
        key.split('.')
            .try_fold(bundle.as_ref(), |node, part| node.get(part))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}
