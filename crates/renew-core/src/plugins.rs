use std::{any::Any, collections::BTreeMap, fmt};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::codec::CodecError;

/// Key inside every configuration block naming the plugin that owns it.
pub const DISCRIMINATOR: &str = "Plugin";

/// The five pluggable roles of a renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PluginCategory {
    Target,
    Validation,
    Csr,
    Store,
    Installation,
}

impl PluginCategory {
    pub const ALL: [PluginCategory; 5] = [
        PluginCategory::Target,
        PluginCategory::Validation,
        PluginCategory::Csr,
        PluginCategory::Store,
        PluginCategory::Installation,
    ];

    /// Document key holding the block for this category.
    pub fn document_key(self) -> &'static str {
        match self {
            PluginCategory::Target => "TargetOptions",
            PluginCategory::Validation => "ValidationOptions",
            PluginCategory::Csr => "CsrOptions",
            PluginCategory::Store => "StoreOptions",
            PluginCategory::Installation => "InstallationOptions",
        }
    }
}

impl fmt::Display for PluginCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PluginCategory::Target => "target",
            PluginCategory::Validation => "validation",
            PluginCategory::Csr => "csr",
            PluginCategory::Store => "store",
            PluginCategory::Installation => "installation",
        };
        f.write_str(name)
    }
}

/// Options schema contributed by a plugin.
///
/// Implemented by plain serde structs; secret fields should use
/// [`ProtectedString`](crate::secret::ProtectedString).
pub trait OptionsSchema:
    Serialize + DeserializeOwned + Clone + fmt::Debug + Send + Sync + 'static
{
    const CATEGORY: PluginCategory;
    /// Discriminator value written to disk.
    const NAME: &'static str;
    /// Target plugins that bring their own certificate request set this.
    const SKIPS_CSR: bool = false;
}

/// Object-safe view of an options schema, blanket-implemented for every [`OptionsSchema`].
pub trait PluginOptions: fmt::Debug + Send + Sync {
    fn plugin(&self) -> &'static str;
    fn category(&self) -> PluginCategory;
    fn skips_csr(&self) -> bool;
    fn to_json(&self) -> serde_json::Result<Value>;
    fn as_any(&self) -> &dyn Any;
    fn clone_boxed(&self) -> Box<dyn PluginOptions>;
}

impl<T: OptionsSchema> PluginOptions for T {
    fn plugin(&self) -> &'static str {
        T::NAME
    }

    fn category(&self) -> PluginCategory {
        T::CATEGORY
    }

    fn skips_csr(&self) -> bool {
        T::SKIPS_CSR
    }

    fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_boxed(&self) -> Box<dyn PluginOptions> {
        Box::new(self.clone())
    }
}

/// One decoded configuration block.
#[derive(Debug)]
pub struct OptionsBlock(Box<dyn PluginOptions>);

impl OptionsBlock {
    pub fn new<T: OptionsSchema>(options: T) -> Self {
        Self(Box::new(options))
    }

    pub fn plugin(&self) -> &'static str {
        self.0.plugin()
    }

    pub fn category(&self) -> PluginCategory {
        self.0.category()
    }

    pub fn skips_csr(&self) -> bool {
        self.0.skips_csr()
    }

    /// Concrete schema, if this block was decoded as `T`.
    pub fn downcast_ref<T: OptionsSchema>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Encode as a JSON object with the discriminator set.
    pub(crate) fn to_tagged_json(&self) -> Result<Value, CodecError> {
        let category = self.category();
        let plugin = self.plugin();
        let mut fields = match self.0.to_json() {
            Ok(Value::Object(fields)) => fields,
            Ok(Value::Null) => Map::new(),
            Ok(_) => return Err(CodecError::NotAnObject { category }),
            Err(source) => {
                return Err(CodecError::Schema {
                    category,
                    plugin: plugin.to_string(),
                    source,
                })
            }
        };
        fields.insert(DISCRIMINATOR.to_string(), Value::String(plugin.to_string()));
        Ok(Value::Object(fields))
    }
}

impl Clone for OptionsBlock {
    fn clone(&self) -> Self {
        Self(self.0.clone_boxed())
    }
}

type DecodeFn = fn(Value) -> serde_json::Result<OptionsBlock>;

fn decode_as<T: OptionsSchema>(value: Value) -> serde_json::Result<OptionsBlock> {
    serde_json::from_value::<T>(value).map(OptionsBlock::new)
}

/// Registry of known options schemas, keyed by category and discriminator.
///
/// Populated once at startup by whoever owns the plugins.
#[derive(Default)]
pub struct PluginRegistry {
    decoders: BTreeMap<PluginCategory, BTreeMap<&'static str, DecodeFn>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under its category and name, replacing any earlier registration.
    pub fn register<T: OptionsSchema>(&mut self) -> &mut Self {
        if self
            .decoders
            .entry(T::CATEGORY)
            .or_default()
            .insert(T::NAME, decode_as::<T>)
            .is_some()
        {
            warn!(category = %T::CATEGORY, plugin = T::NAME, "plugin schema registered twice");
        }
        self
    }

    pub fn contains(&self, category: PluginCategory, plugin: &str) -> bool {
        self.decoders
            .get(&category)
            .is_some_and(|plugins| plugins.contains_key(plugin))
    }

    /// Registered discriminators for a category, sorted.
    pub fn plugins(&self, category: PluginCategory) -> impl Iterator<Item = &'static str> + '_ {
        self.decoders
            .get(&category)
            .into_iter()
            .flat_map(|plugins| plugins.keys().copied())
    }

    /// Decode one block for `category`; the discriminator picks the schema.
    pub fn decode(&self, category: PluginCategory, value: Value) -> Result<OptionsBlock, CodecError> {
        let Value::Object(mut fields) = value else {
            return Err(CodecError::NotAnObject { category });
        };
        let plugin = match fields.remove(DISCRIMINATOR) {
            Some(Value::String(plugin)) => plugin,
            _ => return Err(CodecError::MissingDiscriminator { category }),
        };
        let decode = self
            .decoders
            .get(&category)
            .and_then(|plugins| plugins.get(plugin.as_str()))
            .ok_or_else(|| CodecError::UnknownPlugin {
                category,
                plugin: plugin.clone(),
            })?;
        decode(Value::Object(fields)).map_err(|source| CodecError::Schema {
            category,
            plugin,
            source,
        })
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(
                self.decoders
                    .iter()
                    .map(|(category, plugins)| (category, plugins.keys().collect::<Vec<_>>())),
            )
            .finish()
    }
}
