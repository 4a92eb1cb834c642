//! Configuration-driven construction of frame components.
//!
//! A [`ModuleDefinition`] names a component by its registry key and carries
//! its constructor arguments. Components may also declare [`Requirement`]s;
//! the matching [`Injection`]s are merged into their arguments when they are
//! resolved, so credentials and clients never have to live in the
//! configuration file.

use crate::{
    models::{bedrock, stability, Gateway, Model},
    topic::{self, TopicStrategy},
    FrameError, Result,
};
use image::DynamicImage;
use log::debug;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{collections::HashMap, sync::Arc};

/// Declarative reference to a component and its constructor arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDefinition {
    #[serde(alias = "class_path")]
    pub component: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl ModuleDefinition {
    pub fn new(component: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            component: component.into(),
            args,
        }
    }
}

/// Dependencies a component can ask to have injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Requirement {
    /// A managed inference gateway client.
    GatewayClient,
    /// A credential for a direct HTTP API.
    ApiCredential,
}

#[derive(Clone)]
pub enum Injection {
    Gateway(Arc<dyn Gateway>),
    Argument { name: String, value: Value },
}

/// Runtime values keyed by the requirement they satisfy.
#[derive(Clone, Default)]
pub struct Injections(HashMap<Requirement, Injection>);

impl Injections {
    pub fn insert(&mut self, requirement: Requirement, injection: Injection) -> &mut Self {
        self.0.insert(requirement, injection);
        self
    }

    pub fn get(&self, requirement: Requirement) -> Option<&Injection> {
        self.0.get(&requirement)
    }
}

/// Constructor arguments handed to a [`Factory`].
pub struct Arguments {
    values: Map<String, Value>,
    gateway: Option<Arc<dyn Gateway>>,
}

impl Arguments {
    pub fn new(values: Map<String, Value>) -> Self {
        Self {
            values,
            gateway: None,
        }
    }

    fn inject(&mut self, injection: &Injection) {
        match injection {
            Injection::Gateway(gateway) => self.gateway = Some(gateway.clone()),
            Injection::Argument { name, value } => {
                self.values.insert(name.clone(), value.clone());
            }
        }
    }

    /// Remove an optional argument.
    pub fn take<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        match self.values.remove(key) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|e| FrameError::Config(format!("argument `{}`: {}", key, e))),
        }
    }

    /// Remove a mandatory argument.
    pub fn require<T: DeserializeOwned>(&mut self, key: &str) -> Result<T> {
        self.take(key)?
            .ok_or_else(|| FrameError::Config(format!("missing argument `{}`", key)))
    }

    pub fn has_gateway(&self) -> bool {
        self.gateway.is_some()
    }

    pub fn gateway(&mut self) -> Result<Arc<dyn Gateway>> {
        self.gateway
            .take()
            .ok_or_else(|| FrameError::Config("no gateway client available".into()))
    }

    /// Fail if any argument was left unused.
    pub fn finish(self) -> Result<()> {
        match self.values.keys().next() {
            Some(key) => Err(FrameError::Config(format!("unexpected argument `{}`", key))),
            None => Ok(()),
        }
    }

    /// The arguments not consumed so far.
    pub fn into_values(self) -> Map<String, Value> {
        self.values
    }
}

pub type Factory<C> = fn(Arguments) -> Result<Box<C>>;

struct Registration<C: ?Sized> {
    requires: &'static [Requirement],
    factory: Factory<C>,
}

/// Factories for one capability, keyed by the name used in configuration.
pub struct Registry<C: ?Sized> {
    capability: &'static str,
    entries: HashMap<String, Registration<C>>,
}

impl<C: ?Sized> Registry<C> {
    pub fn new(capability: &'static str) -> Self {
        Self {
            capability,
            entries: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        key: impl Into<String>,
        requires: &'static [Requirement],
        factory: Factory<C>,
    ) -> &mut Self {
        self.entries
            .insert(key.into(), Registration { requires, factory });
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn resolve(&self, definition: &ModuleDefinition, injections: &Injections) -> Result<Box<C>> {
        let registration = self.entries.get(&definition.component).ok_or_else(|| {
            FrameError::UnknownComponent {
                capability: self.capability,
                key: definition.component.clone(),
            }
        })?;
        let mut args = Arguments::new(definition.args.clone());
        for &requirement in registration.requires {
            match injections.get(requirement) {
                Some(injection) => args.inject(injection),
                None => debug!(
                    "Nothing to inject for {:?} into {}",
                    requirement, definition.component
                ),
            }
        }
        debug!("Building {} `{}`", self.capability, definition.component);
        (registration.factory)(args)
    }
}

/// Everything a cycle can be configured to use.
pub struct Components {
    pub description_models: Registry<dyn Model<String>>,
    pub image_models: Registry<dyn Model<DynamicImage>>,
    pub topic_strategies: Registry<dyn TopicStrategy>,
    pub injections: Injections,
}

const GATEWAY: &[Requirement] = &[Requirement::GatewayClient];
const API_CREDENTIAL: &[Requirement] = &[Requirement::ApiCredential];

impl Components {
    /// The built-in components.
    pub fn builtin(injections: Injections) -> Self {
        let mut description_models: Registry<dyn Model<String>> = Registry::new("description model");
        description_models
            .register("anthropic", GATEWAY, bedrock::anthropic)
            .register("meta", GATEWAY, bedrock::meta);

        let mut image_models: Registry<dyn Model<DynamicImage>> = Registry::new("image model");
        image_models
            .register("stable-image", GATEWAY, bedrock::stable_image)
            .register("stable-xl", GATEWAY, bedrock::stable_xl)
            .register("titan-image", GATEWAY, bedrock::titan_image)
            .register("stable-image-ultra", API_CREDENTIAL, stability::ultra)
            .register("stable-image-core", API_CREDENTIAL, stability::core)
            .register("stable-diffusion-3", API_CREDENTIAL, stability::sd3);

        let mut topic_strategies: Registry<dyn TopicStrategy> = Registry::new("topic strategy");
        topic_strategies.register("random-adlib", &[], topic::random_adlib);

        Self {
            description_models,
            image_models,
            topic_strategies,
            injections,
        }
    }
}
