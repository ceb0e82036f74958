//! Extension instantiation inside the providing bundle's context.
//!
//! # Responsibility
//! - Find the single bundle providing an implementation name.
//! - Load the class through that bundle's namespace and build it as the
//!   requested interface, preferring the config-taking factory.
//!
//! # Invariants
//! - The caller's ambient namespace is restored on every exit path,
//!   including factory panics.
//! - The factory runs with the bundle namespace ambient and the class on the
//!   call stack, so lookups made during construction resolve to its bundle.
//! - A factory panic does not unwind into the caller; it is reported as
//!   [`InstantiationError::ConstructionFailed`] carrying a [`FactoryPanic`].

use crate::bundle::properties::BundleProperties;
use crate::context::{ambient, enter_frame, AmbientGuard, ContextAwareLoader};
use crate::namespace::{ConstructError, LoadError, NamespaceRef};
use crate::registry::{ModuleRegistry, RegistryError};
use log::{error, info, warn};
use std::any::{type_name, Any};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// What to do when properties are supplied but the class only has a
/// zero-argument factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConstructorPolicy {
    /// Build with the zero-argument factory and drop the properties.
    #[default]
    Lenient,
    /// Fail with [`InstantiationError::NoUsableConstructor`].
    Strict,
}

/// Builds extension instances by implementation name.
pub struct Instantiator {
    registry: Arc<dyn ModuleRegistry>,
    loader: Arc<ContextAwareLoader>,
    policy: ConstructorPolicy,
}

impl Instantiator {
    pub fn new(registry: Arc<dyn ModuleRegistry>) -> Self {
        let loader = Arc::new(ContextAwareLoader::new(Arc::clone(&registry)));
        Self {
            registry,
            loader,
            policy: ConstructorPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: ConstructorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> ConstructorPolicy {
        self.policy
    }

    /// Context-aware namespace installed as ambient around each call.
    pub fn loader(&self) -> &Arc<ContextAwareLoader> {
        &self.loader
    }

    /// Builds `implementation` as interface `I`.
    ///
    /// # Errors
    /// - [`InstantiationError::NotInitialized`] before registry initialization.
    /// - [`InstantiationError::UnknownImplementation`] when no bundle provides
    ///   the name, [`InstantiationError::AmbiguousImplementation`] when more
    ///   than one does.
    /// - [`InstantiationError::ClassLoad`] and
    ///   [`InstantiationError::TypeMismatch`] when the class cannot be loaded
    ///   or cannot be built as `I`.
    /// - [`InstantiationError::NoUsableConstructor`] when no factory fits the
    ///   arguments.
    /// - [`InstantiationError::ConstructionFailed`] when the factory returns an
    ///   error or panics; a panic surfaces as a [`FactoryPanic`] source.
    pub fn create_instance<I>(
        &self,
        implementation: &str,
        config: Option<&BundleProperties>,
    ) -> Result<Box<I>, InstantiationError>
    where
        I: ?Sized + 'static,
    {
        let started_at = Instant::now();
        let _ambient = AmbientGuard::install(Arc::clone(&self.loader) as NamespaceRef);

        let result = self.instantiate::<I>(implementation.trim(), config);
        match &result {
            Ok(_) => info!(
                "event=extension_create module=instantiate status=ok implementation={} duration_ms={}",
                implementation,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=extension_create module=instantiate status=error implementation={} duration_ms={} error_code={} error={}",
                implementation,
                started_at.elapsed().as_millis(),
                err.code(),
                err
            ),
        }
        result
    }

    fn instantiate<I>(
        &self,
        implementation: &str,
        config: Option<&BundleProperties>,
    ) -> Result<Box<I>, InstantiationError>
    where
        I: ?Sized + 'static,
    {
        let providers = self.registry.providers(implementation)?;
        let bundle = match providers.as_slice() {
            [] => {
                return Err(InstantiationError::UnknownImplementation(
                    implementation.to_string(),
                ))
            }
            [single] => single,
            many => {
                return Err(InstantiationError::AmbiguousImplementation {
                    implementation: implementation.to_string(),
                    bundles: many.iter().map(ToString::to_string).collect(),
                })
            }
        };

        let namespace = self.registry.namespace(bundle)?;
        let class = namespace
            .load_class(implementation)
            .map_err(|source| InstantiationError::ClassLoad {
                implementation: implementation.to_string(),
                source,
            })?;
        ambient::set(Some(namespace));

        let Some(constructors) = class.constructors::<I>() else {
            return Err(InstantiationError::TypeMismatch {
                implementation: implementation.to_string(),
                expected: type_name::<I>(),
            });
        };
        let no_usable = || InstantiationError::NoUsableConstructor {
            implementation: implementation.to_string(),
            with_config: config.is_some(),
        };

        let build: Box<dyn FnOnce() -> Result<Box<I>, ConstructError> + '_> = match (
            config,
            constructors.config_constructor(),
            constructors.default_constructor(),
        ) {
            (Some(config), Some(factory), _) => Box::new(move || factory(config)),
            (Some(_), None, Some(factory)) => match self.policy {
                ConstructorPolicy::Lenient => {
                    warn!(
                        "event=extension_create module=instantiate status=config_dropped implementation={}",
                        implementation
                    );
                    Box::new(move || factory())
                }
                ConstructorPolicy::Strict => return Err(no_usable()),
            },
            (None, _, Some(factory)) => Box::new(move || factory()),
            _ => return Err(no_usable()),
        };

        let _frame = enter_frame(Arc::clone(class.descriptor()));
        let built = panic::catch_unwind(AssertUnwindSafe(build)).unwrap_or_else(|payload| {
            Err(Box::new(FactoryPanic::from_payload(payload.as_ref())) as ConstructError)
        });

        built.map_err(|source| InstantiationError::ConstructionFailed {
            implementation: implementation.to_string(),
            source,
        })
    }
}
/// A factory panicked while building an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryPanic {
    message: String,
}

impl FactoryPanic {
    fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for FactoryPanic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "factory panicked: {}", self.message)
    }
}

impl Error for FactoryPanic {}

/// Instantiation errors.
#[derive(Debug)]
pub enum InstantiationError {
    NotInitialized,
    UnknownImplementation(String),
    AmbiguousImplementation {
        implementation: String,
        bundles: Vec<String>,
    },
    ClassLoad {
        implementation: String,
        source: LoadError,
    },
    TypeMismatch {
        implementation: String,
        expected: &'static str,
    },
    NoUsableConstructor {
        implementation: String,
        with_config: bool,
    },
    ConstructionFailed {
        implementation: String,
        source: ConstructError,
    },
    Registry(RegistryError),
}

impl InstantiationError {
    /// Stable short code for log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotInitialized => "not_initialized",
            Self::UnknownImplementation(_) => "unknown_implementation",
            Self::AmbiguousImplementation { .. } => "ambiguous_implementation",
            Self::ClassLoad { .. } => "class_load",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::NoUsableConstructor { .. } => "no_usable_constructor",
            Self::ConstructionFailed { .. } => "construction_failed",
            Self::Registry(_) => "registry",
        }
    }
}

impl Display for InstantiationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "module registry is not initialized"),
            Self::UnknownImplementation(name) => {
                write!(f, "no bundle provides implementation `{name}`")
            }
            Self::AmbiguousImplementation {
                implementation,
                bundles,
            } => write!(
                f,
                "implementation `{implementation}` is provided by {} bundles: {}",
                bundles.len(),
                bundles.join(", ")
            ),
            Self::ClassLoad {
                implementation,
                source,
            } => write!(f, "failed to load `{implementation}`: {source}"),
            Self::TypeMismatch {
                implementation,
                expected,
            } => write!(f, "`{implementation}` cannot be built as `{expected}`"),
            Self::NoUsableConstructor {
                implementation,
                with_config: true,
            } => write!(
                f,
                "`{implementation}` has no constructor accepting bundle properties"
            ),
            Self::NoUsableConstructor {
                implementation,
                with_config: false,
            } => write!(f, "`{implementation}` has no zero-argument constructor"),
            Self::ConstructionFailed {
                implementation,
                source,
            } => write!(f, "failed to construct `{implementation}`: {source}"),
            Self::Registry(err) => write!(f, "{err}"),
        }
    }
}

impl Error for InstantiationError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ClassLoad { source, .. } => Some(source),
            Self::ConstructionFailed { source, .. } => Some(source.as_ref()),
            Self::Registry(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RegistryError> for InstantiationError {
    fn from(value: RegistryError) -> Self {
        match value {
            RegistryError::NotInitialized => Self::NotInitialized,
            other => Self::Registry(other),
        }
    }
}
